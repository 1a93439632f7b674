use serde::Serialize;

/// A selectable brainwave preset. `frequency: None` is the brown noise
/// preset; every other entry is a binaural beat frequency in Hz.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub frequency: Option<f32>,
    pub description: &'static str,
}

/// Display order.
pub const PRESETS: [Preset; 6] = [
    Preset {
        name: "Noise",
        frequency: None,
        description: "Brown noise for masking distractions",
    },
    Preset {
        name: "Delta",
        frequency: Some(0.5),
        description: "Deep sleep and recovery",
    },
    Preset {
        name: "Theta",
        frequency: Some(4.0),
        description: "Meditation and creativity",
    },
    Preset {
        name: "Alpha",
        frequency: Some(8.0),
        description: "Relaxed focus and learning",
    },
    Preset {
        name: "Beta",
        frequency: Some(13.0),
        description: "Active thinking and alertness",
    },
    Preset {
        name: "Gamma",
        frequency: Some(30.0),
        description: "Peak concentration",
    },
];

pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_noise_preset_and_it_comes_first() {
        let noise: Vec<_> = PRESETS.iter().filter(|p| p.frequency.is_none()).collect();
        assert_eq!(noise.len(), 1);
        assert_eq!(PRESETS[0].name, "Noise");
    }

    #[test]
    fn test_band_frequencies() {
        let bands: Vec<_> = PRESETS
            .iter()
            .filter_map(|p| p.frequency.map(|f| (p.name, f)))
            .collect();
        assert_eq!(
            bands,
            vec![
                ("Delta", 0.5),
                ("Theta", 4.0),
                ("Alpha", 8.0),
                ("Beta", 13.0),
                ("Gamma", 30.0),
            ]
        );
    }

    #[test]
    fn test_find_preset_ignores_case() {
        assert_eq!(find_preset("theta").map(|p| p.frequency), Some(Some(4.0)));
        assert!(find_preset("Epsilon").is_none());
    }

    #[test]
    fn test_serializes_null_frequency_for_noise() {
        let value = serde_json::to_value(PRESETS[0]).unwrap();
        assert_eq!(value["name"], "Noise");
        assert!(value["frequency"].is_null());
    }
}
