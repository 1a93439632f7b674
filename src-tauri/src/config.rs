use std::time::Duration;

use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Process-level audio configuration. Nothing here is persisted; every run
/// starts from the defaults plus whatever the environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub base_frequency: f32,
    pub default_beat_frequency: f32,
    pub default_volume: f32,
    /// Per-ear gain applied inside the binaural source.
    pub tone_gain: f32,
    /// Mix gain multiplier while noise plays; the noise buffer is already loud.
    pub noise_gain_factor: f32,
    pub noise_duration: Duration,
    pub noise_scale: f32,
    pub tap_size: usize,
    pub frame_interval: Duration,
    pub canvas_height: f32,
    pub initial_canvas_width: f32,
    pub noise_seed: Option<u64>,
    pub debug: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            base_frequency: 200.0,
            default_beat_frequency: 0.5,
            default_volume: 0.5,
            tone_gain: 0.1,
            noise_gain_factor: 0.1,
            noise_duration: Duration::from_secs(1),
            noise_scale: 3.5,
            tap_size: 2048,
            frame_interval: Duration::from_millis(16),
            canvas_height: 100.0,
            initial_canvas_width: 800.0,
            noise_seed: None,
            debug: false,
        }
    }
}

impl AudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("BRAINWAVE_SAMPLE_RATE") {
            match raw.trim().parse::<u32>() {
                Ok(rate) if (8000..=192_000).contains(&rate) => config.sample_rate = rate,
                _ => log_warn!("Ignoring invalid BRAINWAVE_SAMPLE_RATE={raw:?}"),
            }
        }

        if let Some(raw) = lookup("BRAINWAVE_FRAME_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.frame_interval = Duration::from_millis(ms),
                _ => log_warn!("Ignoring invalid BRAINWAVE_FRAME_MS={raw:?}"),
            }
        }

        if let Some(raw) = lookup("BRAINWAVE_NOISE_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(seed) => config.noise_seed = Some(seed),
                Err(_) => log_warn!("Ignoring invalid BRAINWAVE_NOISE_SEED={raw:?}"),
            }
        }

        config.debug = debug_flag(lookup("BRAINWAVE_DEBUG"));

        config
    }
}

/// Read before the logger exists, so overrides parsed later can warn.
pub fn debug_from_env() -> bool {
    debug_flag(std::env::var("BRAINWAVE_DEBUG").ok())
}

fn debug_flag(value: Option<String>) -> bool {
    value
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
