use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AudioConfig;
use crate::visualizer::{CanvasSize, FrameSink, Visualizer};
use crate::{log_debug, log_info};

use super::binaural::ToneVoice;
use super::brown_noise::{generate_buffer, NoiseVoice};
use super::mix::MixBus;
use super::presets::find_preset;
use super::{AudioBackend, BackendOpener};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    Idle,
    NoiseOnly,
    TonesOnly,
    Both,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState::Idle
    }
}

impl PlaybackState {
    fn from_flags(noise: bool, tones: bool) -> Self {
        match (noise, tones) {
            (false, false) => PlaybackState::Idle,
            (true, false) => PlaybackState::NoiseOnly,
            (false, true) => PlaybackState::TonesOnly,
            (true, true) => PlaybackState::Both,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioSnapshot {
    pub playback: PlaybackState,
    pub volume: f32,
    pub gain: f32,
    pub base_frequency: f32,
    pub beat_frequency: f32,
    pub left_frequency: Option<f32>,
    pub right_frequency: Option<f32>,
    pub active_preset: Option<&'static str>,
}

/// Everything one player window owns: the lazily opened audio context, the
/// mix bus, the two voice slots and the visualizer.
///
/// Voice slots are `None` whenever that source is not playing; stopping a
/// voice always takes it out of its slot, so a later start never touches a
/// stale voice.
pub struct SoundSession<B: AudioBackend> {
    config: AudioConfig,
    opener: BackendOpener<B>,
    context: Option<B>,
    bus: Arc<MixBus>,
    noise: Option<NoiseVoice>,
    tones: Option<ToneVoice>,
    volume: f32,
    beat_frequency: f32,
    active_preset: Option<&'static str>,
    visualizer: Visualizer,
    rng: StdRng,
}

impl<B: AudioBackend> SoundSession<B> {
    pub fn new(config: AudioConfig, opener: BackendOpener<B>, sink: Arc<dyn FrameSink>) -> Self {
        let bus = Arc::new(MixBus::new(config.default_volume, config.tap_size));
        let visualizer = Visualizer::new(
            Arc::clone(&bus),
            sink,
            CanvasSize {
                width: config.initial_canvas_width,
                height: config.canvas_height,
            },
            config.frame_interval,
        );
        let rng = match config.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            volume: config.default_volume,
            beat_frequency: config.default_beat_frequency,
            config,
            opener,
            context: None,
            bus,
            noise: None,
            tones: None,
            active_preset: None,
            visualizer,
            rng,
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_flags(self.noise.is_some(), self.tones.is_some())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn beat_frequency(&self) -> f32 {
        self.beat_frequency
    }

    /// Current gain of the mix stage.
    pub fn gain(&self) -> f32 {
        self.bus.gain()
    }

    /// (left, right) oscillator frequencies while tones play.
    pub fn tone_frequencies(&self) -> Option<(f32, f32)> {
        self.tones.as_ref().map(ToneVoice::frequencies)
    }

    pub fn snapshot(&self) -> AudioSnapshot {
        let tones = self.tone_frequencies();
        AudioSnapshot {
            playback: self.playback_state(),
            volume: self.volume(),
            gain: self.gain(),
            base_frequency: self.config.base_frequency,
            beat_frequency: self.beat_frequency(),
            left_frequency: tones.map(|(left, _)| left),
            right_frequency: tones.map(|(_, right)| right),
            active_preset: self.active_preset,
        }
    }

    pub fn resize_canvas(&self, width: f32) {
        self.visualizer.resize(width);
    }

    pub fn toggle_noise(&mut self) -> Result<()> {
        if self.noise.is_some() {
            self.stop_noise();
            Ok(())
        } else {
            self.start_noise()
        }
    }

    /// Not reachable from the preset buttons; with `toggle_noise` this is the
    /// only way to reach `PlaybackState::Both`.
    #[allow(dead_code)]
    pub fn toggle_tones(&mut self) -> Result<()> {
        if self.tones.is_some() {
            self.stop_tones();
            Ok(())
        } else {
            self.start_tones()
        }
    }

    /// Preset policy: the noise preset stops tones and toggles noise; a
    /// frequency preset stops noise and starts or retunes the tones.
    pub fn select_preset(&mut self, name: &str) -> Result<()> {
        let preset = find_preset(name).ok_or_else(|| anyhow!("unknown preset: {name}"))?;
        log_info!("Preset selected: {}", preset.name);

        match preset.frequency {
            None => {
                if self.tones.is_some() {
                    self.stop_tones();
                }
                self.toggle_noise()?;
                if self.noise.is_some() {
                    self.active_preset = Some(preset.name);
                }
            }
            Some(frequency) => {
                self.set_beat_frequency(frequency)?;
                if self.noise.is_some() {
                    self.stop_noise();
                }
                if self.tones.is_none() {
                    self.start_tones()?;
                }
                self.active_preset = Some(preset.name);
            }
        }

        Ok(())
    }

    /// Clamped to [0, 1]; applies immediately to whichever source plays.
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        if volume.is_nan() {
            bail!("volume must be a number");
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_gain();
        Ok(())
    }

    /// Retunes playing tones in place; otherwise takes effect on next start.
    pub fn set_beat_frequency(&mut self, frequency: f32) -> Result<()> {
        if !frequency.is_finite() || frequency < 0.0 {
            bail!("beat frequency must be a non-negative number, got {frequency}");
        }
        self.beat_frequency = frequency;
        if let Some(tones) = &self.tones {
            tones.retune(
                self.config.base_frequency,
                self.config.base_frequency + frequency,
            );
        }
        Ok(())
    }

    /// Cancels the pending redraw, stops every voice and releases the audio
    /// context, in that order. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.visualizer.stop();
        if let Some(noise) = self.noise.take() {
            noise.stop();
        }
        if let Some(tones) = self.tones.take() {
            tones.stop();
        }
        self.active_preset = None;
        if let Some(mut context) = self.context.take() {
            context.close();
            log_info!("Sound session torn down");
        }
    }

    fn ensure_context(&mut self) -> Result<&B> {
        if self.context.is_none() {
            let context = (self.opener)(&self.config, Arc::clone(&self.bus))?;
            self.context = Some(context);
        }
        self.context
            .as_ref()
            .ok_or_else(|| anyhow!("audio context unavailable"))
    }

    fn start_noise(&mut self) -> Result<()> {
        let sample_rate = self.ensure_context()?.sample_rate();
        let buffer = generate_buffer(
            &mut self.rng,
            sample_rate,
            self.config.noise_duration,
            self.config.noise_scale,
        );
        let voice = NoiseVoice::new(buffer);

        self.ensure_context()?.connect(Box::new(voice.source(sample_rate)));
        self.noise = Some(voice);
        log_debug!("Noise started");

        self.apply_gain();
        self.sync_visualizer();
        Ok(())
    }

    fn stop_noise(&mut self) {
        if let Some(noise) = self.noise.take() {
            noise.stop();
            log_debug!("Noise stopped");
        }
        if self
            .active_preset
            .and_then(find_preset)
            .is_some_and(|p| p.frequency.is_none())
        {
            self.active_preset = None;
        }
        self.apply_gain();
        self.sync_visualizer();
    }

    fn start_tones(&mut self) -> Result<()> {
        let base = self.config.base_frequency;
        let voice = ToneVoice::new(base, base + self.beat_frequency, self.config.tone_gain);

        let context = self.ensure_context()?;
        context.connect(Box::new(voice.source(context.sample_rate())));
        self.tones = Some(voice);
        log_debug!("Tones started at {} / {} Hz", base, base + self.beat_frequency);

        self.apply_gain();
        self.sync_visualizer();
        Ok(())
    }

    fn stop_tones(&mut self) {
        if let Some(tones) = self.tones.take() {
            tones.stop();
            log_debug!("Tones stopped");
        }
        if self
            .active_preset
            .and_then(find_preset)
            .is_some_and(|p| p.frequency.is_some())
        {
            self.active_preset = None;
        }
        self.apply_gain();
        self.sync_visualizer();
    }

    fn apply_gain(&self) {
        let gain = if self.noise.is_some() {
            self.volume * self.config.noise_gain_factor
        } else {
            self.volume
        };
        self.bus.set_gain(gain);
    }

    fn sync_visualizer(&mut self) {
        if self.playback_state() == PlaybackState::Idle {
            self.visualizer.stop();
            self.bus.tap().clear();
        } else {
            self.visualizer.start();
        }
    }

    #[cfg(test)]
    pub(crate) fn noise_voice(&self) -> Option<&NoiseVoice> {
        self.noise.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn visualizer_running(&self) -> bool {
        self.visualizer.is_running()
    }
}

impl<B: AudioBackend> Drop for SoundSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BoxedSource;
    use crate::visualizer::controller::tests::RecordingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        opened: AtomicUsize,
        closed: AtomicUsize,
        sources: Mutex<Vec<BoxedSource>>,
        fail_open: std::sync::atomic::AtomicBool,
    }

    impl Probe {
        fn source_count(&self) -> usize {
            self.sources.lock().unwrap().len()
        }

        /// Pulls one sample from the source connected at `index`.
        fn pull(&self, index: usize) -> Option<f32> {
            self.sources.lock().unwrap()[index].next()
        }
    }

    struct MemoryBackend {
        probe: Arc<Probe>,
        sample_rate: u32,
        closed: bool,
    }

    impl AudioBackend for MemoryBackend {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn connect(&self, source: BoxedSource) {
            self.probe.sources.lock().unwrap().push(source);
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.probe.closed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn session() -> (SoundSession<MemoryBackend>, Arc<Probe>, Arc<RecordingSink>) {
        let probe = Arc::new(Probe::default());
        let sink = Arc::new(RecordingSink::default());
        let opener_probe = Arc::clone(&probe);
        let opener: BackendOpener<MemoryBackend> = Box::new(move |config, _bus| {
            if opener_probe.fail_open.load(Ordering::SeqCst) {
                bail!("no output device");
            }
            opener_probe.opened.fetch_add(1, Ordering::SeqCst);
            Ok(MemoryBackend {
                probe: Arc::clone(&opener_probe),
                sample_rate: config.sample_rate,
                closed: false,
            })
        });
        let config = AudioConfig {
            sample_rate: 8000,
            noise_seed: Some(11),
            frame_interval: Duration::from_millis(5),
            ..AudioConfig::default()
        };
        (SoundSession::new(config, opener, sink.clone()), probe, sink)
    }

    #[tokio::test]
    async fn test_defaults() {
        let (s, probe, _) = session();
        let snap = s.snapshot();
        assert_eq!(snap.playback, PlaybackState::Idle);
        assert_eq!(snap.volume, 0.5);
        assert_eq!(snap.beat_frequency, 0.5);
        assert_eq!(snap.base_frequency, 200.0);
        assert_eq!(snap.left_frequency, None);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 0, "context is lazy");
    }

    #[tokio::test]
    async fn test_gain_follows_volume_and_mode() {
        let (mut s, _, _) = session();
        let volumes = [0.0f32, 0.01, 0.25, 0.5, 0.73, 1.0];

        s.select_preset("Noise").unwrap();
        for v in volumes {
            s.set_volume(v).unwrap();
            assert!((s.gain() - v * 0.1).abs() < 1e-6);
        }

        s.select_preset("Alpha").unwrap();
        for v in volumes {
            s.set_volume(v).unwrap();
            assert!((s.gain() - v).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let (mut s, _, _) = session();
        s.set_volume(1.7).unwrap();
        assert_eq!(s.volume(), 1.0);
        s.set_volume(-0.2).unwrap();
        assert_eq!(s.volume(), 0.0);
        assert!(s.set_volume(f32::NAN).is_err());
    }

    #[tokio::test]
    async fn test_theta_preset_tunes_ears() {
        let (mut s, _, _) = session();
        s.select_preset("Theta").unwrap();

        assert_eq!(s.beat_frequency(), 4.0);
        assert_eq!(s.tone_frequencies(), Some((200.0, 204.0)));
        assert_eq!(s.snapshot().active_preset, Some("Theta"));
        assert_eq!(s.playback_state(), PlaybackState::TonesOnly);
    }

    #[tokio::test]
    async fn test_switching_frequency_presets_retunes_without_restart() {
        let (mut s, probe, _) = session();
        s.select_preset("Delta").unwrap();
        s.select_preset("Gamma").unwrap();

        assert_eq!(probe.source_count(), 1, "tones were not reconnected");
        assert_eq!(s.tone_frequencies(), Some((200.0, 230.0)));
        assert!(probe.pull(0).is_some());
    }

    #[tokio::test]
    async fn test_noise_toggle_regenerates_buffer() {
        let (mut s, probe, _) = session();

        s.toggle_noise().unwrap();
        let first = Arc::clone(s.noise_voice().unwrap().buffer());
        assert_eq!(first.len(), 8000);

        s.toggle_noise().unwrap();
        assert!(s.noise_voice().is_none());
        assert_eq!(probe.pull(0), None, "stopped source is disconnected");

        s.toggle_noise().unwrap();
        let second = Arc::clone(s.noise_voice().unwrap().buffer());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(&first[..], &second[..]);
        assert!(probe.pull(1).is_some());
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1, "context is reused");
    }

    #[tokio::test]
    async fn test_presets_are_mutually_exclusive() {
        let (mut s, probe, _) = session();

        s.select_preset("Beta").unwrap();
        s.select_preset("Noise").unwrap();
        assert_eq!(s.playback_state(), PlaybackState::NoiseOnly);
        assert_eq!(probe.pull(0), None, "tones were stopped");
        assert_eq!(s.snapshot().active_preset, Some("Noise"));

        s.select_preset("Delta").unwrap();
        assert_eq!(s.playback_state(), PlaybackState::TonesOnly);
        assert_eq!(probe.pull(1), None, "noise was stopped");
        assert_eq!(s.tone_frequencies(), Some((200.0, 200.5)));
    }

    #[tokio::test]
    async fn test_noise_preset_twice_stops_noise() {
        let (mut s, _, _) = session();
        s.select_preset("noise").unwrap();
        s.select_preset("noise").unwrap();

        assert_eq!(s.playback_state(), PlaybackState::Idle);
        assert_eq!(s.snapshot().active_preset, None);
        assert!(!s.visualizer_running());
    }

    #[tokio::test]
    async fn test_unknown_preset_changes_nothing() {
        let (mut s, probe, _) = session();
        assert!(s.select_preset("Epsilon").is_err());
        assert_eq!(s.playback_state(), PlaybackState::Idle);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_independent_toggles_allow_both() {
        let (mut s, _, _) = session();
        s.toggle_tones().unwrap();
        s.toggle_noise().unwrap();
        assert_eq!(s.playback_state(), PlaybackState::Both);

        s.set_volume(0.8).unwrap();
        assert!((s.gain() - 0.08).abs() < 1e-6);

        s.toggle_noise().unwrap();
        assert_eq!(s.playback_state(), PlaybackState::TonesOnly);
        assert!((s.gain() - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_visualizer_follows_playback() {
        let (mut s, _, sink) = session();
        assert!(!s.visualizer_running());

        s.select_preset("Alpha").unwrap();
        assert!(s.visualizer_running());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sink.count() >= 1);

        s.toggle_tones().unwrap();
        assert!(!s.visualizer_running());

        s.select_preset("Noise").unwrap();
        assert!(s.visualizer_running());
    }

    #[tokio::test]
    async fn test_teardown_with_both_sources() {
        let (mut s, probe, sink) = session();
        s.toggle_noise().unwrap();
        s.toggle_tones().unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        s.teardown();

        assert_eq!(s.playback_state(), PlaybackState::Idle);
        assert!(!s.visualizer_running());
        assert_eq!(probe.pull(0), None);
        assert_eq!(probe.pull(1), None);
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);

        let presented = sink.count();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(sink.count(), presented, "no redraw after teardown");

        s.teardown();
        assert_eq!(probe.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_leaves_session_idle_and_retries() {
        let (mut s, probe, _) = session();
        probe.fail_open.store(true, Ordering::SeqCst);
        assert!(s.select_preset("Theta").is_err());
        assert_eq!(s.playback_state(), PlaybackState::Idle);
        assert!(!s.visualizer_running());

        probe.fail_open.store(false, Ordering::SeqCst);
        s.select_preset("Theta").unwrap();
        assert_eq!(s.playback_state(), PlaybackState::TonesOnly);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = AudioSnapshot {
            playback: PlaybackState::TonesOnly,
            volume: 0.5,
            gain: 0.5,
            base_frequency: 200.0,
            beat_frequency: 4.0,
            left_frequency: Some(200.0),
            right_frequency: Some(204.0),
            active_preset: Some("Theta"),
        };
        let value = serde_json::to_value(snapshot).unwrap();
        assert_eq!(value["playback"], "tonesOnly");
        assert_eq!(value["rightFrequency"], 204.0);
        assert_eq!(value["activePreset"], "Theta");
    }
}
