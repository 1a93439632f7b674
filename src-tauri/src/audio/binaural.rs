use rodio::Source;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::mix::AtomicF32;

/// Live parameters shared between a tone voice and its source.
struct ToneControl {
    left_freq: AtomicF32,
    right_freq: AtomicF32,
    stopped: AtomicBool,
}

/// One playing pair of binaural oscillators.
pub struct ToneVoice {
    control: Arc<ToneControl>,
    gain: f32,
}

impl ToneVoice {
    pub fn new(left_freq: f32, right_freq: f32, gain: f32) -> Self {
        Self {
            control: Arc::new(ToneControl {
                left_freq: AtomicF32::new(left_freq),
                right_freq: AtomicF32::new(right_freq),
                stopped: AtomicBool::new(false),
            }),
            gain,
        }
    }

    pub fn source(&self, sample_rate: u32) -> BinauralBeats {
        BinauralBeats {
            control: Arc::clone(&self.control),
            gain: self.gain,
            sample_rate,
            left_phase: 0.0,
            right_phase: 0.0,
            right_pending: None,
        }
    }

    /// Steps both oscillators to new frequencies without restarting them.
    pub fn retune(&self, left_freq: f32, right_freq: f32) {
        self.control.left_freq.store(left_freq);
        self.control.right_freq.store(right_freq);
    }

    pub fn frequencies(&self) -> (f32, f32) {
        (
            self.control.left_freq.load(),
            self.control.right_freq.load(),
        )
    }

    pub fn stop(&self) {
        self.control.stopped.store(true, Ordering::SeqCst);
    }
}

/// Binaural beat generator
/// Plays two slightly different frequencies in each ear to create a perceived "beat".
/// Output is interleaved stereo, left first.
pub struct BinauralBeats {
    control: Arc<ToneControl>,
    gain: f32,
    sample_rate: u32,
    left_phase: f32,
    right_phase: f32,
    right_pending: Option<f32>,
}

impl BinauralBeats {
    fn advance(phase: &mut f32, freq: f32, sample_rate: u32) -> f32 {
        let sample = phase.sin();
        *phase = (*phase + TAU * freq / sample_rate as f32) % TAU;
        sample
    }
}

impl Iterator for BinauralBeats {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(right) = self.right_pending.take() {
            return Some(right);
        }

        // Only stop on a frame boundary so the channels never swap.
        if self.control.stopped.load(Ordering::Relaxed) {
            return None;
        }

        let left = Self::advance(
            &mut self.left_phase,
            self.control.left_freq.load(),
            self.sample_rate,
        );
        let right = Self::advance(
            &mut self.right_phase,
            self.control.right_freq.load(),
            self.sample_rate,
        );
        self.right_pending = Some(right * self.gain);

        Some(left * self.gain)
    }
}

impl Source for BinauralBeats {
    fn current_frame_len(&self) -> Option<usize> {
        None // Infinite stream
    }

    fn channels(&self) -> u16 {
        2 // Stereo
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite
    }
}
