use rand::Rng;
use rodio::Source;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Leaky-integrator coefficient applied to each white noise step.
const STEP: f32 = 0.02;
/// Leak divisor; keeps the integrator bounded to [-1, 1].
const LEAK: f32 = 1.02;

/// Brown noise buffer (also known as Brownian or red noise).
///
/// Each sample is `(prev + 0.02 * white) / 1.02` over uniform white noise in
/// [-1, 1), where `prev` is the unscaled previous output. The stored samples
/// are multiplied by `scale`, so they stay within `[-scale, scale]`.
pub fn generate_buffer<R: Rng>(
    rng: &mut R,
    sample_rate: u32,
    duration: Duration,
    scale: f32,
) -> Vec<f32> {
    let len = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
    let mut last = 0.0f32;

    (0..len)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            last = (last + STEP * white) / LEAK;
            last * scale
        })
        .collect()
}

/// One playing noise voice: the buffer it loops and the flag that ends it.
pub struct NoiseVoice {
    buffer: Arc<[f32]>,
    stopped: Arc<AtomicBool>,
}

impl NoiseVoice {
    pub fn new(buffer: Vec<f32>) -> Self {
        Self {
            buffer: buffer.into(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self, sample_rate: u32) -> LoopingBuffer {
        LoopingBuffer {
            buffer: Arc::clone(&self.buffer),
            position: 0,
            sample_rate,
            stopped: Arc::clone(&self.stopped),
        }
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &Arc<[f32]> {
        &self.buffer
    }

    /// Ends every source handed out by this voice. The mixer drops a source
    /// once it reports end of stream.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Mono source that loops a noise buffer until its voice is stopped.
pub struct LoopingBuffer {
    buffer: Arc<[f32]>,
    position: usize,
    sample_rate: u32,
    stopped: Arc<AtomicBool>,
}

impl Iterator for LoopingBuffer {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() || self.stopped.load(Ordering::Relaxed) {
            return None;
        }

        let sample = self.buffer[self.position];
        self.position = (self.position + 1) % self.buffer.len();
        Some(sample)
    }
}

impl Source for LoopingBuffer {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
