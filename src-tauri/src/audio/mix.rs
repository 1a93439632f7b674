use rodio::Source;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Samples buffered on the render thread before taking the tap lock.
const TAP_FLUSH_FRAMES: usize = 256;

/// `f32` stored as raw bits so the render thread can read it without locking.
#[derive(Debug)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Ring of the most recent mono output samples. Starts silent.
pub struct WaveformTap {
    ring: Mutex<TapRing>,
}

struct TapRing {
    samples: Vec<f32>,
    cursor: usize,
}

impl WaveformTap {
    pub fn new(size: usize) -> Self {
        Self {
            ring: Mutex::new(TapRing {
                samples: vec![0.0; size.max(1)],
                cursor: 0,
            }),
        }
    }

    pub fn push(&self, block: &[f32]) {
        let Ok(mut ring) = self.ring.lock() else {
            return;
        };
        let size = ring.samples.len();
        for &sample in block {
            let cursor = ring.cursor;
            ring.samples[cursor] = sample;
            ring.cursor = (cursor + 1) % size;
        }
    }

    /// Oldest sample first.
    pub fn snapshot(&self) -> Vec<f32> {
        let Ok(ring) = self.ring.lock() else {
            return Vec::new();
        };
        let (newer, older) = ring.samples.split_at(ring.cursor);
        older.iter().chain(newer.iter()).copied().collect()
    }

    pub fn clear(&self) {
        if let Ok(mut ring) = self.ring.lock() {
            ring.samples.iter_mut().for_each(|s| *s = 0.0);
            ring.cursor = 0;
        }
    }
}

/// The single gain stage every voice passes through, plus the analysis tap
/// on its output.
pub struct MixBus {
    gain: AtomicF32,
    tap: WaveformTap,
}

impl MixBus {
    pub fn new(gain: f32, tap_size: usize) -> Self {
        Self {
            gain: AtomicF32::new(gain),
            tap: WaveformTap::new(tap_size),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain.load()
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain);
    }

    pub fn tap(&self) -> &WaveformTap {
        &self.tap
    }
}

/// Applies the bus gain to an interleaved source and feeds the downmixed
/// result into the bus tap.
pub struct MixStage<S> {
    inner: S,
    bus: Arc<MixBus>,
    channels: u16,
    channel: u16,
    frame_sum: f32,
    pending: Vec<f32>,
}

impl<S> MixStage<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, bus: Arc<MixBus>) -> Self {
        let channels = inner.channels().max(1);
        Self {
            inner,
            bus,
            channels,
            channel: 0,
            frame_sum: 0.0,
            pending: Vec::with_capacity(TAP_FLUSH_FRAMES),
        }
    }

    fn record(&mut self, sample: f32) {
        self.frame_sum += sample;
        self.channel += 1;
        if self.channel == self.channels {
            self.pending.push(self.frame_sum / self.channels as f32);
            self.frame_sum = 0.0;
            self.channel = 0;
            if self.pending.len() >= TAP_FLUSH_FRAMES {
                self.bus.tap().push(&self.pending);
                self.pending.clear();
            }
        }
    }
}

impl<S> Iterator for MixStage<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.inner.next()? * self.bus.gain();
        self.record(sample);
        Some(sample)
    }
}

impl<S> Source for MixStage<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
