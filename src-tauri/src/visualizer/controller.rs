use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::mix::MixBus;
use crate::log_debug;

use super::frame::{draw_frame, CanvasSize, FrameSink};

const ENABLE_LOGS: bool = true;

/// Owns the per-frame drawing task. At most one task runs at a time; it is
/// started when playback begins and cancelled when everything stops.
pub struct Visualizer {
    bus: Arc<MixBus>,
    sink: Arc<dyn FrameSink>,
    canvas: Arc<Mutex<CanvasSize>>,
    frame_interval: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Visualizer {
    pub fn new(
        bus: Arc<MixBus>,
        sink: Arc<dyn FrameSink>,
        canvas: CanvasSize,
        frame_interval: Duration,
    ) -> Self {
        Self {
            bus,
            sink,
            canvas: Arc::new(Mutex::new(canvas)),
            frame_interval,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Tracks the window width; the height never changes.
    pub fn resize(&self, width: f32) {
        if !width.is_finite() || width <= 0.0 {
            return;
        }
        if let Ok(mut canvas) = self.canvas.lock() {
            canvas.width = width;
        }
    }

    #[cfg(test)]
    pub fn canvas(&self) -> CanvasSize {
        self.canvas
            .lock()
            .map(|canvas| *canvas)
            .unwrap_or(CanvasSize {
                width: 0.0,
                height: 0.0,
            })
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.stop();

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let bus = Arc::clone(&self.bus);
        let sink = Arc::clone(&self.sink);
        let canvas = Arc::clone(&self.canvas);
        let frame_interval = self.frame_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(frame_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let size = match canvas.lock() {
                            Ok(guard) => *guard,
                            Err(_) => break,
                        };
                        sink.present(draw_frame(&bus.tap().snapshot(), size));
                    }
                }
            }
        });

        log_debug!("Visualizer started");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Cancels the pending redraw. No frame is presented after this returns.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log_debug!("Visualizer stopped");
        }
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        self.stop();
    }
}
