pub mod controller;
pub mod frame;

use tauri::{AppHandle, Emitter};

pub use controller::Visualizer;
pub use frame::{CanvasSize, FrameSink, WaveformFrame};

/// Forwards frames to the webview, which strokes them onto its canvas.
pub struct WebviewFrameSink {
    app_handle: AppHandle,
}

impl WebviewFrameSink {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl FrameSink for WebviewFrameSink {
    fn present(&self, frame: WaveformFrame) {
        let _ = self.app_handle.emit("waveform-frame", frame);
    }
}
