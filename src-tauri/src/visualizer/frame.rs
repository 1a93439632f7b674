use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

/// One redraw of the waveform canvas: a polyline in canvas units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformFrame {
    pub width: f32,
    pub height: f32,
    pub points: Vec<[f32; 2]>,
}

/// Receives every drawn frame. The desktop app forwards frames to the
/// webview; tests record them.
pub trait FrameSink: Send + Sync + 'static {
    fn present(&self, frame: WaveformFrame);
}

/// Lays `samples` out across the full canvas width. A sample of 0 sits on
/// the centre line; -1 and 1 reach the top and bottom edges. The line ends
/// at the right edge on the centre line.
pub fn draw_frame(samples: &[f32], canvas: CanvasSize) -> WaveformFrame {
    let mut points = Vec::with_capacity(samples.len() + 1);

    if !samples.is_empty() {
        let slice_width = canvas.width / samples.len() as f32;
        let mut x = 0.0;
        for &sample in samples {
            let v = 1.0 + sample.clamp(-1.0, 1.0);
            points.push([x, v * canvas.height / 2.0]);
            x += slice_width;
        }
    }
    points.push([canvas.width, canvas.height / 2.0]);

    WaveformFrame {
        width: canvas.width,
        height: canvas.height,
        points,
    }
}
