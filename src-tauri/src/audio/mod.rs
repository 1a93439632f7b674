pub mod binaural;
pub mod brown_noise;
pub mod commands;
pub mod mix;
pub mod presets;
pub mod session;

use anyhow::{anyhow, Context, Result};
use mix::{MixBus, MixStage};
use rodio::dynamic_mixer::{self, DynamicMixerController};
use rodio::source::Zero;
use rodio::{OutputStream, Sink, Source};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::config::AudioConfig;
use crate::log_info;

pub use session::{AudioSnapshot, SoundSession};

const ENABLE_LOGS: bool = true;

pub type BoxedSource = Box<dyn Source<Item = f32> + Send>;

type MixerHandle = Arc<DynamicMixerController<f32>>;

/// The platform audio boundary: a shared output context that voices are
/// connected to. Everything connected is summed and passed through the
/// bus's gain stage and analysis tap before reaching the device.
pub trait AudioBackend: Send {
    fn sample_rate(&self) -> u32;

    /// Starts playing `source` immediately. The source is disconnected once
    /// it reports end of stream.
    fn connect(&self, source: BoxedSource);

    /// Releases the output device. Idempotent.
    fn close(&mut self);
}

/// Opens a fresh context. Called lazily on first activation.
pub type BackendOpener<B> = Box<dyn Fn(&AudioConfig, Arc<MixBus>) -> Result<B> + Send>;

/// rodio-backed context. The `OutputStream` is not `Send`, so it lives on a
/// dedicated thread that holds it until the context is closed.
pub struct RodioBackend {
    mixer: MixerHandle,
    sample_rate: u32,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RodioBackend {
    pub fn open(config: &AudioConfig, bus: Arc<MixBus>) -> Result<Self> {
        let sample_rate = config.sample_rate;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("audio-context".to_string())
            .spawn(move || {
                let opened = (|| -> Result<(OutputStream, Sink, MixerHandle), String> {
                    let (stream, handle) = OutputStream::try_default()
                        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                    let sink = Sink::try_new(&handle)
                        .map_err(|e| format!("Failed to create audio sink: {}", e))?;

                    let (controller, mixer) = dynamic_mixer::mixer::<f32>(2, sample_rate);
                    // Keeps the mixer alive while no voice is connected.
                    controller.add(Zero::<f32>::new(2, sample_rate));
                    sink.append(MixStage::new(mixer, bus));
                    Ok((stream, sink, controller))
                })();

                match opened {
                    Ok((_stream, sink, controller)) => {
                        let _ = ready_tx.send(Ok(controller));
                        // Blocks until close() or the sender is dropped.
                        let _ = shutdown_rx.recv();
                        sink.stop();
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .context("Failed to spawn audio context thread")?;

        let ready = ready_rx
            .recv()
            .map_err(|_| anyhow!("audio context thread exited before reporting readiness"));

        match ready {
            Ok(Ok(mixer)) => {
                log_info!("Audio context opened at {} Hz", sample_rate);
                Ok(Self {
                    mixer,
                    sample_rate,
                    shutdown: Some(shutdown_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(anyhow!(err))
            }
            Err(err) => {
                let _ = thread.join();
                Err(err)
            }
        }
    }
}

impl AudioBackend for RodioBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&self, source: BoxedSource) {
        self.mixer.add(source);
    }

    fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("audio context thread panicked during shutdown");
            }
            log_info!("Audio context closed");
        }
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.close();
    }
}
