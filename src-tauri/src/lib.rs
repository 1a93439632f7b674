mod audio;
mod config;
mod utils;
mod visualizer;

use std::sync::Arc;

use audio::commands::{get_audio_state, get_presets, select_preset, set_volume};
use audio::{BackendOpener, RodioBackend, SoundSession};
use config::AudioConfig;
use tauri::{Manager, PhysicalSize, Window, WindowEvent};
use tokio::sync::Mutex;
use visualizer::WebviewFrameSink;

pub(crate) struct AppState {
    pub(crate) session: Mutex<SoundSession<RodioBackend>>,
}

fn logical_width(window: &Window, size: &PhysicalSize<u32>) -> Option<f32> {
    let scale = window.scale_factor().ok()?;
    Some(size.to_logical::<f64>(scale).width as f32)
}

fn handle_window_event(window: &Window, event: &WindowEvent) {
    let Some(state) = window.try_state::<AppState>() else {
        return;
    };

    match event {
        WindowEvent::Resized(size) => {
            if let Some(width) = logical_width(window, size) {
                tauri::async_runtime::block_on(async {
                    state.session.lock().await.resize_canvas(width);
                });
            }
        }
        WindowEvent::Destroyed => {
            tauri::async_runtime::block_on(async {
                state.session.lock().await.teardown();
            });
        }
        _ => {}
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    utils::logging::init(config::debug_from_env());

    let config = AudioConfig::from_env();
    log::info!("Brainwave starting up...");
    if config.debug {
        log::debug!("Audio config: {:?}", config);
    }

    tauri::Builder::default()
        .setup(move |app| {
            let sink = Arc::new(WebviewFrameSink::new(app.handle().clone()));
            let opener: BackendOpener<RodioBackend> = Box::new(RodioBackend::open);
            let session = SoundSession::new(config, opener, sink);

            if let Some(window) = app.get_webview_window("main") {
                if let (Ok(size), Ok(scale)) = (window.inner_size(), window.scale_factor()) {
                    session.resize_canvas(size.to_logical::<f64>(scale).width as f32);
                }
            }

            app.manage(AppState {
                session: Mutex::new(session),
            });

            Ok(())
        })
        .on_window_event(handle_window_event)
        .invoke_handler(tauri::generate_handler![
            get_presets,
            get_audio_state,
            select_preset,
            set_volume,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
