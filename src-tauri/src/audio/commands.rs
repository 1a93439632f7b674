use tauri::{AppHandle, Emitter, State};

use super::presets::{Preset, PRESETS};
use super::AudioSnapshot;
use crate::AppState;

fn emit_audio_state(app_handle: &AppHandle, snapshot: &AudioSnapshot) {
    let _ = app_handle.emit("audio-state-changed", snapshot);
}

#[tauri::command]
pub fn get_presets() -> Vec<Preset> {
    PRESETS.to_vec()
}

#[tauri::command]
pub async fn get_audio_state(state: State<'_, AppState>) -> Result<AudioSnapshot, String> {
    Ok(state.session.lock().await.snapshot())
}

#[tauri::command]
pub async fn select_preset(
    name: String,
    state: State<'_, AppState>,
    app_handle: AppHandle,
) -> Result<AudioSnapshot, String> {
    let snapshot = {
        let mut session = state.session.lock().await;
        session.select_preset(&name).map_err(|e| e.to_string())?;
        session.snapshot()
    };
    emit_audio_state(&app_handle, &snapshot);
    Ok(snapshot)
}

#[tauri::command]
pub async fn set_volume(
    volume: f32,
    state: State<'_, AppState>,
    app_handle: AppHandle,
) -> Result<AudioSnapshot, String> {
    let snapshot = {
        let mut session = state.session.lock().await;
        session.set_volume(volume).map_err(|e| e.to_string())?;
        session.snapshot()
    };
    emit_audio_state(&app_handle, &snapshot);
    Ok(snapshot)
}
