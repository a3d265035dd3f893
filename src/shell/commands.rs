use tauri::State;
use uuid::Uuid;

use crate::{
    catalog::{Catalog, GovernorRecord, SiteRecord},
    error::ErrorReport,
    interaction::{Gesture, GestureOutcome, InteractionMode},
    media::PermissionState,
    pose::SensorStatus,
    session::{ArSessionController, SessionSnapshot},
    settings::ArTuning,
};

use super::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> ArSessionController {
    state.session.clone()
}

#[tauri::command]
pub fn get_site(state: State<'_, AppState>, site_id: String) -> Result<SiteRecord, String> {
    state
        .catalog
        .find_site_by_id(&site_id)
        .cloned()
        .ok_or_else(|| format!("site '{site_id}' not found"))
}

#[tauri::command]
pub fn list_sites(state: State<'_, AppState>) -> Vec<SiteRecord> {
    state.catalog.sites().to_vec()
}

#[tauri::command]
pub fn get_governor(
    state: State<'_, AppState>,
    governor_id: String,
) -> Result<GovernorRecord, String> {
    state
        .catalog
        .find_governor_by_id(&governor_id)
        .cloned()
        .ok_or_else(|| format!("governor '{governor_id}' not found"))
}

#[tauri::command]
pub async fn open_ar_session(
    state: State<'_, AppState>,
    site_id: String,
) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller
        .open_site(state.catalog, &site_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn close_ar_session(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.close().await)
}

#[tauri::command]
pub async fn retry_ar_session(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.retry().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_ar_snapshot(state: State<'_, AppState>) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub async fn set_interaction_mode(
    state: State<'_, AppState>,
    mode: InteractionMode,
) -> Result<InteractionMode, String> {
    let controller = controller_from_state(&state);
    controller
        .set_interaction_mode(mode)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn apply_ar_gesture(
    state: State<'_, AppState>,
    gesture: Gesture,
) -> Result<GestureOutcome, String> {
    let controller = controller_from_state(&state);
    controller
        .apply_gesture(gesture)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn place_ar_model(state: State<'_, AppState>) -> Result<Uuid, String> {
    let controller = controller_from_state(&state);
    controller.place_model().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn set_ar_sensors(
    state: State<'_, AppState>,
    enabled: bool,
) -> Result<SensorStatus, String> {
    let controller = controller_from_state(&state);
    if enabled {
        Ok(controller.enable_sensors().await)
    } else {
        Ok(controller.disable_sensors().await)
    }
}

#[tauri::command]
pub async fn query_camera_permission(
    state: State<'_, AppState>,
) -> Result<PermissionState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.query_camera_permission().await)
}

/// Decode an uploaded image; a match navigates to the AR viewer.
#[tauri::command]
pub async fn scan_qr_image(
    state: State<'_, AppState>,
    image: Vec<u8>,
) -> Result<String, ErrorReport> {
    let mut scanner = state.scanner.lock().await;
    scanner.scan_image(image).await.map_err(|e| e.report())
}

#[tauri::command]
pub fn get_ar_tuning(state: State<'_, AppState>) -> ArTuning {
    state.settings.ar_tuning()
}

/// Persisted; the running session keeps its tuning until restart.
#[tauri::command]
pub fn set_ar_tuning(state: State<'_, AppState>, tuning: ArTuning) -> Result<ArTuning, String> {
    state
        .settings
        .update_ar_tuning(tuning)
        .map_err(|e| e.to_string())
}
