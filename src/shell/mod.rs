mod bridge;
mod commands;

use std::sync::Arc;

use log::info;
use tauri::Manager;
use tokio::sync::Mutex;

use crate::{
    catalog::StaticCatalog,
    media::{CameraArbiter, CameraPermission, MediaAcquirer},
    scanner::{RqrrDecoder, ScanController},
    session::{ArSessionController, GlbFileLoader, SessionDeps},
    settings::SettingsStore,
};

use bridge::{
    NoCaptureCamera, NoMotionSensors, TauriEvents, TauriNavigator, TauriViewport,
};
use commands::{
    apply_ar_gesture, close_ar_session, get_ar_snapshot, get_ar_tuning, get_governor, get_site,
    list_sites, open_ar_session, place_ar_model, query_camera_permission, retry_ar_session,
    scan_qr_image, set_ar_sensors, set_ar_tuning, set_interaction_mode,
};

pub(crate) struct AppState {
    pub(crate) catalog: &'static StaticCatalog,
    pub(crate) session: ArSessionController,
    pub(crate) scanner: Mutex<ScanController>,
    pub(crate) settings: SettingsStore,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // HERITAGE_LENS_DEBUG=1 lowers the filter so per-frame logs show up.
    let debug = std::env::var("HERITAGE_LENS_DEBUG").is_ok_and(|value| value == "1");
    env_logger::Builder::from_default_env()
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    info!("Heritage Lens starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;
                let resource_dir = app
                    .path()
                    .resource_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;

                let settings = SettingsStore::new(app_data_dir.join("settings.json"))?;
                let tuning = settings.ar_tuning();
                let catalog = StaticCatalog::embedded();
                let handle = app.handle().clone();

                let arbiter = Arc::new(CameraArbiter::new());
                let permission = CameraPermission::new();
                let camera = Arc::new(NoCaptureCamera);

                let session = ArSessionController::new(
                    SessionDeps {
                        camera: camera.clone(),
                        arbiter: arbiter.clone(),
                        permission: permission.clone(),
                        sensors: Arc::new(NoMotionSensors),
                        loader: Arc::new(GlbFileLoader::new(resource_dir)),
                        viewport: Arc::new(TauriViewport::new(handle.clone())),
                        events: Arc::new(TauriEvents::new(handle.clone())),
                        surface_model: None,
                    },
                    tuning.clone(),
                );

                let scanner = ScanController::new(
                    Arc::new(catalog.clone()),
                    Arc::new(RqrrDecoder::new()),
                    Arc::new(TauriNavigator::new(handle)),
                    tuning.scan_interval(),
                )
                .with_camera(MediaAcquirer::new(camera, arbiter, permission));

                app.manage(AppState {
                    catalog,
                    session,
                    scanner: Mutex::new(scanner),
                    settings,
                });

                info!("Catalog loaded with {} sites", catalog.sites().len());
                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_site,
            list_sites,
            get_governor,
            open_ar_session,
            close_ar_session,
            retry_ar_session,
            get_ar_snapshot,
            set_interaction_mode,
            apply_ar_gesture,
            place_ar_model,
            set_ar_sensors,
            query_camera_permission,
            scan_qr_image,
            get_ar_tuning,
            set_ar_tuning,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
