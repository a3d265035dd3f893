use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use heritage_lens_lib::{
    catalog::StaticCatalog,
    interaction::{Gesture, InteractionMode},
    media::{CameraArbiter, CameraFault, CameraPermission, PermissionState},
    pose::{CameraPose, SensorStatus},
    ArError,
    session::{
        ArSessionController, ArStage, OpenRequest, ReadyReason, SessionDeps, SessionSnapshot,
    },
    settings::ArTuning,
    testing::{FakeCamera, FakeLoader, FakeSensors, RecordingEvents, RecordingViewport},
};
use tokio::time::Instant;

struct Harness {
    camera: Arc<FakeCamera>,
    sensors: Arc<FakeSensors>,
    loader: Arc<FakeLoader>,
    viewport: Arc<RecordingViewport>,
    events: Arc<RecordingEvents>,
    controller: ArSessionController,
}

fn harness(camera: Arc<FakeCamera>, sensors: Arc<FakeSensors>, loader: Arc<FakeLoader>) -> Harness {
    let viewport = RecordingViewport::new();
    let events = RecordingEvents::new();
    let controller = ArSessionController::new(
        SessionDeps {
            camera: camera.clone(),
            arbiter: Arc::new(CameraArbiter::new()),
            permission: CameraPermission::new(),
            sensors: sensors.clone(),
            loader: loader.clone(),
            viewport: viewport.clone(),
            events: events.clone(),
            surface_model: None,
        },
        ArTuning::default(),
    );
    Harness {
        camera,
        sensors,
        loader,
        viewport,
        events,
        controller,
    }
}

fn request() -> OpenRequest {
    OpenRequest {
        site_id: Some("benteng-marlborough".into()),
        model_url: "/models/benteng-marlborough.glb".into(),
    }
}

async fn wait_for_stage(
    controller: &ArSessionController,
    stage: ArStage,
    within: Duration,
) -> SessionSnapshot {
    let mut rx = controller.subscribe();
    let snapshot = tokio::time::timeout(within, rx.wait_for(|s| s.stage == stage))
        .await
        .unwrap_or_else(|_| panic!("session never reached {stage}"))
        .expect("session channel closed")
        .clone();
    snapshot
}

#[tokio::test(start_paused = true)]
async fn happy_path_reaches_interactive_once_the_model_loads() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::from_millis(50)),
    );
    h.controller.open(request()).await;

    wait_for_stage(&h.controller, ArStage::ModelLoading, Duration::from_secs(5)).await;
    let loading_at = Instant::now();
    let snapshot = wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;

    assert!(loading_at.elapsed() <= Duration::from_millis(300));
    assert!(snapshot.model_ready);
    assert_eq!(snapshot.ready_reason, Some(ReadyReason::Loaded));
    assert!(snapshot.surface_detected);
    assert!(snapshot.model_position.is_some());
    assert_eq!(snapshot.camera_permission, PermissionState::Granted);
    assert_eq!(h.loader.requested_urls(), vec!["/models/benteng-marlborough.glb"]);
    assert_eq!(
        h.events.stages(),
        vec![
            ArStage::Initializing,
            ArStage::CameraStarting,
            ArStage::CameraActive,
            ArStage::SurfaceDetecting,
            ArStage::ModelLoading,
            ArStage::Interactive,
        ]
    );
    assert!(h.viewport.is_locked());

    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn silent_loader_is_forced_ready_within_the_bound() {
    for loader in [FakeLoader::never(), FakeLoader::failing(), FakeLoader::empty()] {
        let h = harness(FakeCamera::new(), FakeSensors::new(), loader);
        h.controller.open(request()).await;

        wait_for_stage(&h.controller, ArStage::ModelLoading, Duration::from_secs(5)).await;
        let loading_at = Instant::now();
        let snapshot =
            wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;

        assert!(loading_at.elapsed() <= Duration::from_secs(5));
        assert!(snapshot.model_ready);
        assert_eq!(snapshot.ready_reason, Some(ReadyReason::Forced));
        assert!(snapshot.error.is_none());
        h.controller.close().await;
    }
}

#[tokio::test(start_paused = true)]
async fn denied_camera_moves_to_error_and_records_denial() {
    let h = harness(
        FakeCamera::failing(CameraFault::named("NotAllowedError")),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;

    let snapshot = wait_for_stage(&h.controller, ArStage::Error, Duration::from_secs(15)).await;
    let error = snapshot.error.expect("error report");
    assert_eq!(error.code, "permission_denied");
    assert!(error.retryable);
    assert_eq!(snapshot.camera_permission, PermissionState::Denied);
    assert_eq!(h.camera.live_tracks(), 0);

    // Still closeable from Error.
    assert!(h.viewport.is_locked());
    let closed = h.controller.close().await;
    assert_eq!(closed.stage, ArStage::Closed);
    assert!(!h.viewport.is_locked());
}

#[tokio::test(start_paused = true)]
async fn unanswered_prompt_times_out_into_error() {
    let h = harness(
        FakeCamera::hanging(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;

    let snapshot = wait_for_stage(&h.controller, ArStage::Error, Duration::from_secs(15)).await;
    assert_eq!(snapshot.error.map(|e| e.code), Some("acquisition_timeout".to_string()));
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn retry_after_busy_camera_recovers() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::from_millis(10)),
    );
    h.camera.fail_next(CameraFault::named("NotReadableError"));
    h.controller.open(request()).await;

    let failed = wait_for_stage(&h.controller, ArStage::Error, Duration::from_secs(15)).await;
    assert_eq!(failed.error.map(|e| e.code), Some("device_busy".to_string()));
    // Not retried automatically.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.controller.snapshot().await.stage, ArStage::Error);

    let restarted = h.controller.retry().await.unwrap();
    assert_eq!(restarted.stage, ArStage::Initializing);
    assert!(restarted.error.is_none());
    assert_ne!(restarted.session_id, failed.session_id);

    let ready = wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;
    assert!(ready.model_ready);
    assert_eq!(h.camera.live_tracks(), 1);
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn retry_is_refused_outside_error() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    assert!(h.controller.retry().await.is_err());
    h.controller.open(request()).await;
    assert!(h.controller.retry().await.is_err());
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_from_any_stage_leaves_nothing_running() {
    for stage in [
        ArStage::Initializing,
        ArStage::CameraStarting,
        ArStage::CameraActive,
        ArStage::ModelLoading,
        ArStage::Interactive,
    ] {
        let camera = FakeCamera::new();
        camera.set_prompt_delay(Duration::from_secs(1));
        let h = harness(camera, FakeSensors::new(), FakeLoader::never());
        h.controller.open(request()).await;
        assert_eq!(h.controller.enable_sensors().await, SensorStatus::Enabled);

        wait_for_stage(&h.controller, stage, Duration::from_secs(10)).await;
        let closed = h.controller.close().await;

        assert_eq!(closed.stage, ArStage::Closed, "closing from {stage}");
        let resources = h.controller.resources().await;
        assert_eq!(resources.live_tracks, 0, "tracks after closing from {stage}");
        assert!(!resources.detection_running, "frame loop after closing from {stage}");
        assert!(!resources.sensors_attached, "sensors after closing from {stage}");
        assert!(!resources.pipeline_running, "timers after closing from {stage}");
        assert!(!resources.scroll_locked);
        assert_eq!(h.camera.live_tracks(), 0);
        assert_eq!(h.sensors.listener_count(), 0);
        assert!(!h.viewport.is_locked());

        // Nothing wakes up later and moves the session again.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.controller.snapshot().await.stage, ArStage::Closed);
    }
}

#[tokio::test(start_paused = true)]
async fn reopening_starts_from_clean_state() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::from_millis(10)),
    );
    let first = h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;
    h.controller
        .set_interaction_mode(InteractionMode::Rotate)
        .await
        .unwrap();
    h.controller
        .apply_gesture(Gesture::Drag { dx: 0.25, dy: 0.0 })
        .await
        .unwrap();
    h.controller.place_model().await.unwrap();
    h.controller.close().await;

    let second = h.controller.open(request()).await;
    assert_ne!(second.session_id, first.session_id);
    assert_eq!(second.stage, ArStage::Initializing);
    assert!(!second.surface_detected);
    assert!(!second.model_ready);
    assert!(second.placements.is_empty());
    assert_eq!(second.interaction_mode, InteractionMode::Move);
    assert_eq!(second.model_transform.yaw, 0.0);

    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;
    assert_eq!(h.camera.live_tracks(), 1);
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn interaction_waits_for_interactive() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::never(),
    );
    h.controller.open(request()).await;
    assert!(h
        .controller
        .set_interaction_mode(InteractionMode::Scale)
        .await
        .is_err());
    assert!(h
        .controller
        .apply_gesture(Gesture::Drag { dx: 0.1, dy: 0.1 })
        .await
        .is_err());
    assert!(h.controller.place_model().await.is_err());

    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;
    assert_eq!(
        h.controller
            .set_interaction_mode(InteractionMode::Scale)
            .await
            .unwrap(),
        InteractionMode::Scale
    );
    let outcome = h
        .controller
        .apply_gesture(Gesture::Drag { dx: 0.0, dy: -1.0 })
        .await
        .unwrap();
    assert_eq!(outcome.transform.scale, 2.0);

    // Pinch and pan move the camera rig, not the model.
    h.controller
        .apply_gesture(Gesture::Pinch { factor: 2.0 })
        .await
        .unwrap();
    let outcome = h
        .controller
        .apply_gesture(Gesture::Pan { dx: 0.1, dy: -0.2 })
        .await
        .unwrap();
    assert_eq!(outcome.transform.scale, 2.0);
    assert_eq!(outcome.rig.zoom, 2.0);
    assert_eq!(outcome.rig.pan, Vec2::new(0.1, -0.2));
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.camera_rig, outcome.rig);
    assert_eq!(h.events.snapshots().last().map(|s| s.camera_rig), Some(outcome.rig));

    let placed = h.controller.place_model().await.unwrap();
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.placements.len(), 1);
    assert!(h.controller.remove_placement(placed).await);
    assert!(!h.controller.remove_placement(placed).await);

    h.controller.place_model().await.unwrap();
    h.controller.place_model().await.unwrap();
    assert_eq!(h.controller.snapshot().await.placements.len(), 2);
    h.controller.reset_placements().await;
    assert!(h.controller.snapshot().await.placements.is_empty());
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn refused_sensors_keep_the_fixed_camera() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::gated(false),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;

    assert_eq!(h.controller.enable_sensors().await, SensorStatus::Refused);
    assert_eq!(h.sensors.permission_requests(), 1);
    assert_eq!(h.sensors.listener_count(), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.stage, ArStage::Interactive);
    assert!(!snapshot.sensors_enabled);
    let frame = *h.controller.poses().borrow();
    let surface = frame.surface.expect("surface tracked");
    assert_eq!(frame.camera, CameraPose::fixed(surface));
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn unsupported_platform_is_reported_not_fatal() {
    let h = harness(
        FakeCamera::unsupported(),
        FakeSensors::unsupported(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;
    let snapshot = wait_for_stage(&h.controller, ArStage::Error, Duration::from_secs(5)).await;
    let error = snapshot.error.expect("error report");
    assert_eq!(error.code, "unsupported_platform");
    assert!(!error.retryable);
    assert_eq!(h.controller.enable_sensors().await, SensorStatus::Unsupported);
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_abort_moves_to_error() {
    let camera = FakeCamera::new();
    camera.set_prompt_delay(Duration::from_secs(3));
    let h = harness(camera, FakeSensors::new(), FakeLoader::never());
    h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::CameraStarting, Duration::from_secs(1)).await;

    assert!(
        h.controller
            .report_error(ArError::DeviceBusy)
            .await
    );
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.stage, ArStage::Error);
    assert_eq!(h.camera.live_tracks(), 0);
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn catalog_sites_open_by_id() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    let catalog = StaticCatalog::embedded();

    assert!(h.controller.open_site(catalog, "no-such-site").await.is_err());
    // Listed but has no model.
    assert!(h
        .controller
        .open_site(catalog, "tugu-thomas-parr")
        .await
        .is_err());

    let snapshot = h
        .controller
        .open_site(catalog, "masjid-jamik")
        .await
        .unwrap();
    assert_eq!(snapshot.site_id.as_deref(), Some("masjid-jamik"));
    assert_eq!(snapshot.stage, ArStage::Initializing);
    h.controller.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_finishes_while_the_sensor_prompt_is_open() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::deferred(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;

    let controller = h.controller.clone();
    let enabling = tokio::spawn(async move { controller.enable_sensors().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.sensors.permission_requests(), 1);

    let closed = tokio::time::timeout(Duration::from_secs(1), h.controller.close())
        .await
        .expect("close waits on the sensor prompt");
    assert_eq!(closed.stage, ArStage::Closed);
    assert!(!h.viewport.is_locked());

    // A grant that arrives after close must not attach anything.
    h.sensors.answer_prompt(true);
    assert_eq!(enabling.await.unwrap(), SensorStatus::Disabled);
    assert_eq!(h.sensors.listener_count(), 0);
    assert!(!h.controller.snapshot().await.sensors_enabled);
    assert!(!h.controller.resources().await.sensors_attached);
}

#[tokio::test(start_paused = true)]
async fn sensors_stay_off_outside_an_open_session() {
    let h = harness(
        FakeCamera::new(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    assert_eq!(h.controller.enable_sensors().await, SensorStatus::Disabled);
    assert_eq!(h.sensors.listener_count(), 0);

    h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::Interactive, Duration::from_secs(5)).await;
    assert_eq!(h.controller.enable_sensors().await, SensorStatus::Enabled);
    assert_eq!(h.sensors.listener_count(), 1);
    assert!(h.controller.snapshot().await.sensors_enabled);

    h.controller.close().await;
    assert_eq!(h.sensors.listener_count(), 0);
    assert_eq!(h.controller.enable_sensors().await, SensorStatus::Disabled);
    assert_eq!(h.sensors.listener_count(), 0);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.stage, ArStage::Closed);
    assert!(!snapshot.sensors_enabled);
}

#[tokio::test(start_paused = true)]
async fn permission_query_answers_while_the_camera_prompt_is_pending() {
    let h = harness(
        FakeCamera::hanging(),
        FakeSensors::new(),
        FakeLoader::ready_after(Duration::ZERO),
    );
    h.controller.open(request()).await;
    wait_for_stage(&h.controller, ArStage::CameraStarting, Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let permission = tokio::time::timeout(
        Duration::from_millis(10),
        h.controller.query_camera_permission(),
    )
    .await
    .expect("permission query waits on the camera request");
    assert_eq!(permission, PermissionState::Prompt);
    assert_eq!(started.elapsed(), Duration::ZERO);

    let resources = tokio::time::timeout(Duration::from_millis(10), h.controller.resources())
        .await
        .expect("resource report waits on the camera request");
    assert_eq!(resources.live_tracks, 0);
    assert!(resources.pipeline_running);
    assert_eq!(h.controller.snapshot().await.stage, ArStage::CameraStarting);

    h.controller.close().await;
}
