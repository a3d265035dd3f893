use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, bail, Result};
use glam::Vec3;
use log::{info, warn};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    catalog::Catalog,
    navigation::DeepLink,
    error::ArError,
    interaction::{Gesture, GestureOutcome, InteractionMode},
    media::{
        wait_for_video_ready, CameraArbiter, CameraBackend, CameraPermission, MediaAcquirer,
        PermissionQuery, PermissionState, StreamConstraints,
    },
    pose::{
        EstimatorConfig, PoseEstimator, PoseFrame, SensorGate, SensorSource, SensorStatus,
        SimulatedSurface, SurfaceModel, SurfaceUpdate,
    },
    settings::ArTuning,
};

use super::{
    events::{EventSink, Viewport},
    loader::ModelLoader,
    readiness::{await_model_ready, ReadyPolicy},
    state::{ArSessionState, ArStage, OpenRequest, SessionSnapshot},
};

/// Collaborators an AR session talks to.
pub struct SessionDeps {
    pub camera: Arc<dyn CameraBackend>,
    pub arbiter: Arc<CameraArbiter>,
    pub permission: CameraPermission,
    pub sensors: Arc<dyn SensorSource>,
    pub loader: Arc<dyn ModelLoader>,
    pub viewport: Arc<dyn Viewport>,
    pub events: Arc<dyn EventSink>,
    /// Defaults to the procedural surface built from the tuning.
    pub surface_model: Option<Arc<dyn SurfaceModel>>,
}

/// What is still alive for the current session. Everything is zero/false
/// after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReport {
    pub live_tracks: usize,
    pub detection_running: bool,
    pub sensors_attached: bool,
    pub pipeline_running: bool,
    pub scroll_locked: bool,
}

struct Pipeline {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct ArSessionController {
    state: Arc<Mutex<ArSessionState>>,
    media: Arc<Mutex<MediaAcquirer>>,
    estimator: Arc<Mutex<PoseEstimator>>,
    pipeline: Arc<Mutex<Option<Pipeline>>>,
    poses: watch::Receiver<PoseFrame>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    scroll_locked: Arc<AtomicBool>,
    permission: CameraPermission,
    permission_query: PermissionQuery,
    loader: Arc<dyn ModelLoader>,
    viewport: Arc<dyn Viewport>,
    events: Arc<dyn EventSink>,
    tuning: ArTuning,
}

impl ArSessionController {
    pub fn new(deps: SessionDeps, tuning: ArTuning) -> Self {
        let tuning = tuning.normalized();
        let surface_model = deps
            .surface_model
            .unwrap_or_else(|| Arc::new(SimulatedSurface::from_tuning(&tuning)));

        let estimator = PoseEstimator::new(
            surface_model,
            deps.sensors,
            EstimatorConfig {
                frame_interval: tuning.frame_interval(),
                motion_damping: tuning.motion_damping,
            },
        );
        let poses = estimator.subscribe();

        let state = ArSessionState::new();
        let initial = SessionSnapshot::capture(&state, deps.permission.current(), None);
        let (snapshots, _rx) = watch::channel(initial);

        let media = MediaAcquirer::new(deps.camera, deps.arbiter, deps.permission.clone());
        let permission_query = media.permission_query();

        Self {
            state: Arc::new(Mutex::new(state)),
            media: Arc::new(Mutex::new(media)),
            estimator: Arc::new(Mutex::new(estimator)),
            pipeline: Arc::new(Mutex::new(None)),
            poses,
            snapshots: Arc::new(snapshots),
            scroll_locked: Arc::new(AtomicBool::new(false)),
            permission: deps.permission,
            permission_query,
            loader: deps.loader,
            viewport: deps.viewport,
            events: deps.events,
            tuning,
        }
    }

    pub fn tuning(&self) -> &ArTuning {
        &self.tuning
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn poses(&self) -> watch::Receiver<PoseFrame> {
        self.poses.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        self.capture(&state)
    }

    /// Open a session for a catalog site. Unknown sites and sites without a
    /// model are reported as not found.
    pub async fn open_site(&self, catalog: &dyn Catalog, site_id: &str) -> Result<SessionSnapshot> {
        let site = match DeepLink::requested_site(catalog, site_id) {
            DeepLink::Found(site) => site,
            DeepLink::NotFound(id) => bail!("site '{id}' not found"),
        };
        let model_url = site
            .model_url
            .clone()
            .ok_or_else(|| anyhow!("site '{site_id}' has no 3D model"))?;

        Ok(self
            .open(OpenRequest {
                site_id: Some(site.id.clone()),
                model_url,
            })
            .await)
    }

    /// Start a fresh session. Anything left from a previous session is torn
    /// down first.
    pub async fn open(&self, request: OpenRequest) -> SessionSnapshot {
        self.stop_pipeline().await;

        let session_id = {
            let mut state = self.state.lock().await;
            state.begin(request);
            info!(
                "AR session {:?} opened for {:?}",
                state.session_id,
                state.request.as_ref().map(|r| r.model_url.as_str())
            );
            state.session_id
        };
        // After the new id is in place, so a late sensor grant for the old
        // session cannot attach.
        self.release_capture().await;

        self.lock_viewport();
        self.emit().await;

        if let Some(session_id) = session_id {
            self.spawn_pipeline(session_id).await;
        }
        self.snapshot().await
    }

    /// Re-enter `Initializing` after an error.
    pub async fn retry(&self) -> Result<SessionSnapshot> {
        {
            let state = self.state.lock().await;
            if state.stage != ArStage::Error {
                bail!("retry is only available after an error (stage: {})", state.stage);
            }
        }

        self.stop_pipeline().await;
        self.estimator.lock().await.stop_detection();
        self.media.lock().await.release();

        let session_id = {
            let mut state = self.state.lock().await;
            if !state.restart() {
                bail!("session changed while retrying");
            }
            info!("AR session retrying as {:?}", state.session_id);
            state.session_id
        };

        self.lock_viewport();
        self.emit().await;

        if let Some(session_id) = session_id {
            self.spawn_pipeline(session_id).await;
        }
        Ok(self.snapshot().await)
    }

    /// Close from any stage. Releases the camera, sensors, loops and timers
    /// and gives the page its scrolling back.
    pub async fn close(&self) -> SessionSnapshot {
        self.stop_pipeline().await;
        self.state.lock().await.close();
        self.release_capture().await;
        self.unlock_viewport();
        self.emit().await;
        self.snapshot().await
    }

    /// Move an open session into `Error`, e.g. when the shell detects a
    /// missing capability or the user aborts setup.
    pub async fn report_error(&self, error: ArError) -> bool {
        if !self.state.lock().await.stage.is_open() {
            return false;
        }
        self.stop_pipeline().await;
        self.halt_capture().await;

        let changed = self.state.lock().await.fail(error);
        if changed {
            self.emit().await;
        }
        changed
    }

    pub async fn set_interaction_mode(&self, mode: InteractionMode) -> Result<InteractionMode> {
        {
            let mut state = self.state.lock().await;
            if !state.can_manipulate() {
                bail!(
                    "interaction modes are unavailable until the model is placed (stage: {})",
                    state.stage
                );
            }
            state.interaction.set_mode(mode);
        }
        self.emit().await;
        Ok(mode)
    }

    pub async fn apply_gesture(&self, gesture: Gesture) -> Result<GestureOutcome> {
        let outcome = {
            let mut state = self.state.lock().await;
            if !state.can_manipulate() {
                bail!("model is not interactive yet (stage: {})", state.stage);
            }
            state.interaction.apply(gesture)
        };
        self.emit().await;
        Ok(outcome)
    }

    /// Drop another instance of the model where the surface currently is.
    pub async fn place_model(&self) -> Result<Uuid> {
        let id = {
            let mut state = self.state.lock().await;
            let surface = match state.surface_position {
                Some(surface) if state.can_manipulate() => surface,
                _ => bail!("no surface to place on (stage: {})", state.stage),
            };
            let transform = state.interaction.transform();
            state
                .placements
                .place(transform.world_position(surface), transform.yaw)
        };
        self.emit().await;
        Ok(id)
    }

    pub async fn remove_placement(&self, id: Uuid) -> bool {
        let removed = self.state.lock().await.placements.remove(id);
        if removed {
            self.emit().await;
        }
        removed
    }

    pub async fn reset_placements(&self) {
        self.state.lock().await.placements.reset();
        self.emit().await;
    }

    /// User-initiated: may show a sensor permission prompt. Only an open
    /// session can attach sensors, and it must still be the same session
    /// once the prompt is answered.
    pub async fn enable_sensors(&self) -> SensorStatus {
        let session_id = {
            let state = self.state.lock().await;
            match state.session_id {
                Some(session_id) if state.stage.is_open() => session_id,
                _ => return SensorStatus::Disabled,
            }
        };

        // No lock is held while the prompt is up.
        let gate = self.estimator.lock().await.sensor_gate();
        let granted = match gate {
            SensorGate::Unsupported => return SensorGate::unsupported(),
            SensorGate::Prompt(source) => SensorGate::ask(source.as_ref()).await,
            SensorGate::Attached | SensorGate::Open => true,
        };
        if !granted {
            return SensorStatus::Refused;
        }

        let status = {
            let mut estimator = self.estimator.lock().await;
            let mut state = self.state.lock().await;
            if state.session_id != Some(session_id) || !state.stage.is_open() {
                info!("Session ended while the sensor prompt was open");
                return SensorStatus::Disabled;
            }
            state.sensors_enabled = true;
            estimator.attach_sensors()
        };
        self.emit().await;
        status
    }

    pub async fn disable_sensors(&self) -> SensorStatus {
        self.estimator.lock().await.disable_sensors();
        self.state.lock().await.sensors_enabled = false;
        self.emit().await;
        SensorStatus::Disabled
    }

    /// Does not wait on a pending camera request.
    pub async fn query_camera_permission(&self) -> PermissionState {
        self.permission_query.query().await
    }

    pub async fn resources(&self) -> ResourceReport {
        let pipeline_running = self
            .pipeline
            .lock()
            .await
            .as_ref()
            .is_some_and(|pipeline| !pipeline.handle.is_finished());
        let live_tracks = self.media.lock().await.active_tracks();
        let (detection_running, sensors_attached) = {
            let estimator = self.estimator.lock().await;
            (estimator.is_running(), estimator.sensors_attached())
        };

        ResourceReport {
            live_tracks,
            detection_running,
            sensors_attached,
            pipeline_running,
            scroll_locked: self.scroll_locked.load(Ordering::SeqCst),
        }
    }

    async fn release_capture(&self) {
        self.estimator.lock().await.shutdown();
        self.media.lock().await.release();
    }

    /// Stop capture after an error while leaving the session open.
    async fn halt_capture(&self) {
        self.estimator.lock().await.stop_detection();
        self.media.lock().await.release();
    }

    async fn spawn_pipeline(&self, session_id: Uuid) {
        let mut guard = self.pipeline.lock().await;
        if let Some(previous) = guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = controller.run_pipeline(session_id) => {}
            }
        });

        *guard = Some(Pipeline {
            handle,
            cancel_token,
        });
    }

    async fn stop_pipeline(&self) {
        let pipeline = self.pipeline.lock().await.take();
        if let Some(pipeline) = pipeline {
            pipeline.cancel_token.cancel();
            pipeline.handle.abort();
            // Wait for the task to drop any locks it held.
            let _ = pipeline.handle.await;
        }
    }

    async fn run_pipeline(self, session_id: Uuid) {
        let tuning = self.tuning.clone();

        tokio::time::sleep(tuning.init_settle()).await;
        if !self.advance(session_id, ArStage::CameraStarting).await {
            return;
        }

        // The prompt may take up to the camera timeout; the acquirer stays
        // unlocked meanwhile.
        let pending = self.media.lock().await.begin_request(StreamConstraints::default());
        let opened = match pending {
            Ok(pending) => pending.open(tuning.camera_timeout()).await,
            Err(err) => Err(err),
        };
        let acquired = match opened {
            Ok(handle) => {
                let mut media = self.media.lock().await;
                media.commit(handle);
                Ok(media.readiness_signals())
            }
            Err(err) => Err(err),
        };
        let signals = match acquired {
            Ok(signals) => signals,
            Err(err) => {
                self.fail_from_pipeline(session_id, err).await;
                return;
            }
        };
        if !self.advance(session_id, ArStage::CameraActive).await {
            return;
        }

        wait_for_video_ready(signals, tuning.video_ready_timeout()).await;
        tokio::time::sleep(tuning.camera_stabilize()).await;
        if !self.advance(session_id, ArStage::SurfaceDetecting).await {
            return;
        }

        let (surface_tx, mut surface_rx) = watch::channel(None::<Vec3>);
        {
            let surface_tx = Arc::new(surface_tx);
            self.estimator
                .lock()
                .await
                .start_detection(Arc::new(move |update: SurfaceUpdate| {
                    surface_tx.send_replace(Some(update.position));
                }));
        }

        let first = loop {
            if let Some(position) = *surface_rx.borrow_and_update() {
                break position;
            }
            if surface_rx.changed().await.is_err() {
                warn!("Surface detection stopped before reporting a position");
                return;
            }
        };
        {
            let mut state = self.state.lock().await;
            if state.session_id != Some(session_id) {
                return;
            }
            state.record_surface(first);
        }
        if !self.advance(session_id, ArStage::ModelLoading).await {
            return;
        }

        let model_url = {
            let state = self.state.lock().await;
            match state.request.as_ref() {
                Some(request) => request.model_url.clone(),
                None => return,
            }
        };
        let policy = ReadyPolicy {
            settle: tuning.model_settle(),
            force_after: tuning.force_ready_after(),
        };
        let reason = await_model_ready(self.loader.load(&model_url), policy).await;

        {
            let mut state = self.state.lock().await;
            if state.session_id != Some(session_id) {
                return;
            }
            if state.mark_model_ready(reason) {
                info!("Model {} ready ({:?})", model_url, reason);
            }
            if !state.advance(ArStage::Interactive) {
                return;
            }
        }
        self.emit().await;

        // Keep the placement point on the moving surface until the session ends.
        while surface_rx.changed().await.is_ok() {
            let latest = *surface_rx.borrow_and_update();
            if let Some(position) = latest {
                let mut state = self.state.lock().await;
                if state.session_id != Some(session_id) {
                    break;
                }
                state.record_surface(position);
            }
        }
    }

    async fn advance(&self, session_id: Uuid, next: ArStage) -> bool {
        let advanced = {
            let mut state = self.state.lock().await;
            state.session_id == Some(session_id) && state.advance(next)
        };
        if advanced {
            self.emit().await;
        }
        advanced
    }

    async fn fail_from_pipeline(&self, session_id: Uuid, error: ArError) {
        self.halt_capture().await;
        let failed = {
            let mut state = self.state.lock().await;
            state.session_id == Some(session_id) && state.fail(error)
        };
        if failed {
            self.emit().await;
        }
    }

    fn lock_viewport(&self) {
        if !self.scroll_locked.swap(true, Ordering::SeqCst) {
            self.viewport.lock_scroll();
        }
    }

    fn unlock_viewport(&self) {
        if self.scroll_locked.swap(false, Ordering::SeqCst) {
            self.viewport.unlock_scroll();
        }
    }

    fn capture(&self, state: &ArSessionState) -> SessionSnapshot {
        let frame = *self.poses.borrow();
        let camera_pose = frame.surface.map(|_| frame.camera);
        SessionSnapshot::capture(state, self.permission.current(), camera_pose)
    }

    async fn emit(&self) {
        let snapshot = {
            let state = self.state.lock().await;
            self.capture(&state)
        };
        self.snapshots.send_replace(snapshot.clone());
        self.events.publish(&snapshot);
    }
}
