//! In-memory collaborators for the AR core.
//!
//! Used by the unit and integration tests, and by headless hosts that want
//! to drive a session without camera or sensor hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;

use crate::{
    media::{
        CameraBackend, CameraFault, MediaStreamHandle, MediaTrack, PermissionState,
        StreamConstraints, VideoReadiness,
    },
    navigation::{Navigator, Route},
    pose::{MotionSample, OrientationSample, SensorFeed, SensorSource, SensorSubscription},
    scanner::{FrameSource, LumaFrame, QrDecoder},
    session::{ArStage, EventSink, LoadError, LoadedScene, ModelLoader, SessionSnapshot, Viewport},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct FakeTrack {
    label: String,
    live: AtomicBool,
    stops: AtomicUsize,
}

impl FakeTrack {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        })
    }

    /// Stops that actually ended a live track.
    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaTrack for FakeTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

enum OpenBehavior {
    Succeed,
    Fail(CameraFault),
    Hang,
}

/// Camera that hands out one video track per successful open.
pub struct FakeCamera {
    behavior: OpenBehavior,
    supported: bool,
    readiness_events: bool,
    prompt_delay: Mutex<Duration>,
    permission_api: Mutex<Option<PermissionState>>,
    queued_faults: Mutex<VecDeque<CameraFault>>,
    opened: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeCamera {
    fn with_behavior(behavior: OpenBehavior) -> Self {
        Self {
            behavior,
            supported: true,
            readiness_events: true,
            prompt_delay: Mutex::new(Duration::ZERO),
            permission_api: Mutex::new(Some(PermissionState::Prompt)),
            queued_faults: Mutex::new(VecDeque::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_behavior(OpenBehavior::Succeed))
    }

    pub fn failing(fault: CameraFault) -> Arc<Self> {
        Arc::new(Self::with_behavior(OpenBehavior::Fail(fault)))
    }

    /// The permission prompt is never answered.
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self::with_behavior(OpenBehavior::Hang))
    }

    /// No media capture API at all.
    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            ..Self::with_behavior(OpenBehavior::Succeed)
        })
    }

    /// Streams open fine but the video surface never fires readiness events.
    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            readiness_events: false,
            ..Self::with_behavior(OpenBehavior::Succeed)
        })
    }

    /// Fail the next open with `fault`, then behave as configured.
    pub fn fail_next(&self, fault: CameraFault) {
        lock(&self.queued_faults).push_back(fault);
    }

    pub fn set_prompt_delay(&self, delay: Duration) {
        *lock(&self.prompt_delay) = delay;
    }

    pub fn set_permission_api(&self, state: Option<PermissionState>) {
        *lock(&self.permission_api) = state;
    }

    pub fn opened_tracks(&self) -> Vec<Arc<FakeTrack>> {
        lock(&self.opened).clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.opened).len()
    }

    pub fn live_tracks(&self) -> usize {
        lock(&self.opened)
            .iter()
            .filter(|track| track.is_live())
            .count()
    }
}

#[async_trait]
impl CameraBackend for FakeCamera {
    fn supports_capture(&self) -> bool {
        self.supported
    }

    async fn query_permission(&self) -> Option<PermissionState> {
        *lock(&self.permission_api)
    }

    async fn open(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Vec<Arc<dyn MediaTrack>>, CameraFault> {
        let delay = *lock(&self.prompt_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let queued = lock(&self.queued_faults).pop_front();
        if let Some(fault) = queued {
            return Err(fault);
        }

        match &self.behavior {
            OpenBehavior::Succeed => {
                let label = format!("{:?} camera", constraints.facing);
                let track = FakeTrack::new(&label);
                lock(&self.opened).push(track.clone());
                let track: Arc<dyn MediaTrack> = track;
                Ok(vec![track])
            }
            OpenBehavior::Fail(fault) => Err(fault.clone()),
            OpenBehavior::Hang => futures::future::pending().await,
        }
    }

    fn readiness_signals(
        &self,
        _stream: &MediaStreamHandle,
    ) -> Vec<BoxFuture<'static, VideoReadiness>> {
        if !self.readiness_events {
            return Vec::new();
        }
        vec![
            async { VideoReadiness::LoadedMetadata }.boxed(),
            futures::future::pending().boxed(),
        ]
    }
}

/// Orientation/motion source driven by the test.
enum SensorPrompt {
    /// The platform never prompts.
    Absent,
    Answered(bool),
    /// Stays open until `answer_prompt`.
    Deferred(watch::Sender<Option<bool>>),
}

pub struct FakeSensors {
    supported: bool,
    prompt: SensorPrompt,
    next_id: AtomicU64,
    listeners: Arc<Mutex<HashMap<u64, SensorFeed>>>,
    permission_requests: AtomicUsize,
}

impl FakeSensors {
    fn build(supported: bool, prompt: SensorPrompt) -> Arc<Self> {
        Arc::new(Self {
            supported,
            prompt,
            next_id: AtomicU64::new(0),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            permission_requests: AtomicUsize::new(0),
        })
    }

    /// No permission prompt on this platform.
    pub fn new() -> Arc<Self> {
        Self::build(true, SensorPrompt::Absent)
    }

    /// Prompting platform; the user answers `grant`.
    pub fn gated(grant: bool) -> Arc<Self> {
        Self::build(true, SensorPrompt::Answered(grant))
    }

    /// Prompting platform where the prompt stays open until answered.
    pub fn deferred() -> Arc<Self> {
        let (tx, _rx) = watch::channel(None);
        Self::build(true, SensorPrompt::Deferred(tx))
    }

    pub fn unsupported() -> Arc<Self> {
        Self::build(false, SensorPrompt::Absent)
    }

    /// Answer an open `deferred` prompt. No effect on other variants.
    pub fn answer_prompt(&self, grant: bool) {
        if let SensorPrompt::Deferred(tx) = &self.prompt {
            tx.send_replace(Some(grant));
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn emit_orientation(&self, sample: OrientationSample) {
        for feed in lock(&self.listeners).values() {
            feed.push_orientation(sample);
        }
    }

    pub fn emit_motion(&self, sample: MotionSample) {
        for feed in lock(&self.listeners).values() {
            feed.push_motion(sample);
        }
    }
}

#[async_trait]
impl SensorSource for FakeSensors {
    fn supports_orientation(&self) -> bool {
        self.supported
    }

    fn requires_permission(&self) -> bool {
        !matches!(self.prompt, SensorPrompt::Absent)
    }

    async fn request_permission(&self) -> bool {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        match &self.prompt {
            SensorPrompt::Absent => true,
            SensorPrompt::Answered(grant) => *grant,
            SensorPrompt::Deferred(tx) => {
                let mut rx = tx.subscribe();
                let answer = match rx.wait_for(Option::is_some).await {
                    Ok(answer) => (*answer).unwrap_or(false),
                    Err(_) => false,
                };
                answer
            }
        }
    }

    fn attach(&self, feed: SensorFeed) -> SensorSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, feed);
        let listeners = self.listeners.clone();
        SensorSubscription::new(move || {
            lock(&listeners).remove(&id);
        })
    }
}

enum LoadBehavior {
    ReadyAfter(Duration),
    Never,
    Fail,
    Empty,
}

/// Stand-in for the external 3D asset loader.
pub struct FakeLoader {
    behavior: LoadBehavior,
    requested: Mutex<Vec<String>>,
}

impl FakeLoader {
    fn build(behavior: LoadBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn ready_after(delay: Duration) -> Arc<Self> {
        Self::build(LoadBehavior::ReadyAfter(delay))
    }

    pub fn never() -> Arc<Self> {
        Self::build(LoadBehavior::Never)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(LoadBehavior::Fail)
    }

    /// Resolves with a scene that has no nodes.
    pub fn empty() -> Arc<Self> {
        Self::build(LoadBehavior::Empty)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        lock(&self.requested).clone()
    }
}

#[async_trait]
impl ModelLoader for FakeLoader {
    async fn load(&self, url: &str) -> Result<LoadedScene, LoadError> {
        lock(&self.requested).push(url.to_string());
        match self.behavior {
            LoadBehavior::ReadyAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(LoadedScene {
                    node_count: 3,
                    animations: vec!["idle".into()],
                })
            }
            LoadBehavior::Never => futures::future::pending().await,
            LoadBehavior::Fail => Err(LoadError::Fetch(format!("404 for {url}"))),
            LoadBehavior::Empty => Ok(LoadedScene::default()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn routes(&self) -> Vec<Route> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        lock(&self.routes).push(route);
    }
}

#[derive(Default)]
pub struct RecordingViewport {
    locked: AtomicBool,
    locks: AtomicUsize,
    unlocks: AtomicUsize,
}

impl RecordingViewport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn lock_calls(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

impl Viewport for RecordingViewport {
    fn lock_scroll(&self) {
        self.locked.store(true, Ordering::SeqCst);
        self.locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock_scroll(&self) {
        self.locked.store(false, Ordering::SeqCst);
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    snapshots: Mutex<Vec<SessionSnapshot>>,
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        lock(&self.snapshots).clone()
    }

    /// Published stages with consecutive repeats collapsed.
    pub fn stages(&self) -> Vec<ArStage> {
        let mut stages: Vec<ArStage> = Vec::new();
        for snapshot in lock(&self.snapshots).iter() {
            if stages.last() != Some(&snapshot.stage) {
                stages.push(snapshot.stage);
            }
        }
        stages
    }
}

impl EventSink for RecordingEvents {
    fn publish(&self, snapshot: &SessionSnapshot) {
        lock(&self.snapshots).push(snapshot.clone());
    }
}

/// Decoder that replays a script, one entry per frame, then reports no code.
///
/// `Err` entries model unreadable frames.
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Result<Option<String>, String>>>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new(script: Vec<Result<Option<String>, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Reads `payload` on every frame.
    pub fn always(payload: &str) -> Arc<Self> {
        Self::new(vec![Ok(Some(payload.to_string())); 64])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QrDecoder for ScriptedDecoder {
    fn decode(&self, _frame: &LumaFrame) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.script).pop_front() {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Ok(None),
        }
    }
}

/// Serves a blank frame on every grab. The first `failures` grabs error.
pub struct FakeFrameSource {
    failures: AtomicUsize,
    grabs: AtomicUsize,
}

impl FakeFrameSource {
    pub fn new() -> Arc<Self> {
        Self::with_failures(0)
    }

    pub fn with_failures(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            grabs: AtomicUsize::new(0),
        })
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }
}

impl FrameSource for FakeFrameSource {
    fn grab(&self) -> Result<Option<LumaFrame>> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("frame buffer unavailable"));
        }
        Ok(LumaFrame::new(32, 32, vec![255; 32 * 32]))
    }
}
