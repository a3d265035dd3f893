//! Adapters between the AR core and the Tauri webview.

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::warn;
use std::sync::Arc;
use tauri::{AppHandle, Emitter};

use crate::{
    media::{
        CameraBackend, CameraFault, MediaStreamHandle, MediaTrack, PermissionState,
        StreamConstraints, VideoReadiness,
    },
    navigation::{Navigator, Route},
    pose::{SensorFeed, SensorSource, SensorSubscription},
    session::{EventSink, SessionSnapshot, Viewport, SESSION_CHANGED_EVENT},
};

pub const NAVIGATE_EVENT: &str = "navigate";
pub const SCROLL_LOCK_EVENT: &str = "viewport-scroll-lock";

pub struct TauriEvents {
    app: AppHandle,
}

impl TauriEvents {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl EventSink for TauriEvents {
    fn publish(&self, snapshot: &SessionSnapshot) {
        if let Err(err) = self.app.emit(SESSION_CHANGED_EVENT, snapshot) {
            warn!("Failed to emit {SESSION_CHANGED_EVENT}: {err}");
        }
    }
}

pub struct TauriNavigator {
    app: AppHandle,
}

impl TauriNavigator {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Navigator for TauriNavigator {
    fn navigate(&self, route: Route) {
        if let Err(err) = self.app.emit(NAVIGATE_EVENT, route.path()) {
            warn!("Failed to emit {NAVIGATE_EVENT}: {err}");
        }
    }
}

pub struct TauriViewport {
    app: AppHandle,
}

impl TauriViewport {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn set_locked(&self, locked: bool) {
        if let Err(err) = self.app.emit(SCROLL_LOCK_EVENT, locked) {
            warn!("Failed to emit {SCROLL_LOCK_EVENT}: {err}");
        }
    }
}

impl Viewport for TauriViewport {
    fn lock_scroll(&self) {
        self.set_locked(true);
    }

    fn unlock_scroll(&self) {
        self.set_locked(false);
    }
}

/// The native side has no capture API; sessions report an unsupported
/// platform and the webview shows the matching message.
pub struct NoCaptureCamera;

#[async_trait]
impl CameraBackend for NoCaptureCamera {
    fn supports_capture(&self) -> bool {
        false
    }

    async fn query_permission(&self) -> Option<PermissionState> {
        None
    }

    async fn open(
        &self,
        _constraints: StreamConstraints,
    ) -> Result<Vec<Arc<dyn MediaTrack>>, CameraFault> {
        Err(CameraFault::Unsupported)
    }

    fn readiness_signals(
        &self,
        _stream: &MediaStreamHandle,
    ) -> Vec<BoxFuture<'static, VideoReadiness>> {
        Vec::new()
    }
}

/// Desktops have no orientation sensors; the camera keeps its fixed pose.
pub struct NoMotionSensors;

#[async_trait]
impl SensorSource for NoMotionSensors {
    fn supports_orientation(&self) -> bool {
        false
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn request_permission(&self) -> bool {
        false
    }

    fn attach(&self, _feed: SensorFeed) -> SensorSubscription {
        SensorSubscription::new(|| {})
    }
}
