use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ArError;

use super::permission::{CameraPermission, PermissionState};
use super::readiness::VideoReadiness;
use super::stream::{release_stream, CameraFault, MediaStreamHandle, MediaTrack, StreamConstraints};

/// Platform camera access.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Whether any media capture API exists on this platform.
    fn supports_capture(&self) -> bool;

    /// Current camera permission, or `None` when the platform cannot be queried.
    async fn query_permission(&self) -> Option<PermissionState>;

    /// Ask for a camera stream. May show a permission prompt.
    async fn open(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Vec<Arc<dyn MediaTrack>>, CameraFault>;

    /// Readiness events for the surface showing `stream`. Dropping a future
    /// detaches its listener.
    fn readiness_signals(&self, stream: &MediaStreamHandle)
        -> Vec<BoxFuture<'static, VideoReadiness>>;
}

struct Holder {
    owner: Uuid,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

/// Process-wide record of which flow currently holds the camera.
///
/// A flow that claims the camera stops whatever another flow still holds.
#[derive(Default)]
pub struct CameraArbiter {
    holder: Mutex<Option<Holder>>,
}

impl CameraArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Holder>> {
        self.holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, owner: Uuid, tracks: &[Arc<dyn MediaTrack>]) {
        let mut guard = self.lock();
        if let Some(previous) = guard.take() {
            if previous.owner != owner {
                log::warn!(
                    "Camera still held by flow {}, stopping it for flow {}",
                    previous.owner,
                    owner
                );
            }
            for track in previous.tracks {
                track.stop();
            }
        }
        *guard = Some(Holder {
            owner,
            tracks: tracks.to_vec(),
        });
    }

    fn vacate(&self, owner: Uuid) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|holder| holder.owner == owner) {
            *guard = None;
        }
    }

    pub fn holder(&self) -> Option<Uuid> {
        self.lock().as_ref().map(|holder| holder.owner)
    }
}

/// Cheap handle for reading camera permission without touching the stream
/// owner, so the UI can ask while a request is still pending.
#[derive(Clone)]
pub struct PermissionQuery {
    backend: Arc<dyn CameraBackend>,
    permission: CameraPermission,
}

impl PermissionQuery {
    /// Never fails: platforms without a permission API report `Prompt`.
    pub async fn query(&self) -> PermissionState {
        match self.backend.query_permission().await {
            Some(state) => {
                self.permission.set(state);
                state
            }
            None => {
                log::debug!("Permission query unavailable, assuming prompt");
                if self.permission.current() == PermissionState::Unknown {
                    self.permission.set(PermissionState::Prompt);
                }
                PermissionState::Prompt
            }
        }
    }
}

/// An outstanding camera request, detached from the acquirer that started it.
pub struct PendingStream {
    backend: Arc<dyn CameraBackend>,
    permission: CameraPermission,
    constraints: StreamConstraints,
}

impl PendingStream {
    /// Wait for the platform, bounded by `timeout`. A stream that is opened
    /// but never committed stops its tracks when dropped.
    pub async fn open(self, timeout: Duration) -> Result<MediaStreamHandle, ArError> {
        match tokio::time::timeout(timeout, self.backend.open(self.constraints)).await {
            Ok(Ok(tracks)) => {
                self.permission.set(PermissionState::Granted);
                Ok(MediaStreamHandle::new(tracks))
            }
            Ok(Err(fault)) => {
                let err = fault.into_ar_error();
                if err == ArError::PermissionDenied {
                    self.permission.set(PermissionState::Denied);
                }
                log::warn!("Camera request failed: {err}");
                Err(err)
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                log::warn!("Camera request timed out after {timeout_ms}ms");
                Err(ArError::AcquisitionTimeout { timeout_ms })
            }
        }
    }
}

/// Camera acquisition for a single AR flow. Holds at most one stream.
pub struct MediaAcquirer {
    owner: Uuid,
    backend: Arc<dyn CameraBackend>,
    arbiter: Arc<CameraArbiter>,
    permission: CameraPermission,
    current: Option<MediaStreamHandle>,
}

impl MediaAcquirer {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        arbiter: Arc<CameraArbiter>,
        permission: CameraPermission,
    ) -> Self {
        Self {
            owner: Uuid::new_v4(),
            backend,
            arbiter,
            permission,
            current: None,
        }
    }

    pub fn permission(&self) -> &CameraPermission {
        &self.permission
    }

    pub fn permission_query(&self) -> PermissionQuery {
        PermissionQuery {
            backend: self.backend.clone(),
            permission: self.permission.clone(),
        }
    }

    pub async fn query_permission(&self) -> PermissionState {
        self.permission_query().query().await
    }

    /// Release the current stream and start a new request. The returned
    /// request can be awaited without holding on to the acquirer.
    pub fn begin_request(
        &mut self,
        constraints: StreamConstraints,
    ) -> Result<PendingStream, ArError> {
        self.release();

        if !self.backend.supports_capture() {
            return Err(CameraFault::Unsupported.into_ar_error());
        }
        Ok(PendingStream {
            backend: self.backend.clone(),
            permission: self.permission.clone(),
            constraints,
        })
    }

    /// Take ownership of a freshly opened stream.
    pub fn commit(&mut self, handle: MediaStreamHandle) -> &MediaStreamHandle {
        self.release();
        self.arbiter.claim(self.owner, handle.tracks());
        log::info!(
            "Camera stream {} acquired with {} tracks",
            handle.id(),
            handle.tracks().len()
        );
        self.current.insert(handle)
    }

    /// Open a fresh stream, releasing any stream this flow already holds.
    pub async fn request_stream(
        &mut self,
        constraints: StreamConstraints,
        timeout: Duration,
    ) -> Result<&MediaStreamHandle, ArError> {
        let handle = self.begin_request(constraints)?.open(timeout).await?;
        Ok(self.commit(handle))
    }

    pub fn active_stream(&self) -> Option<&MediaStreamHandle> {
        self.current.as_ref()
    }

    pub fn active_tracks(&self) -> usize {
        self.current
            .as_ref()
            .map(MediaStreamHandle::active_tracks)
            .unwrap_or(0)
    }

    pub fn readiness_signals(&self) -> Vec<BoxFuture<'static, VideoReadiness>> {
        match &self.current {
            Some(stream) => self.backend.readiness_signals(stream),
            None => Vec::new(),
        }
    }

    /// Idempotent.
    pub fn release(&mut self) {
        release_stream(&mut self.current);
        self.arbiter.vacate(self.owner);
    }
}

impl Drop for MediaAcquirer {
    fn drop(&mut self) {
        self.release();
    }
}
