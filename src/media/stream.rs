use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ArError;

/// One hardware track inside a camera stream.
///
/// `stop` must be idempotent: the arbiter and the owning flow may both stop
/// the same track.
pub trait MediaTrack: Send + Sync {
    fn label(&self) -> &str;
    fn stop(&self);
    fn is_live(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Raw failure reported by the platform media API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraFault {
    /// The platform exposes no media capture API at all.
    Unsupported,
    /// A named platform error such as `NotAllowedError`.
    Named(String),
}

impl CameraFault {
    pub fn named(name: impl Into<String>) -> Self {
        CameraFault::Named(name.into())
    }

    pub fn into_ar_error(self) -> ArError {
        match self {
            CameraFault::Unsupported => ArError::UnsupportedPlatform {
                capability: "camera capture".to_string(),
            },
            CameraFault::Named(name) => match name.as_str() {
                "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                    ArError::PermissionDenied
                }
                "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                    ArError::HardwareUnavailable
                }
                "NotReadableError" | "TrackStartError" | "AbortError" => ArError::DeviceBusy,
                "TypeError" | "NotSupportedError" => ArError::UnsupportedPlatform {
                    capability: "camera capture".to_string(),
                },
                other => {
                    log::warn!("Unrecognised camera error '{other}', reporting as busy device");
                    ArError::DeviceBusy
                }
            },
        }
    }
}

/// A live camera feed owned by exactly one AR flow.
pub struct MediaStreamHandle {
    id: Uuid,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStreamHandle {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.iter().filter(|track| track.is_live()).count()
    }

    /// Stops every track. Returns how many were live before the call.
    pub fn release(&mut self) -> usize {
        let mut stopped = 0;
        for track in self.tracks.drain(..) {
            if track.is_live() {
                stopped += 1;
            }
            track.stop();
        }
        if stopped > 0 {
            log::info!("Released camera stream {} ({} tracks)", self.id, stopped);
        }
        stopped
    }
}

impl std::fmt::Debug for MediaStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStreamHandle")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("active", &self.active_tracks())
            .finish()
    }
}

impl Drop for MediaStreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Release whatever the slot holds. Safe on an empty slot or a handle that
/// was already released.
pub fn release_stream(slot: &mut Option<MediaStreamHandle>) {
    if let Some(mut handle) = slot.take() {
        handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTrack;

    #[test]
    fn release_is_idempotent() {
        let track = FakeTrack::new("rear");
        let mut slot = Some(MediaStreamHandle::new(vec![track.clone()]));
        release_stream(&mut slot);
        assert!(!track.is_live());
        release_stream(&mut slot);
        assert!(slot.is_none());
        assert_eq!(track.stop_calls(), 1);
    }

    #[test]
    fn release_reports_live_tracks_only() {
        let a = FakeTrack::new("a");
        let b = FakeTrack::new("b");
        b.stop();
        let mut handle = MediaStreamHandle::new(vec![a.clone(), b]);
        assert_eq!(handle.active_tracks(), 1);
        assert_eq!(handle.release(), 1);
        assert_eq!(handle.active_tracks(), 0);
        assert_eq!(handle.release(), 0);
    }

    #[test]
    fn platform_error_names_map_to_causes() {
        assert_eq!(
            CameraFault::named("NotAllowedError").into_ar_error(),
            ArError::PermissionDenied
        );
        assert_eq!(
            CameraFault::named("NotFoundError").into_ar_error(),
            ArError::HardwareUnavailable
        );
        assert_eq!(
            CameraFault::named("NotReadableError").into_ar_error(),
            ArError::DeviceBusy
        );
        assert!(matches!(
            CameraFault::Unsupported.into_ar_error(),
            ArError::UnsupportedPlatform { .. }
        ));
    }
}
