pub mod acquire;
pub mod permission;
pub mod readiness;
pub mod stream;

pub use acquire::{CameraArbiter, CameraBackend, MediaAcquirer, PendingStream, PermissionQuery};
pub use permission::{CameraPermission, PermissionState};
pub use readiness::{wait_for_video_ready, ReadinessOutcome, VideoReadiness};
pub use stream::{
    release_stream, CameraFault, FacingMode, MediaStreamHandle, MediaTrack, StreamConstraints,
};
