use serde::Serialize;
use thiserror::Error;

/// Failures the AR core converts into UI state.
///
/// Nothing here is fatal to the application: every variant leaves the user
/// able to retry or back out. A slow or broken 3D asset is deliberately not
/// represented; it resolves through the forced-ready policy instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArError {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("no camera device was found")]
    HardwareUnavailable,
    #[error("camera is in use by another application")]
    DeviceBusy,
    #[error("camera request timed out after {timeout_ms}ms")]
    AcquisitionTimeout { timeout_ms: u64 },
    #[error("platform does not support {capability}")]
    UnsupportedPlatform { capability: String },
    #[error("code '{payload}' does not match any known site")]
    DecodeMismatch { payload: String },
    #[error("no QR code found in image")]
    NoCodeFound,
    #[error("image could not be read: {reason}")]
    InvalidImage { reason: String },
}

impl ArError {
    pub fn code(&self) -> &'static str {
        match self {
            ArError::PermissionDenied => "permission_denied",
            ArError::HardwareUnavailable => "hardware_unavailable",
            ArError::DeviceBusy => "device_busy",
            ArError::AcquisitionTimeout { .. } => "acquisition_timeout",
            ArError::UnsupportedPlatform { .. } => "unsupported_platform",
            ArError::DecodeMismatch { .. } => "decode_mismatch",
            ArError::NoCodeFound => "no_code_found",
            ArError::InvalidImage { .. } => "invalid_image",
        }
    }

    /// Text shown to the visitor.
    pub fn user_message(&self) -> String {
        match self {
            ArError::PermissionDenied => {
                "Camera access was blocked. Allow camera access for this app in your \
                 browser or system settings, then tap Retry."
                    .to_string()
            }
            ArError::HardwareUnavailable => {
                "No camera was found on this device. AR needs a camera.".to_string()
            }
            ArError::DeviceBusy => {
                "The camera is being used by another app. Close other apps using the \
                 camera and tap Retry."
                    .to_string()
            }
            ArError::AcquisitionTimeout { .. } => {
                "No response to the camera request. Check for a permission prompt and \
                 tap Retry."
                    .to_string()
            }
            ArError::UnsupportedPlatform { .. } => {
                "AR is not supported here. Open the 3D model viewer instead.".to_string()
            }
            ArError::DecodeMismatch { .. } => {
                "This QR code does not belong to a heritage site. Try another code.".to_string()
            }
            ArError::NoCodeFound => {
                "No QR code was found in the image. Try a sharper photo.".to_string()
            }
            ArError::InvalidImage { .. } => {
                "The selected file could not be opened as an image.".to_string()
            }
        }
    }

    /// Whether tapping Retry can help without the user changing hardware.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ArError::HardwareUnavailable | ArError::UnsupportedPlatform { .. }
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.user_message(),
            retryable: self.is_retryable(),
        }
    }
}

/// Serialisable form of an [`ArError`] for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_distinct_code() {
        let all = [
            ArError::PermissionDenied,
            ArError::HardwareUnavailable,
            ArError::DeviceBusy,
            ArError::AcquisitionTimeout { timeout_ms: 10_000 },
            ArError::UnsupportedPlatform {
                capability: "mediaDevices".into(),
            },
            ArError::DecodeMismatch {
                payload: "x".into(),
            },
            ArError::NoCodeFound,
            ArError::InvalidImage {
                reason: "truncated".into(),
            },
        ];
        let mut codes: Vec<_> = all.iter().map(ArError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn hardware_errors_are_not_retryable() {
        assert!(!ArError::HardwareUnavailable.is_retryable());
        assert!(ArError::PermissionDenied.is_retryable());
        assert!(ArError::AcquisitionTimeout { timeout_ms: 1 }.is_retryable());
    }
}
