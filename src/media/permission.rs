use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    #[default]
    Unknown,
    Prompt,
    Granted,
    Denied,
}

impl PermissionState {
    /// What the "start camera" button should do in this state.
    pub fn start_action(self) -> StartAction {
        match self {
            PermissionState::Granted => StartAction::StartCamera,
            PermissionState::Denied => StartAction::ShowSettingsHelp,
            PermissionState::Unknown | PermissionState::Prompt => StartAction::RequestPermission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartAction {
    RequestPermission,
    StartCamera,
    ShowSettingsHelp,
}

/// Observable camera permission. Only the media acquisition layer writes it.
#[derive(Debug, Clone)]
pub struct CameraPermission {
    tx: Arc<watch::Sender<PermissionState>>,
}

impl CameraPermission {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PermissionState::Unknown);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> PermissionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.tx.subscribe()
    }

    pub(crate) fn set(&self, state: PermissionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                log::info!("Camera permission {:?} -> {:?}", current, state);
                *current = state;
                true
            }
        });
    }
}

impl Default for CameraPermission {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_action_follows_permission() {
        assert_eq!(
            PermissionState::Unknown.start_action(),
            StartAction::RequestPermission
        );
        assert_eq!(
            PermissionState::Granted.start_action(),
            StartAction::StartCamera
        );
        assert_eq!(
            PermissionState::Denied.start_action(),
            StartAction::ShowSettingsHelp
        );
    }

    #[test]
    fn subscribers_see_updates() {
        let permission = CameraPermission::new();
        let mut rx = permission.subscribe();
        permission.set(PermissionState::Denied);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), PermissionState::Denied);
        permission.set(PermissionState::Denied);
        assert!(!rx.has_changed().unwrap());
    }
}
