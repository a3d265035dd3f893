use chrono::{DateTime, Utc};
use glam::Vec3;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ArError, ErrorReport};
use crate::interaction::{CameraRig, InteractionController, InteractionMode, ModelTransform};
use crate::media::PermissionState;
use crate::placements::{PlacedModel, PlacementSet};
use crate::pose::CameraPose;

use super::readiness::ReadyReason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArStage {
    #[default]
    Idle,
    Initializing,
    CameraStarting,
    CameraActive,
    SurfaceDetecting,
    ModelLoading,
    Interactive,
    Error,
    Closed,
}

impl ArStage {
    /// Stages that advance strictly one after another.
    fn pipeline_index(self) -> Option<u8> {
        match self {
            ArStage::Initializing => Some(0),
            ArStage::CameraStarting => Some(1),
            ArStage::CameraActive => Some(2),
            ArStage::SurfaceDetecting => Some(3),
            ArStage::ModelLoading => Some(4),
            ArStage::Interactive => Some(5),
            ArStage::Idle | ArStage::Error | ArStage::Closed => None,
        }
    }

    /// Whether `self -> next` is a legal pipeline step (no skipping).
    pub fn can_advance_to(self, next: ArStage) -> bool {
        match (self.pipeline_index(), next.pipeline_index()) {
            (Some(current), Some(target)) => target == current + 1,
            (None, Some(0)) => matches!(self, ArStage::Idle | ArStage::Error | ArStage::Closed),
            _ => false,
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, ArStage::Idle | ArStage::Closed)
    }
}

impl std::fmt::Display for ArStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArStage::Idle => "idle",
            ArStage::Initializing => "initializing",
            ArStage::CameraStarting => "camera-starting",
            ArStage::CameraActive => "camera-active",
            ArStage::SurfaceDetecting => "surface-detecting",
            ArStage::ModelLoading => "model-loading",
            ArStage::Interactive => "interactive",
            ArStage::Error => "error",
            ArStage::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// What a session was opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub site_id: Option<String>,
    pub model_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArSessionState {
    pub session_id: Option<Uuid>,
    pub request: Option<OpenRequest>,
    pub stage: ArStage,
    pub surface_detected: bool,
    pub surface_position: Option<Vec3>,
    pub model_ready: bool,
    pub ready_reason: Option<ReadyReason>,
    pub sensors_enabled: bool,
    pub interaction: InteractionController,
    pub placements: PlacementSet,
    pub error: Option<ArError>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl ArSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh session: every flag back to its default, stage `Initializing`.
    pub fn begin(&mut self, request: OpenRequest) {
        *self = Self {
            session_id: Some(Uuid::new_v4()),
            request: Some(request),
            stage: ArStage::Initializing,
            opened_at: Some(Utc::now()),
            ..Self::default()
        };
    }

    /// Re-enter `Initializing` from `Error`, keeping the request.
    pub fn restart(&mut self) -> bool {
        if self.stage != ArStage::Error {
            return false;
        }
        let request = self.request.take();
        let sensors_enabled = self.sensors_enabled;
        *self = Self {
            session_id: Some(Uuid::new_v4()),
            request,
            stage: ArStage::Initializing,
            opened_at: Some(Utc::now()),
            sensors_enabled,
            ..Self::default()
        };
        true
    }

    pub fn advance(&mut self, next: ArStage) -> bool {
        if !self.stage.can_advance_to(next) {
            log::warn!("Ignoring AR stage change {} -> {}", self.stage, next);
            return false;
        }
        log::info!("AR session {} -> {}", self.stage, next);
        self.stage = next;
        true
    }

    pub fn fail(&mut self, error: ArError) -> bool {
        if !self.stage.is_open() {
            return false;
        }
        log::warn!("AR session {} -> error: {}", self.stage, error);
        self.stage = ArStage::Error;
        self.error = Some(error);
        true
    }

    pub fn record_surface(&mut self, position: Vec3) {
        self.surface_detected = true;
        self.surface_position = Some(position);
    }

    /// First writer wins; later calls are no-ops and return false.
    pub fn mark_model_ready(&mut self, reason: ReadyReason) -> bool {
        if self.model_ready {
            return false;
        }
        self.model_ready = true;
        self.ready_reason = Some(reason);
        true
    }

    pub fn can_manipulate(&self) -> bool {
        self.stage == ArStage::Interactive && self.surface_detected
    }

    pub fn close(&mut self) {
        log::info!("AR session {} -> closed", self.stage);
        *self = Self {
            stage: ArStage::Closed,
            ..Self::default()
        };
    }
}

/// Serialisable view of the session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub site_id: Option<String>,
    pub stage: ArStage,
    pub surface_detected: bool,
    pub surface_position: Option<Vec3>,
    pub model_position: Option<Vec3>,
    pub model_ready: bool,
    pub ready_reason: Option<ReadyReason>,
    pub sensors_enabled: bool,
    pub interaction_mode: InteractionMode,
    pub model_transform: ModelTransform,
    /// Zoom and pan from camera-level gestures.
    pub camera_rig: CameraRig,
    pub placements: Vec<PlacedModel>,
    pub error: Option<ErrorReport>,
    pub camera_permission: PermissionState,
    pub camera_pose: Option<CameraPose>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn capture(
        state: &ArSessionState,
        camera_permission: PermissionState,
        camera_pose: Option<CameraPose>,
    ) -> Self {
        let transform = state.interaction.transform();
        Self {
            session_id: state.session_id,
            site_id: state.request.as_ref().and_then(|r| r.site_id.clone()),
            stage: state.stage,
            surface_detected: state.surface_detected,
            surface_position: state.surface_position,
            model_position: state
                .surface_position
                .map(|surface| transform.world_position(surface)),
            model_ready: state.model_ready,
            ready_reason: state.ready_reason,
            sensors_enabled: state.sensors_enabled,
            interaction_mode: state.interaction.mode(),
            model_transform: transform,
            camera_rig: state.interaction.rig(),
            placements: state.placements.iter().copied().collect(),
            error: state.error.as_ref().map(ArError::report),
            camera_permission,
            camera_pose,
            opened_at: state.opened_at,
        }
    }
}
