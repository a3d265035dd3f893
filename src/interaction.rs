//! Manipulation of a placed model.
//!
//! The mode decides what a drag means; pinch and two-finger pan always act on
//! the camera rig, whatever the mode.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

const MIN_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 10.0;
/// World units moved per full-screen drag.
const MOVE_GAIN: f32 = 2.0;
/// Radians turned per full-screen drag.
const ROTATE_GAIN: f32 = std::f32::consts::PI;
const MIN_ZOOM: f32 = 0.5;
const MAX_ZOOM: f32 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    #[default]
    Move,
    Rotate,
    Scale,
}

/// Pointer input on the rendered scene. Deltas are fractions of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Gesture {
    Drag { dx: f32, dy: f32 },
    Pinch { factor: f32 },
    Pan { dx: f32, dy: f32 },
}

/// Model placement relative to the detected surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTransform {
    pub offset: Vec3,
    pub yaw: f32,
    pub scale: f32,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            offset: Vec3::ZERO,
            yaw: 0.0,
            scale: 1.0,
        }
    }
}

impl ModelTransform {
    pub fn world_position(&self, surface: Vec3) -> Vec3 {
        surface + self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRig {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

/// State after a gesture: the model transform and the camera rig.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureOutcome {
    pub transform: ModelTransform,
    pub rig: CameraRig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionController {
    mode: InteractionMode,
    transform: ModelTransform,
    rig: CameraRig,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    pub fn transform(&self) -> ModelTransform {
        self.transform
    }

    pub fn rig(&self) -> CameraRig {
        self.rig
    }

    pub fn apply(&mut self, gesture: Gesture) -> GestureOutcome {
        match gesture {
            Gesture::Drag { dx, dy } => match self.mode {
                // Screen-down moves the model toward the viewer on the surface plane.
                InteractionMode::Move => {
                    self.transform.offset += Vec3::new(dx * MOVE_GAIN, 0.0, dy * MOVE_GAIN);
                }
                InteractionMode::Rotate => {
                    self.transform.yaw = (self.transform.yaw + dx * ROTATE_GAIN)
                        .rem_euclid(std::f32::consts::TAU);
                }
                InteractionMode::Scale => {
                    let factor = (1.0 - dy).max(MIN_SCALE);
                    self.transform.scale =
                        (self.transform.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
                }
            },
            Gesture::Pinch { factor } if factor.is_finite() && factor > 0.0 => {
                self.rig.zoom = (self.rig.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            }
            Gesture::Pinch { .. } => {}
            Gesture::Pan { dx, dy } => {
                self.rig.pan += Vec2::new(dx, dy);
            }
        }
        GestureOutcome {
            transform: self.transform,
            rig: self.rig,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
