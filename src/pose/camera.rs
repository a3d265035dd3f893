use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Serialize;

use super::sensors::{MotionSample, OrientationSample};

/// Where the virtual eye rests relative to the surface when nothing moves.
const REST_OFFSET: Vec3 = Vec3::new(0.0, 1.0, 3.0);
/// Minimum height of the eye above the surface.
const MIN_CLEARANCE: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub target: Vec3,
}

impl CameraPose {
    /// Pose used when sensors are off: resting offset, aimed at the surface.
    pub fn fixed(surface: Vec3) -> Self {
        look_from(surface + REST_OFFSET, surface)
    }

    /// Pose driven by device orientation and damped device motion.
    pub fn from_sensors(
        orientation: OrientationSample,
        motion: MotionSample,
        surface: Vec3,
        damping: f32,
    ) -> Self {
        let device = device_rotation(orientation);
        let orbit = device * REST_OFFSET;
        let shake = Vec3::new(motion.x, motion.y, motion.z) * damping;

        let mut position = surface + orbit + shake;
        position.y = position.y.max(surface.y + MIN_CLEARANCE);

        look_from(position, surface)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// Platform orientation angles (degrees, Z-X'-Y'' order) as a rotation.
pub fn device_rotation(orientation: OrientationSample) -> Quat {
    Quat::from_euler(
        EulerRot::ZXY,
        orientation.alpha.to_radians(),
        orientation.beta.to_radians(),
        orientation.gamma.to_radians(),
    )
}

fn look_from(eye: Vec3, target: Vec3) -> CameraPose {
    let direction = (target - eye).normalize_or_zero();
    if direction == Vec3::ZERO {
        return CameraPose {
            position: eye,
            rotation: Quat::IDENTITY,
            target,
        };
    }

    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(eye, target, up);
    CameraPose {
        position: eye,
        rotation: Quat::from_mat4(&view).inverse().normalize(),
        target,
    }
}
