use glam::Vec3;
use std::f32::consts::TAU;
use std::time::Duration;

use crate::settings::ArTuning;

/// Distance in front of the viewer where the simulated plane sits.
const SURFACE_DEPTH: f32 = -2.0;

/// Source of the placement plane, as a function of session time.
///
/// A depth or plane-detection backend can replace the simulation without the
/// session noticing.
pub trait SurfaceModel: Send + Sync {
    fn position_at(&self, elapsed: Duration) -> Vec3;
}

/// Procedural plane that bobs gently around a fixed height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedSurface {
    pub baseline: f32,
    pub amplitude: f32,
    pub period: Duration,
}

impl SimulatedSurface {
    pub fn from_tuning(tuning: &ArTuning) -> Self {
        Self {
            baseline: tuning.surface_baseline,
            amplitude: tuning.surface_amplitude,
            period: Duration::from_millis(tuning.surface_period_ms.max(1)),
        }
    }
}

impl Default for SimulatedSurface {
    fn default() -> Self {
        Self::from_tuning(&ArTuning::default())
    }
}

impl SurfaceModel for SimulatedSurface {
    fn position_at(&self, elapsed: Duration) -> Vec3 {
        let period = self.period.as_secs_f32().max(f32::EPSILON);
        let phase = (elapsed.as_secs_f32() / period) * TAU;
        Vec3::new(0.0, self.baseline + self.amplitude * phase.sin(), SURFACE_DEPTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceUpdate {
    pub position: Vec3,
    /// True only for the first position of a detection run.
    pub first: bool,
}

/// Tracks the "surface detected" latch for one detection run.
pub struct SurfaceTracker {
    model: std::sync::Arc<dyn SurfaceModel>,
    latest: Option<Vec3>,
}

impl SurfaceTracker {
    pub fn new(model: std::sync::Arc<dyn SurfaceModel>) -> Self {
        Self {
            model,
            latest: None,
        }
    }

    pub fn update(&mut self, elapsed: Duration) -> SurfaceUpdate {
        let position = self.model.position_at(elapsed);
        let first = self.latest.is_none();
        self.latest = Some(position);
        SurfaceUpdate { position, first }
    }

    pub fn detected(&self) -> bool {
        self.latest.is_some()
    }

    pub fn latest(&self) -> Option<Vec3> {
        self.latest
    }
}
