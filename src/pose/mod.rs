pub mod camera;
pub mod estimator;
pub mod sensors;
pub mod surface;

pub use camera::CameraPose;
pub use estimator::{EstimatorConfig, PoseEstimator, PoseFrame, SurfaceListener};
pub use sensors::{
    MotionSample, OrientationSample, SensorFeed, SensorGate, SensorSource, SensorStatus,
    SensorSubscription,
};
pub use surface::{SimulatedSurface, SurfaceModel, SurfaceUpdate};
