use glam::Vec3;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::camera::CameraPose;
use super::sensors::{SensorGate, SensorHub, SensorReadings, SensorSource, SensorStatus};
use super::surface::{SurfaceModel, SurfaceTracker, SurfaceUpdate};

// Per-frame output is at debug level; HERITAGE_LENS_DEBUG=1 shows it.
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Called on every frame with the current surface position.
pub type SurfaceListener = Arc<dyn Fn(SurfaceUpdate) + Send + Sync>;

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    pub surface: Option<Vec3>,
    pub camera: CameraPose,
    pub sensors_enabled: bool,
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self {
            surface: None,
            camera: CameraPose::fixed(Vec3::ZERO),
            sensors_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    pub frame_interval: Duration,
    pub motion_damping: f32,
}

/// Simulated surface detection plus sensor-driven virtual camera.
pub struct PoseEstimator {
    surface_model: Arc<dyn SurfaceModel>,
    config: EstimatorConfig,
    sensors: SensorHub,
    frames: Arc<watch::Sender<PoseFrame>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl PoseEstimator {
    pub fn new(
        surface_model: Arc<dyn SurfaceModel>,
        sensors: Arc<dyn SensorSource>,
        config: EstimatorConfig,
    ) -> Self {
        let (frames, _rx) = watch::channel(PoseFrame::default());
        Self {
            surface_model,
            config,
            sensors: SensorHub::new(sensors),
            frames: Arc::new(frames),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PoseFrame> {
        self.frames.subscribe()
    }

    pub fn latest(&self) -> PoseFrame {
        *self.frames.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn sensors_attached(&self) -> bool {
        self.sensors.is_attached()
    }

    pub fn sensor_gate(&self) -> SensorGate {
        self.sensors.gate()
    }

    pub fn attach_sensors(&mut self) -> SensorStatus {
        self.sensors.attach()
    }

    pub fn disable_sensors(&mut self) {
        self.sensors.disable();
    }

    /// Begin a detection run. Any previous run is stopped first, and the
    /// detected latch starts over.
    pub fn start_detection(&mut self, listener: SurfaceListener) {
        self.stop_detection();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(frame_loop(
            SurfaceTracker::new(self.surface_model.clone()),
            self.sensors.readings(),
            self.frames.clone(),
            listener,
            self.config,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    pub fn stop_detection(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Stop the frame loop and drop every sensor listener.
    pub fn shutdown(&mut self) {
        self.stop_detection();
        self.disable_sensors();
        self.frames.send_replace(PoseFrame::default());
    }
}

impl Drop for PoseEstimator {
    fn drop(&mut self) {
        self.stop_detection();
    }
}

async fn frame_loop(
    mut tracker: SurfaceTracker,
    sensors: SensorReadings,
    frames: Arc<watch::Sender<PoseFrame>>,
    listener: SurfaceListener,
    config: EstimatorConfig,
    cancel_token: CancellationToken,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let update = tracker.update(started.elapsed());
                listener(update);

                let reading = sensors.latest();
                let camera = match reading {
                    Some((orientation, motion)) => CameraPose::from_sensors(
                        orientation,
                        motion,
                        update.position,
                        config.motion_damping,
                    ),
                    None => CameraPose::fixed(update.position),
                };

                frames.send_replace(PoseFrame {
                    surface: Some(update.position),
                    camera,
                    sensors_enabled: reading.is_some(),
                });
                log_debug!("frame surface={:?} camera={:?}", update.position, camera.position);
            }
            _ = cancel_token.cancelled() => {
                break;
            }
        }
    }
}
