use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Device orientation in degrees, as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

/// Device acceleration in m/s².
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorStatus {
    Enabled,
    /// The user refused the sensor prompt.
    Refused,
    /// The platform has no orientation events.
    Unsupported,
    Disabled,
}

/// Write side handed to a sensor source. Each push overwrites the previous
/// sample; nothing is queued.
#[derive(Clone)]
pub struct SensorFeed {
    orientation: Arc<watch::Sender<Option<OrientationSample>>>,
    motion: Arc<watch::Sender<Option<MotionSample>>>,
}

impl SensorFeed {
    pub fn push_orientation(&self, sample: OrientationSample) {
        self.orientation.send_replace(Some(sample));
    }

    pub fn push_motion(&self, sample: MotionSample) {
        self.motion.send_replace(Some(sample));
    }
}

/// Live registration with a sensor source. Dropping it detaches the listeners.
pub struct SensorSubscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl SensorSubscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

/// Platform orientation/motion events.
#[async_trait]
pub trait SensorSource: Send + Sync {
    fn supports_orientation(&self) -> bool;

    /// Some platforms gate sensors behind an explicit, user-initiated prompt.
    fn requires_permission(&self) -> bool;

    /// Resolves to whether access was granted.
    async fn request_permission(&self) -> bool;

    fn attach(&self, feed: SensorFeed) -> SensorSubscription;
}

/// Latest samples as seen by the frame loop.
#[derive(Clone)]
pub struct SensorReadings {
    orientation: watch::Receiver<Option<OrientationSample>>,
    motion: watch::Receiver<Option<MotionSample>>,
    enabled: watch::Receiver<bool>,
}

impl SensorReadings {
    pub fn enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// `None` while sensors are off.
    pub fn latest(&self) -> Option<(OrientationSample, MotionSample)> {
        if !self.enabled() {
            return None;
        }
        let orientation = (*self.orientation.borrow()).unwrap_or_default();
        let motion = (*self.motion.borrow()).unwrap_or_default();
        Some((orientation, motion))
    }
}

/// Outcome of checking whether sensors can be attached.
pub enum SensorGate {
    Attached,
    Unsupported,
    /// The user has to answer a prompt from this source first.
    Prompt(Arc<dyn SensorSource>),
    Open,
}

impl SensorGate {
    pub fn unsupported() -> SensorStatus {
        log::warn!("Orientation events unavailable, keeping fixed camera pose");
        SensorStatus::Unsupported
    }

    /// Show the sensor prompt and report whether the user granted it.
    pub async fn ask(source: &dyn SensorSource) -> bool {
        let granted = source.request_permission().await;
        if !granted {
            log::warn!("Sensor permission refused, keeping fixed camera pose");
        }
        granted
    }
}

/// Owns the single sensor subscription of an AR session.
pub struct SensorHub {
    source: Arc<dyn SensorSource>,
    feed: SensorFeed,
    enabled: watch::Sender<bool>,
    subscription: Option<SensorSubscription>,
    readings: SensorReadings,
}

impl SensorHub {
    pub fn new(source: Arc<dyn SensorSource>) -> Self {
        let (orientation_tx, orientation_rx) = watch::channel(None);
        let (motion_tx, motion_rx) = watch::channel(None);
        let (enabled_tx, enabled_rx) = watch::channel(false);
        Self {
            source,
            feed: SensorFeed {
                orientation: Arc::new(orientation_tx),
                motion: Arc::new(motion_tx),
            },
            enabled: enabled_tx,
            subscription: None,
            readings: SensorReadings {
                orientation: orientation_rx,
                motion: motion_rx,
                enabled: enabled_rx,
            },
        }
    }

    pub fn readings(&self) -> SensorReadings {
        self.readings.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// What enabling would take right now, without prompting.
    pub fn gate(&self) -> SensorGate {
        if self.is_attached() {
            SensorGate::Attached
        } else if !self.source.supports_orientation() {
            SensorGate::Unsupported
        } else if self.source.requires_permission() {
            SensorGate::Prompt(self.source.clone())
        } else {
            SensorGate::Open
        }
    }

    /// Attach listeners. Permission, where needed, must already be granted.
    pub fn attach(&mut self) -> SensorStatus {
        if !self.is_attached() {
            self.subscription = Some(self.source.attach(self.feed.clone()));
            self.enabled.send_replace(true);
            log::info!("Device orientation and motion sensors enabled");
        }
        SensorStatus::Enabled
    }

    /// Must be triggered by a user gesture on platforms that prompt.
    pub async fn enable(&mut self) -> SensorStatus {
        match self.gate() {
            SensorGate::Attached => return SensorStatus::Enabled,
            SensorGate::Unsupported => return SensorGate::unsupported(),
            SensorGate::Prompt(source) => {
                if !SensorGate::ask(source.as_ref()).await {
                    return SensorStatus::Refused;
                }
            }
            SensorGate::Open => {}
        }
        self.attach()
    }

    pub fn disable(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::info!("Device sensors disabled");
        }
        self.enabled.send_replace(false);
        self.feed.orientation.send_replace(None);
        self.feed.motion.send_replace(None);
    }
}

impl Drop for SensorHub {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSensors;

    #[tokio::test]
    async fn enable_attaches_once_and_disable_detaches() {
        let sensors = FakeSensors::new();
        let mut hub = SensorHub::new(sensors.clone());

        assert_eq!(hub.enable().await, SensorStatus::Enabled);
        assert_eq!(hub.enable().await, SensorStatus::Enabled);
        assert_eq!(sensors.listener_count(), 1);

        hub.disable();
        assert_eq!(sensors.listener_count(), 0);
        assert!(hub.readings().latest().is_none());
    }

    #[tokio::test]
    async fn refused_permission_leaves_sensors_off() {
        let sensors = FakeSensors::gated(false);
        let mut hub = SensorHub::new(sensors.clone());
        assert_eq!(hub.enable().await, SensorStatus::Refused);
        assert_eq!(sensors.listener_count(), 0);
        assert!(!hub.readings().enabled());
    }

    #[tokio::test]
    async fn latest_sample_overwrites_previous() {
        let sensors = FakeSensors::new();
        let mut hub = SensorHub::new(sensors.clone());
        hub.enable().await;

        sensors.emit_orientation(OrientationSample {
            alpha: 10.0,
            beta: 0.0,
            gamma: 0.0,
        });
        sensors.emit_orientation(OrientationSample {
            alpha: 20.0,
            beta: 5.0,
            gamma: 0.0,
        });
        sensors.emit_motion(MotionSample {
            x: 1.0,
            y: 0.0,
            z: 0.0,
        });

        let (orientation, motion) = hub.readings().latest().unwrap();
        assert_eq!(orientation.alpha, 20.0);
        assert_eq!(motion.x, 1.0);
    }

    #[test]
    fn dropping_subscription_runs_detach() {
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen = flag.clone();
        drop(SensorSubscription::new(move || {
            seen.store(true, std::sync::atomic::Ordering::SeqCst)
        }));
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
