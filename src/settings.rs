use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

/// Upper bound on how long the model may hold back interactivity.
pub const MAX_FORCE_READY_MS: u64 = 5_000;

/// Timing and scaling knobs for the AR flows. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArTuning {
    pub camera_timeout_ms: u64,
    pub video_ready_timeout_ms: u64,
    /// Delay before requesting media so the video surface exists.
    pub init_settle_ms: u64,
    /// Delay after the camera goes live before surface detection starts.
    pub camera_stabilize_ms: u64,
    /// Quiet period after the loader reports content, to avoid flicker.
    pub model_settle_ms: u64,
    pub force_ready_after_ms: u64,
    pub scan_interval_ms: u64,
    pub frame_interval_ms: u64,
    pub motion_damping: f32,
    pub surface_baseline: f32,
    pub surface_amplitude: f32,
    pub surface_period_ms: u64,
}

impl Default for ArTuning {
    fn default() -> Self {
        Self {
            camera_timeout_ms: 10_000,
            video_ready_timeout_ms: 3_000,
            init_settle_ms: 100,
            camera_stabilize_ms: 500,
            model_settle_ms: 200,
            force_ready_after_ms: 1_000,
            scan_interval_ms: 300,
            frame_interval_ms: 16,
            motion_damping: 0.1,
            surface_baseline: -1.0,
            surface_amplitude: 0.02,
            surface_period_ms: 4_000,
        }
    }
}

impl ArTuning {
    /// Clamp values that would otherwise stall a session or spin a loop.
    pub fn normalized(mut self) -> Self {
        self.force_ready_after_ms = self.force_ready_after_ms.min(MAX_FORCE_READY_MS);
        self.model_settle_ms = self.model_settle_ms.min(self.force_ready_after_ms);
        self.scan_interval_ms = self.scan_interval_ms.max(1);
        self.frame_interval_ms = self.frame_interval_ms.max(1);
        self.surface_period_ms = self.surface_period_ms.max(1);
        self.motion_damping = self.motion_damping.clamp(0.0, 1.0);
        self
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_timeout_ms)
    }

    pub fn video_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.video_ready_timeout_ms)
    }

    pub fn init_settle(&self) -> Duration {
        Duration::from_millis(self.init_settle_ms)
    }

    pub fn camera_stabilize(&self) -> Duration {
        Duration::from_millis(self.camera_stabilize_ms)
    }

    pub fn model_settle(&self) -> Duration {
        Duration::from_millis(self.model_settle_ms)
    }

    pub fn force_ready_after(&self) -> Duration {
        Duration::from_millis(self.force_ready_after_ms.min(MAX_FORCE_READY_MS))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    ar_tuning: ArTuning,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data: UserSettings = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {}",
                    path.display(),
                    err
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn ar_tuning(&self) -> ArTuning {
        self.read().ar_tuning.clone().normalized()
    }

    pub fn update_ar_tuning(&self, tuning: ArTuning) -> Result<ArTuning> {
        let tuning = tuning.normalized();
        let mut guard = self.write();
        guard.ar_tuning = tuning.clone();
        self.persist(&guard)?;
        Ok(tuning)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
