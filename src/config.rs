use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{dashboard::DashboardSettings, errors::DashError, telemetry::PollSettings};

const APP_DIR_NAME: &str = "gsxr-dash";
const CONFIG_FILE_NAME: &str = "config.json";
const MIN_INTERVAL_MS: u64 = 1;

/// Periodic loops never run faster than once per millisecond.
fn interval(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_INTERVAL_MS))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub logger_host: String,
    pub logger_port: u16,
    pub request_token: String,
    pub max_frame_size: usize,
    pub startup_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub receive_timeout_ms: Option<u64>,
    pub lap_timer_interval_ms: u64,
    pub fault_rotation_interval_ms: u64,
    pub clock_interval_ms: u64,
    pub splash_duration_ms: u64,
    pub calibration_offset_deg: i32,
    pub lap_mode_window: u32,
    pub rear_brake_shutdown: bool,
    pub stats_every_frames: u64,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            logger_host: "127.0.0.1".to_string(),
            logger_port: 9100,
            request_token: "REQ".to_string(),
            max_frame_size: 1880,
            startup_delay_ms: 5_000,
            poll_interval_ms: 1,
            receive_timeout_ms: None,
            lap_timer_interval_ms: 10,
            fault_rotation_interval_ms: 500,
            clock_interval_ms: 1_000,
            splash_duration_ms: 3_000,
            calibration_offset_deg: 5,
            lap_mode_window: 1_000,
            rear_brake_shutdown: true,
            stats_every_frames: 100,
        }
    }
}

impl DashConfig {
    pub fn local_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the user's config directory. A missing or unreadable
    /// file yields `None`.
    pub fn from_local_file() -> Option<Self> {
        let config_path = Self::local_path()?;
        if !config_path.exists() {
            return None;
        }
        Self::from_file(&config_path)
            .map_err(|e| warn!("Ignoring config file {}: {}", config_path.display(), e))
            .ok()
    }

    pub fn from_file(path: &Path) -> Result<Self, DashError> {
        let file = std::fs::File::open(path).map_err(|e| DashError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| DashError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<PathBuf, DashError> {
        let config_path = Self::local_path().ok_or(DashError::NoConfigDir)?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), DashError> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| DashError::ConfigIOError { source: e })?;
        }
        let file = std::fs::File::create(path).map_err(|e| DashError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| DashError::ConfigSerializeError { source: e })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            poll_interval: interval(self.poll_interval_ms),
            stats_every_frames: self.stats_every_frames,
        }
    }

    pub fn lap_timer_interval(&self) -> Duration {
        interval(self.lap_timer_interval_ms)
    }

    pub fn fault_rotation_interval(&self) -> Duration {
        interval(self.fault_rotation_interval_ms)
    }

    pub fn clock_interval(&self) -> Duration {
        interval(self.clock_interval_ms)
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            calibration_offset_deg: self.calibration_offset_deg,
            lap_mode_window: self.lap_mode_window,
            rear_brake_shutdown: self.rear_brake_shutdown,
        }
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_ms.map(Duration::from_millis)
    }
}
