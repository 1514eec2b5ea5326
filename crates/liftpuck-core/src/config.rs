use alloc::string::String;
use liftpuck_icd::DeviceMode;
use serde::{Deserialize, Serialize};

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MODEL: &str = "liftpuck";

/// Mode forced when the IMU loses calibration while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GuardTarget {
    #[default]
    Calibrate,
    Idle,
}

impl GuardTarget {
    pub const fn mode(&self) -> DeviceMode {
        match self {
            Self::Calibrate => DeviceMode::Calibrate,
            Self::Idle => DeviceMode::Idle,
        }
    }
}

/// Runtime tunables. Missing fields in a config document keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub idle_timeout_ms: u64,
    pub time_sync_timeout_ms: u64,
    pub flush_interval_ms: u64,
    pub motion_distance_mm: i32,
    pub motion_angle_deg: f32,
    pub calibration_quality_min: u8,
    pub facing_threshold_deg: f32,
    pub guard_target: GuardTarget,
    pub device_suffix: String,
    pub model: String,
    pub fw_version: String,
    pub max_mtu: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            time_sync_timeout_ms: 10_000,
            flush_interval_ms: 1_000,
            motion_distance_mm: 15,
            motion_angle_deg: 5.0,
            calibration_quality_min: 2,
            facing_threshold_deg: 60.0,
            guard_target: GuardTarget::Calibrate,
            device_suffix: String::from("PUCK"),
            model: String::from(MODEL),
            fw_version: String::from(FW_VERSION),
            max_mtu: 247,
        }
    }
}
