//! Request arguments, response bodies and event bodies.
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::{Code, DeviceMode, Facing, Lift, SessionId, SessionListItem};

fn default_page_limit() -> i64 {
    crate::MAX_PAGE_LIMIT as i64
}

fn is_false(value: &bool) -> bool {
    !*value
}

// Requests

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncArgs {
    #[serde(default)]
    pub phone_epoch_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeSetArgs {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartArgs {
    #[serde(default, alias = "exercise")]
    pub lift: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsListArgs {
    #[serde(default)]
    pub cursor: i64,
    #[serde(default = "default_page_limit")]
    pub limit: i64,
}

impl Default for SessionsListArgs {
    fn default() -> Self {
        Self { cursor: 0, limit: default_page_limit() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStreamArgs {
    #[serde(default)]
    pub session_id: Option<String>,
}

// Responses

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingBody {
    pub uptime_ms: u64,
    /// Zero until the phone has synced the clock.
    pub epoch_ms: i64,
    pub fw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub model: String,
    pub fw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesBody {
    pub device: DeviceDescriptor,
    pub max_mtu: u16,
    pub commands: Vec<String>,
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncBody {
    pub epoch_at_sync_ms: i64,
    pub tick_at_sync_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: DeviceMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartBody {
    pub session_id: SessionId,
    pub lift: Lift,
    pub mode: DeviceMode,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsListBody {
    pub items: Vec<SessionListItem>,
    pub next_cursor: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStreamBody {
    pub session_id: SessionId,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsClearBody {
    pub removed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsRebuildBody {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub mode: DeviceMode,
    pub imu_calibrated: bool,
    pub range_valid: bool,
    pub ready: bool,
    pub session_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_start: Option<SessionId>,
    pub time_synced: bool,
    pub awaiting_time_sync: bool,
    pub stream_active: bool,
    pub uptime_ms: u64,
}

// Events

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedEvent {
    pub session_id: SessionId,
    pub lift: Lift,
    pub auto: bool,
}

/// Body of `time.sync.request` and `time.sync.timeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncWindow {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncedEvent {
    pub epoch_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationEvent {
    pub facing: Facing,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEvent {
    pub imu: bool,
    pub range: bool,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileErrorEvent {
    pub session_id: SessionId,
    pub code: Code,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRequiredEvent {
    pub status: String,
}
