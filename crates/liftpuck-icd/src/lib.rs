#![cfg_attr(not(any(test, feature = "use-std")), no_std)]
//! Wire types shared by the puck firmware and anything that talks to it.
//!
//! Every command, response and event is a single JSON object (an
//! [`Envelope`]). Requests arrive as `{id, name, body}`; the device answers
//! with a `resp` envelope whose `ref` echoes the request `id`, and pushes
//! uncorrelated `evt` envelopes whenever something happens on its own.
extern crate alloc;

use alloc::string::String;
use core::fmt;
use heapless::String as HString;
use serde::{Deserialize, Serialize};

mod bodies;
pub use bodies::*;

mod mode;
pub use mode::*;

mod session;
pub use session::*;

// Constants
pub const PROTOCOL_VERSION: u8 = 1;
/// Inbound payloads above this size are rejected before decoding.
pub const MAX_PAYLOAD_LEN: usize = 2048;
/// `sessions.list` never returns more items than this per page.
pub const MAX_PAGE_LIMIT: usize = 15;
/// Bytes pushed to the secondary link per control cycle.
pub const STREAM_CHUNK_LEN: usize = 512;
pub const MAX_SESSION_ID_LEN: usize = 64;
pub const MAX_LIFT_LEN: usize = 32;

pub const SRC_DEVICE: &str = "device";
pub const DST_PHONE: &str = "phone";

pub const SESSIONS_DIR: &str = "/sessions";
pub const SESSION_INDEX_PATH: &str = "/sessions/index.ndjson";
pub const SESSION_INDEX_NAME: &str = "index.ndjson";
pub const TMP_EXT: &str = ".tmp";
pub const CSV_EXT: &str = ".csv";

/// Command names understood by the dispatcher.
pub mod commands {
    pub const PING: &str = "ping";
    pub const CAPABILITIES_GET: &str = "capabilities.get";
    pub const TIME_SYNC: &str = "time.sync";
    pub const MODE_SET: &str = "mode.set";
    pub const STATUS_GET: &str = "status.get";
    pub const SESSION_START: &str = "session.start";
    pub const SESSION_END: &str = "session.end";
    pub const SESSIONS_LIST: &str = "sessions.list";
    pub const SESSION_STREAM: &str = "session.stream";
    pub const SESSIONS_CLEAR: &str = "sessions.clear";
    pub const SESSIONS_REBUILD: &str = "sessions.rebuild";
}

/// Names of unsolicited `evt` envelopes.
pub mod events {
    pub const SESSION_STARTED: &str = "session.started";
    pub const TIME_SYNC_REQUEST: &str = "time.sync.request";
    pub const TIME_SYNC_TIMEOUT: &str = "time.sync.timeout";
    pub const TIME_SYNCED: &str = "time.synced";
    pub const ORIENTATION_STATUS: &str = "orientation.status";
    pub const CALIBRATION_SUCCEEDED: &str = "calibration.succeeded";
    pub const CALIBRATION_LOST: &str = "calibration.lost";
    pub const SESSION_FILE_ERROR: &str = "session.file.error";
    pub const SECONDARY_REQUIRED: &str = "secondary.required";
}

/// Marker line names framing a file on the secondary link.
pub mod markers {
    pub const FILE_START: &str = "session.file.start";
    pub const FILE_END: &str = "session.file.end";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Resp,
    Evt,
}

/// Result codes carried by `resp` envelopes and some events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Ok,
    BadArgs,
    BadJson,
    MissingName,
    PayloadTooLarge,
    Unsupported,
    AlreadyActive,
    NotActive,
    SessionActive,
    CalibrationRequired,
    SdError,
    NoSecondaryLink,
    NotFound,
    StreamFailed,
    StreamAborted,
}

impl Code {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadArgs => "BAD_ARGS",
            Self::BadJson => "BAD_JSON",
            Self::MissingName => "MISSING_NAME",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Unsupported => "UNSUPPORTED",
            Self::AlreadyActive => "ALREADY_ACTIVE",
            Self::NotActive => "NOT_ACTIVE",
            Self::SessionActive => "SESSION_ACTIVE",
            Self::CalibrationRequired => "CALIBRATION_REQUIRED",
            Self::SdError => "SD_ERROR",
            Self::NoSecondaryLink => "NO_SECONDARY_LINK",
            Self::NotFound => "NOT_FOUND",
            Self::StreamFailed => "STREAM_FAILED",
            Self::StreamAborted => "STREAM_ABORTED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u8,
    pub id: String,
    pub ts: i64,
    pub src: String,
    pub dst: String,
    pub kind: Kind,
    pub name: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    pub fn is_evt(&self) -> bool {
        self.kind == Kind::Evt
    }
}

/// Turns a typed body into the JSON object carried in `Envelope::body`.
///
/// Anything that does not serialize to an object yields an empty body.
pub fn body_of<T: Serialize>(
    value: &T,
) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct SessionId(pub HString<MAX_SESSION_ID_LEN>);

impl SessionId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&str> for SessionId {
    type Error = IdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        if value.chars().any(|c| c == '/' || c.is_control()) {
            return Err(IdError::InvalidChar);
        }
        HString::try_from(value).map(Self).map_err(|_| IdError::TooLong)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text exercise label ("deadlift", "back squat", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct Lift(pub HString<MAX_LIFT_LEN>);

impl Lift {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        let mut label = HString::new();
        let _ = label.push_str(Self::UNKNOWN);
        Self(label)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for Lift {
    type Error = IdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        // Labels land in a `#` header line of the session file.
        if value.chars().any(char::is_control) {
            return Err(IdError::InvalidChar);
        }
        HString::try_from(value).map(Self).map_err(|_| IdError::TooLong)
    }
}

impl fmt::Display for Lift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdError {
    Empty,
    TooLong,
    InvalidChar,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::TooLong => f.write_str("too long"),
            Self::InvalidChar => f.write_str("contains '/' or a control character"),
        }
    }
}
