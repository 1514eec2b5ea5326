use alloc::string::{String, ToString};
use serde_json::Value;

use liftpuck_icd::{commands, Code, MAX_PAYLOAD_LEN};

use super::envelope::Body;

/// Every command the device answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Ping,
    CapabilitiesGet,
    TimeSync,
    ModeSet,
    StatusGet,
    SessionStart,
    SessionEnd,
    SessionsList,
    SessionStream,
    SessionsClear,
    SessionsRebuild,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Self::Ping,
        Self::CapabilitiesGet,
        Self::TimeSync,
        Self::ModeSet,
        Self::StatusGet,
        Self::SessionStart,
        Self::SessionEnd,
        Self::SessionsList,
        Self::SessionStream,
        Self::SessionsClear,
        Self::SessionsRebuild,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping => commands::PING,
            Self::CapabilitiesGet => commands::CAPABILITIES_GET,
            Self::TimeSync => commands::TIME_SYNC,
            Self::ModeSet => commands::MODE_SET,
            Self::StatusGet => commands::STATUS_GET,
            Self::SessionStart => commands::SESSION_START,
            Self::SessionEnd => commands::SESSION_END,
            Self::SessionsList => commands::SESSIONS_LIST,
            Self::SessionStream => commands::SESSION_STREAM,
            Self::SessionsClear => commands::SESSIONS_CLEAR,
            Self::SessionsRebuild => commands::SESSIONS_REBUILD,
        }
    }

    /// Exact match, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub name: String,
    /// The request `id`, echoed back as `ref`.
    pub reference: Option<String>,
    /// The `body` object, or the whole document for flat legacy requests.
    pub args: Body,
}

/// A payload refused before any command ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub name: String,
    pub reference: Option<String>,
    pub code: Code,
    pub msg: &'static str,
}

const UNKNOWN_NAME: &str = "unknown";

fn reject(reference: Option<String>, code: Code, msg: &'static str) -> Rejection {
    Rejection { name: String::from(UNKNOWN_NAME), reference, code, msg }
}

fn reference_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_request(payload: &[u8]) -> Result<Request, Rejection> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(reject(None, Code::PayloadTooLarge, "Payload too large"));
    }
    let Ok(Value::Object(mut root)) = serde_json::from_slice::<Value>(payload)
    else {
        return Err(reject(None, Code::BadJson, "Invalid JSON"));
    };

    let reference = reference_of(root.get("id"));
    let name = ["name", "cmd"]
        .into_iter()
        .filter_map(|key| root.get(key).and_then(Value::as_str))
        .find(|name| !name.is_empty())
        .map(String::from);
    let Some(name) = name else {
        return Err(reject(reference, Code::MissingName, "Missing name"));
    };

    let args = match root.remove("body") {
        Some(Value::Object(body)) => body,
        _ => root,
    };
    Ok(Request { name, reference, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(Command::from_name("PING"), Some(Command::Ping));
        assert_eq!(Command::from_name("Session.Start"), Some(Command::SessionStart));
        assert_eq!(Command::from_name("session.start "), None);
        assert_eq!(Command::from_name("reboot"), None);
    }

    #[test]
    fn body_object_wins_over_root() {
        let req =
            parse_request(br#"{"id":"7","name":"mode.set","body":{"mode":"RUN"}}"#)
                .unwrap();
        assert_eq!(req.name, "mode.set");
        assert_eq!(req.reference.as_deref(), Some("7"));
        assert_eq!(req.args.get("mode"), Some(&Value::from("RUN")));
    }

    #[test]
    fn legacy_cmd_with_flat_args_and_numeric_id() {
        let req = parse_request(br#"{"cmd":"sessions.list","id":12,"limit":3}"#)
            .unwrap();
        assert_eq!(req.name, "sessions.list");
        assert_eq!(req.reference.as_deref(), Some("12"));
        assert_eq!(req.args.get("limit"), Some(&Value::from(3)));
    }

    #[test]
    fn rejections() {
        let big = alloc::vec![b' '; MAX_PAYLOAD_LEN + 1];
        assert_eq!(parse_request(&big).unwrap_err().code, Code::PayloadTooLarge);
        assert_eq!(parse_request(b"{nope").unwrap_err().code, Code::BadJson);
        assert_eq!(parse_request(b"[1,2]").unwrap_err().code, Code::BadJson);

        let missing = parse_request(br#"{"id":"9","body":{}}"#).unwrap_err();
        assert_eq!(missing.code, Code::MissingName);
        assert_eq!(missing.reference.as_deref(), Some("9"));
        assert_eq!(missing.name, "unknown");
    }
}
