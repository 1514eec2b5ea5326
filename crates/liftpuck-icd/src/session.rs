use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// One line of `/sessions/index.ndjson`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIndexEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mtime: u64,
}

impl SessionIndexEntry {
    /// Session id encoded in the file name, without its extension.
    pub fn session_id(&self) -> &str {
        self.name
            .strip_suffix(crate::CSV_EXT)
            .or_else(|| self.name.strip_suffix(crate::TMP_EXT))
            .unwrap_or(&self.name)
    }

    /// Whether the entry still points at an unfinished `.tmp` file.
    pub fn is_partial(&self) -> bool {
        self.name.ends_with(crate::TMP_EXT)
    }
}

/// An index entry as reported by `sessions.list`, with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionListItem {
    pub name: String,
    pub size: u64,
    pub mtime: u64,
    pub line: u32,
}

/// Framing line written around a file pushed over the secondary link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMarker {
    pub event: String,
    pub session_id: SessionId,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entry_tolerates_missing_numbers() {
        let e: SessionIndexEntry =
            serde_json::from_str(r#"{"name":"A.csv"}"#).unwrap();
        assert_eq!(e.size, 0);
        assert_eq!(e.session_id(), "A");
        assert!(!e.is_partial());
    }

    #[test]
    fn partial_entry_strips_tmp() {
        let e = SessionIndexEntry { name: "B.tmp".into(), size: 3, mtime: 0 };
        assert_eq!(e.session_id(), "B");
        assert!(e.is_partial());
    }
}
