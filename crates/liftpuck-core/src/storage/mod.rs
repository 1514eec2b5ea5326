//! Session storage on top of a small path-based file contract.
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use derive_more::{Display, From};
use liftpuck_icd::{Code, SESSIONS_DIR};

mod id;
mod lines;
pub mod mem;
mod session;

pub use id::{generate_session_id, slugify, SLUG_PLACEHOLDER};
pub use lines::Lines;
pub use mem::MemStorage;
pub use session::{IndexPage, RowSample, SessionInfo, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    pub size: u64,
    /// Last modification as epoch milliseconds, when the medium tracks it.
    pub modified_ms: Option<u64>,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub meta: Metadata,
}

/// Hierarchical file namespace backing the session store.
///
/// Paths are absolute and `/`-separated. Only the operations the store
/// needs are required; no handles are kept open between calls.
pub trait BlockStorage {
    type Error: Debug;

    fn create_dir_all(&mut self, path: &str) -> Result<(), Self::Error>;

    fn exists(&self, path: &str) -> Result<bool, Self::Error>;

    /// Creates an empty file, truncating any existing one.
    fn create(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Appends to a file, creating it if missing.
    fn append(&mut self, path: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads up to `buf.len()` bytes at `offset`. Zero means end of file.
    fn read_at(
        &self,
        path: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error>;

    fn metadata(&self, path: &str) -> Result<Metadata, Self::Error>;

    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;

    fn remove(&mut self, path: &str) -> Result<(), Self::Error>;

    fn list(&self, dir: &str) -> Result<Vec<DirEntry>, Self::Error>;

    /// Pushes buffered writes for `path` to the medium.
    fn sync(&mut self, path: &str) -> Result<(), Self::Error>;
}

/// Errors reported by [`SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq, Display, From)]
pub enum Error<E: Debug> {
    #[display("storage error: {_0:?}")]
    #[from]
    Storage(E),
    #[display("a session is already active")]
    AlreadyActive,
    #[display("a session with this id already exists")]
    Exists,
    #[display("no session is active")]
    NotActive,
    #[display("sessions cannot be cleared while one is active")]
    SessionActive,
    #[display("session not found")]
    NotFound,
    #[display("index entry could not be encoded")]
    Encode,
}

impl<E: Debug> Error<E> {
    /// Wire result code for this failure.
    pub fn code(&self) -> Code {
        match self {
            Self::Storage(_) | Self::Encode => Code::SdError,
            Self::AlreadyActive => Code::AlreadyActive,
            Self::Exists => Code::BadArgs,
            Self::NotActive => Code::NotActive,
            Self::SessionActive => Code::SessionActive,
            Self::NotFound => Code::NotFound,
        }
    }
}

pub fn session_path(name: &str) -> String {
    format!("{}/{}", SESSIONS_DIR, name)
}

pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
