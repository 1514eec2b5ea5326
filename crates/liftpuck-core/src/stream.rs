//! Chunked file transfer over the secondary link.
//!
//! A transfer is framed by two JSON marker lines:
//!
//! ```text
//! {"event":"session.file.start","sessionId":"A","size":1234}
//! <1234 raw bytes, at most one chunk per control cycle>
//! {"event":"session.file.end","sessionId":"A","size":1234}
//! ```
//!
//! The end marker reports the bytes actually sent.
use alloc::string::String;
use alloc::vec::Vec;

use derive_more::Display;
use liftpuck_icd::{markers, Code, SessionId, StreamMarker, STREAM_CHUNK_LEN};

use crate::storage::BlockStorage;
use crate::transport::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[display("secondary link not connected")]
    NoLink,
    #[display("a stream is already running")]
    Busy,
    #[display("secondary link write failed")]
    Link,
    #[display("session file unreadable")]
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub session_id: SessionId,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Progress { sent: u64 },
    Finished { session_id: SessionId, sent: u64 },
    /// The transfer stopped early; `code` says why.
    Aborted { session_id: SessionId, sent: u64, code: Code },
}

#[derive(Debug)]
struct ActiveStream {
    request: StreamRequest,
    sent: u64,
}

#[derive(Debug, Default)]
pub struct FileStreamer {
    active: Option<ActiveStream>,
}

fn marker_line(event: &str, session_id: &SessionId, size: u64) -> Vec<u8> {
    let marker = StreamMarker {
        event: String::from(event),
        session_id: session_id.clone(),
        size,
    };
    let mut line = serde_json::to_vec(&marker).unwrap_or_default();
    line.push(b'\n');
    line
}

impl FileStreamer {
    pub const fn new() -> Self {
        Self { active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Sends the start marker and arms the pump.
    pub fn start<L: Link>(
        &mut self,
        link: &mut L,
        request: StreamRequest,
    ) -> Result<(), Error> {
        if !link.is_connected() {
            return Err(Error::NoLink);
        }
        if self.active.is_some() {
            return Err(Error::Busy);
        }
        let start =
            marker_line(markers::FILE_START, &request.session_id, request.size);
        link.send(&start).map_err(|_| Error::Link)?;
        info!(
            "streaming {} ({} bytes)",
            request.session_id, request.size
        );
        self.active = Some(ActiveStream { request, sent: 0 });
        Ok(())
    }

    /// Moves at most one chunk. Call once per control cycle.
    pub fn pump<S: BlockStorage, L: Link>(
        &mut self,
        storage: &S,
        link: &mut L,
    ) -> StreamStatus {
        let Some(stream) = self.active.as_mut() else {
            return StreamStatus::Idle;
        };
        if !link.is_connected() {
            return self.abort(Code::StreamAborted);
        }
        if stream.sent >= stream.request.size {
            return self.finish(link);
        }

        let mut chunk = [0u8; STREAM_CHUNK_LEN];
        let remaining = stream.request.size - stream.sent;
        let want = (remaining as usize).min(STREAM_CHUNK_LEN);
        let n = match storage.read_at(
            &stream.request.path,
            stream.sent,
            &mut chunk[..want],
        ) {
            Ok(n) => n,
            Err(_) => return self.abort(Code::SdError),
        };
        if n == 0 {
            return self.finish(link);
        }
        if link.send(&chunk[..n]).is_err() {
            return self.abort(Code::StreamAborted);
        }
        stream.sent += n as u64;
        trace!("stream chunk {} bytes, {} sent", n, stream.sent);

        if stream.sent >= stream.request.size {
            self.finish(link)
        } else {
            StreamStatus::Progress { sent: stream.sent }
        }
    }

    /// Drops the running transfer without an end marker.
    pub fn abort(&mut self, code: Code) -> StreamStatus {
        match self.active.take() {
            Some(s) => {
                warn!(
                    "stream {} aborted after {} bytes: {}",
                    s.request.session_id, s.sent, code
                );
                StreamStatus::Aborted {
                    session_id: s.request.session_id,
                    sent: s.sent,
                    code,
                }
            }
            None => StreamStatus::Idle,
        }
    }

    fn finish<L: Link>(&mut self, link: &mut L) -> StreamStatus {
        let Some(s) = self.active.take() else {
            return StreamStatus::Idle;
        };
        let end = marker_line(markers::FILE_END, &s.request.session_id, s.sent);
        if link.send(&end).is_err() {
            warn!("end marker for {} not delivered", s.request.session_id);
        }
        info!("stream {} done, {} bytes", s.request.session_id, s.sent);
        StreamStatus::Finished { session_id: s.request.session_id, sent: s.sent }
    }
}
