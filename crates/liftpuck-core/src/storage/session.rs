use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use core::ops::ControlFlow;

use liftpuck_icd::{
    Lift, SessionId, SessionIndexEntry, CSV_EXT, SESSIONS_DIR,
    SESSION_INDEX_NAME, SESSION_INDEX_PATH, TMP_EXT,
};

use super::{basename, session_path, BlockStorage, DirEntry, Error, Lines};
use crate::motion::Offsets;

/// Rows buffered past this size are flushed early.
const MAX_BUFFERED: usize = 4096;

pub type Result<T, S> = core::result::Result<T, Error<<S as BlockStorage>::Error>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub lift: Lift,
    pub offsets: Offsets,
    pub started_ms: u64,
}

/// One logged sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSample {
    pub timestamp_ms: i64,
    pub raw_distance_mm: i32,
    pub rel_dist_mm: i32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexPage {
    pub next_cursor: u32,
    pub has_more: bool,
    /// Entries handed to the visitor.
    pub count: u32,
}

#[derive(Debug)]
struct OpenSession {
    info: SessionInfo,
    tmp_path: String,
    rows: String,
    rows_logged: u32,
    last_flush_ms: u64,
}

/// Owns the session directory: one open `.tmp` log at most, finished `.csv`
/// logs, and the append-only `index.ndjson`.
pub struct SessionStore<S: BlockStorage> {
    storage: S,
    open: Option<OpenSession>,
    flush_interval_ms: u64,
}

fn is_session_file(entry: &DirEntry) -> bool {
    !entry.meta.is_dir
        && entry.name != SESSION_INDEX_NAME
        && (entry.name.ends_with(CSV_EXT) || entry.name.ends_with(TMP_EXT))
}

fn header(info: &SessionInfo) -> String {
    let o = &info.offsets;
    format!(
        "# liftpuck session\n\
         # session_id={}\n\
         # exercise={}\n\
         # calib_distance_offset_mm={}\n\
         # calib_roll_offset_deg={:.2}\n\
         # calib_pitch_offset_deg={:.2}\n\
         # calib_yaw_offset_deg={:.2}\n\
         timestamp_ms,dist_mm,relDist_mm,roll_deg,pitch_deg,yaw_deg\n",
        info.id, info.lift, o.distance_mm, o.roll, o.pitch, o.yaw
    )
}

impl<S: BlockStorage> SessionStore<S> {
    pub fn new(storage: S, flush_interval_ms: u64) -> Self {
        Self { storage, open: None, flush_interval_ms }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn is_active(&self) -> bool {
        self.open.is_some()
    }

    pub fn active(&self) -> Option<&SessionInfo> {
        self.open.as_ref().map(|o| &o.info)
    }

    pub fn rows_logged(&self) -> u32 {
        self.open.as_ref().map_or(0, |o| o.rows_logged)
    }

    pub fn start_session(
        &mut self,
        id: SessionId,
        lift: Lift,
        offsets: Offsets,
        now_ms: u64,
    ) -> Result<(), S> {
        if self.open.is_some() {
            return Err(Error::AlreadyActive);
        }
        if self.id_taken(&id)? {
            return Err(Error::Exists);
        }
        self.storage.create_dir_all(SESSIONS_DIR)?;
        if !self.storage.exists(SESSION_INDEX_PATH)? {
            self.storage.create(SESSION_INDEX_PATH)?;
        }

        let tmp_path = session_path(&format!("{}{}", id, TMP_EXT));
        let info = SessionInfo { id, lift, offsets, started_ms: now_ms };
        if let Err(e) = self.write_header(&tmp_path, &info) {
            let _ = self.storage.remove(&tmp_path);
            return Err(e);
        }

        info!("session {} started ({})", info.id, info.lift);
        self.open = Some(OpenSession {
            info,
            tmp_path,
            rows: String::new(),
            rows_logged: 0,
            last_flush_ms: now_ms,
        });
        Ok(())
    }

    /// Whether a `.csv` or `.tmp` log for `id` is already on the medium.
    pub fn id_taken(&self, id: &SessionId) -> Result<bool, S> {
        for ext in [CSV_EXT, TMP_EXT] {
            if self.storage.exists(&session_path(&format!("{}{}", id, ext)))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn write_header(&mut self, path: &str, info: &SessionInfo) -> Result<(), S> {
        self.storage.create(path)?;
        self.storage.append(path, header(info).as_bytes())?;
        self.storage.sync(path)?;
        Ok(())
    }

    /// Buffers one row; rows reach the medium at most one flush interval
    /// later.
    pub fn log_sample(&mut self, row: &RowSample, now_ms: u64) -> Result<(), S> {
        let open = self.open.as_mut().ok_or(Error::NotActive)?;
        // Writing into a String cannot fail.
        let _ = writeln!(
            open.rows,
            "{},{},{},{:.3},{:.3},{:.3}",
            row.timestamp_ms,
            row.raw_distance_mm,
            row.rel_dist_mm,
            row.roll,
            row.pitch,
            row.yaw
        );
        open.rows_logged += 1;

        if open.rows.len() >= MAX_BUFFERED {
            return self.flush(now_ms);
        }
        self.flush_if_due(now_ms)
    }

    /// Flushes once the interval since the last flush has passed, whether
    /// or not rows are still arriving.
    pub fn flush_if_due(&mut self, now_ms: u64) -> Result<(), S> {
        let due = self.open.as_ref().is_some_and(|open| {
            now_ms.saturating_sub(open.last_flush_ms) > self.flush_interval_ms
        });
        if due {
            self.flush(now_ms)?;
        }
        Ok(())
    }

    /// Writes buffered rows and syncs the open log.
    pub fn flush(&mut self, now_ms: u64) -> Result<(), S> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        open.last_flush_ms = now_ms;
        if open.rows.is_empty() {
            return Ok(());
        }
        let rows = core::mem::take(&mut open.rows);
        trace!("flushing {} bytes", rows.len());
        if let Err(e) = self.storage.append(&open.tmp_path, rows.as_bytes()) {
            // Kept for the next flush.
            open.rows = rows;
            return Err(Error::Storage(e));
        }
        self.storage.sync(&open.tmp_path)?;
        Ok(())
    }

    /// Closes the open session, renames it to `.csv` and records it in the
    /// index. `wall_ms` stands in for the file mtime when the medium has
    /// none.
    ///
    /// The session is closed even when finalizing fails.
    pub fn end_session(&mut self, wall_ms: u64) -> Result<SessionIndexEntry, S> {
        if let Err(e) = self.flush(0) {
            warn!("final flush failed: {}", e.code());
        }
        let open = self.open.take().ok_or(Error::NotActive)?;
        let id = &open.info.id;
        let final_path = session_path(&format!("{}{}", id, CSV_EXT));

        if self.storage.exists(&open.tmp_path)? {
            match self.storage.rename(&open.tmp_path, &final_path) {
                Ok(()) => info!("session {} finalized", id),
                Err(_) => warn!("rename failed, keeping {}.tmp", id),
            }
        }

        let path = if self.storage.exists(&final_path)? {
            final_path
        } else if self.storage.exists(&open.tmp_path)? {
            open.tmp_path
        } else {
            error!("session {} has no file left", id);
            return Err(Error::NotFound);
        };

        let meta = self.storage.metadata(&path)?;
        let entry = SessionIndexEntry {
            name: String::from(basename(&path)),
            size: meta.size,
            mtime: meta.modified_ms.unwrap_or(wall_ms),
        };
        self.append_index(&[entry.clone()])?;
        info!("session {} closed after {} rows", id, open.rows_logged);
        Ok(entry)
    }

    fn append_index(&mut self, entries: &[SessionIndexEntry]) -> Result<(), S> {
        let mut out = String::new();
        for entry in entries {
            let line =
                serde_json::to_string(entry).map_err(|_| Error::Encode)?;
            out.push_str(&line);
            out.push('\n');
        }
        if out.is_empty() {
            return Ok(());
        }
        self.storage.append(SESSION_INDEX_PATH, out.as_bytes())?;
        self.storage.sync(SESSION_INDEX_PATH)?;
        Ok(())
    }

    /// Cursor-paged index read.
    ///
    /// `cursor` counts non-blank lines. Lines that fail to decode, or carry
    /// an empty name, are skipped but still consumed. The visitor receives
    /// each entry with its line number and may stop the page early; a
    /// stopped entry is not consumed and opens the next page.
    pub fn read_index<F>(
        &self,
        cursor: u32,
        limit: u32,
        mut visit: F,
    ) -> Result<IndexPage, S>
    where
        F: FnMut(&SessionIndexEntry, u32) -> ControlFlow<()>,
    {
        let mut page = IndexPage { next_cursor: cursor, ..Default::default() };
        if !self.storage.exists(SESSION_INDEX_PATH)? {
            return Ok(page);
        }

        let mut lines = Lines::new(&self.storage, SESSION_INDEX_PATH);
        let mut line_no: u32 = 0;
        while let Some(raw) = lines.next_line()? {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let this = line_no;
            line_no += 1;
            if this < cursor {
                continue;
            }
            if page.count >= limit {
                page.has_more = true;
                break;
            }
            match serde_json::from_str::<SessionIndexEntry>(line) {
                Ok(entry) if !entry.name.is_empty() => {
                    if visit(&entry, this).is_break() {
                        page.has_more = true;
                        break;
                    }
                    page.count += 1;
                }
                _ => debug!("skipping index line {}", this),
            }
            page.next_cursor = this + 1;
        }
        Ok(page)
    }

    /// File name of `id` as indexed. A finished `.csv` wins over a `.tmp`
    /// left behind by an interrupted session.
    pub fn find_session(&self, id: &str) -> Result<Option<String>, S> {
        if !self.storage.exists(SESSION_INDEX_PATH)? {
            return Ok(None);
        }
        let mut found_tmp = None;

        let mut lines = Lines::new(&self.storage, SESSION_INDEX_PATH);
        while let Some(raw) = lines.next_line()? {
            let Ok(entry) = serde_json::from_str::<SessionIndexEntry>(raw.trim())
            else {
                continue;
            };
            if entry.name == id || entry.session_id() != id {
                continue;
            }
            if !entry.is_partial() {
                return Ok(Some(entry.name));
            }
            found_tmp = Some(entry.name);
        }
        Ok(found_tmp)
    }

    /// Session files currently in the directory, index excluded.
    pub fn session_files(&self) -> Result<Vec<DirEntry>, S> {
        if !self.storage.exists(SESSIONS_DIR)? {
            return Ok(Vec::new());
        }
        let mut files: Vec<_> = self
            .storage
            .list(SESSIONS_DIR)?
            .into_iter()
            .filter(is_session_file)
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Regenerates the index from the directory, oldest first. The open
    /// session's `.tmp` is left out; closing it appends its line.
    pub fn rebuild_index(&mut self) -> Result<u32, S> {
        self.storage.create_dir_all(SESSIONS_DIR)?;
        self.storage.create(SESSION_INDEX_PATH)?;

        let open_tmp = self.open.as_ref().map(|o| basename(&o.tmp_path));
        let mut entries: Vec<SessionIndexEntry> = self
            .session_files()?
            .into_iter()
            .filter(|e| Some(e.name.as_str()) != open_tmp)
            .map(|e| SessionIndexEntry {
                name: e.name,
                size: e.meta.size,
                mtime: e.meta.modified_ms.unwrap_or(0),
            })
            .collect();
        entries.sort_by(|a, b| (a.mtime, &a.name).cmp(&(b.mtime, &b.name)));

        self.append_index(&entries)?;
        info!("index rebuilt with {} entries", entries.len());
        Ok(entries.len() as u32)
    }

    /// Deletes the index and every session file, returning how many
    /// session files were removed.
    pub fn clear_sessions(&mut self) -> Result<u32, S> {
        if self.open.is_some() {
            return Err(Error::SessionActive);
        }
        let mut removed = 0;
        for entry in self.session_files()? {
            self.storage.remove(&session_path(&entry.name))?;
            removed += 1;
        }
        if self.storage.exists(SESSION_INDEX_PATH)? {
            self.storage.remove(SESSION_INDEX_PATH)?;
        }
        info!("cleared {} session files", removed);
        Ok(removed)
    }
}
