use liftpuck_icd::{Lift, SessionId};

/// A `session.start` accepted before the device was ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStart {
    pub session_id: SessionId,
    pub lift: Lift,
}

/// Operations waiting on a later control cycle.
#[derive(Debug, Default)]
pub struct Pending {
    start: Option<PendingStart>,
    time_sync_since: Option<u64>,
}

impl Pending {
    pub const fn new() -> Self {
        Self { start: None, time_sync_since: None }
    }

    /// Replaces any earlier pending start.
    pub fn defer_start(&mut self, start: PendingStart) {
        if let Some(old) = self.start.replace(start) {
            debug!("pending start {} replaced", old.session_id);
        }
    }

    pub fn start(&self) -> Option<&PendingStart> {
        self.start.as_ref()
    }

    pub fn take_start(&mut self) -> Option<PendingStart> {
        self.start.take()
    }

    pub fn arm_time_sync(&mut self, now_ms: u64) {
        self.time_sync_since = Some(now_ms);
    }

    pub fn awaiting_time_sync(&self) -> bool {
        self.time_sync_since.is_some()
    }

    /// Returns whether a time sync was actually outstanding.
    pub fn clear_time_sync(&mut self) -> bool {
        self.time_sync_since.take().is_some()
    }

    /// Clears and reports an outstanding time sync once `timeout_ms` has
    /// passed.
    pub fn expire_time_sync(&mut self, now_ms: u64, timeout_ms: u64) -> bool {
        match self.time_sync_since {
            Some(since) if now_ms.saturating_sub(since) >= timeout_ms => {
                self.time_sync_since = None;
                true
            }
            _ => false,
        }
    }
}
