use time::OffsetDateTime;

/// Wall-clock anchor handed to us by the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub epoch_ms: i64,
    pub tick_ms: u64,
}

/// Maps the monotonic uptime counter onto phone-supplied wall-clock time.
///
/// Until [`Clock::sync`] is called every timestamp falls back to uptime.
#[derive(Debug, Default)]
pub struct Clock {
    anchor: Option<Anchor>,
}

impl Clock {
    pub const fn new() -> Self {
        Self { anchor: None }
    }

    pub fn sync(&mut self, epoch_ms: i64, now_ms: u64) -> Anchor {
        let anchor = Anchor { epoch_ms, tick_ms: now_ms };
        self.anchor = Some(anchor);
        info!("clock synced: epoch {} at tick {}", epoch_ms, now_ms);
        anchor
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn epoch_ms(&self, now_ms: u64) -> Option<i64> {
        self.anchor.map(|a| {
            let elapsed = now_ms.saturating_sub(a.tick_ms) as i64;
            a.epoch_ms.saturating_add(elapsed)
        })
    }

    /// Best-effort timestamp: epoch milliseconds once synced, uptime before.
    pub fn timestamp_ms(&self, now_ms: u64) -> i64 {
        self.epoch_ms(now_ms).unwrap_or(now_ms as i64)
    }

    /// Calendar time for file naming. Uptime counts from 1970 when unsynced.
    pub fn datetime(&self, now_ms: u64) -> OffsetDateTime {
        let secs = self.timestamp_ms(now_ms).div_euclid(1000);
        OffsetDateTime::from_unix_timestamp(secs)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}
