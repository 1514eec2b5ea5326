use alloc::string::String;
use liftpuck_icd::{IdError, Lift, SessionId};

use crate::clock::Clock;
use crate::config::Config;
use crate::motion::{MotionTracker, Offsets, Pose, SensorSample};
use crate::protocol::pending::Pending;
use crate::state::DeviceState;
use crate::storage::{generate_session_id, BlockStorage, SessionStore};

/// Connectivity snapshot handed to command handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub wireless: bool,
    pub wired: bool,
    pub secondary: bool,
    pub streaming: bool,
}

/// Everything the control loop and the command handlers share. Owned by
/// the loop; nothing in here is touched from another context.
pub struct AppContext<S: BlockStorage> {
    pub config: Config,
    pub state: DeviceState,
    pub motion: MotionTracker,
    pub store: SessionStore<S>,
    pub clock: Clock,
    pub pending: Pending,
    pub offsets: Offsets,
    pub last_sample: Option<SensorSample>,
    pub last_pose: Option<Pose>,
}

impl<S: BlockStorage> AppContext<S> {
    pub fn new(config: Config, storage: S, now_ms: u64) -> Self {
        let store = SessionStore::new(storage, config.flush_interval_ms);
        Self {
            config,
            state: DeviceState::default(),
            motion: MotionTracker::new(now_ms),
            store,
            clock: Clock::new(),
            pending: Pending::new(),
            offsets: Offsets::default(),
            last_sample: None,
            last_pose: None,
        }
    }

    /// Timestamped id for sessions the caller did not name.
    pub fn new_session_id(
        &self,
        lift: &Lift,
        now_ms: u64,
    ) -> Result<SessionId, IdError> {
        let id: String = generate_session_id(
            self.clock.datetime(now_ms),
            lift.as_str(),
            &self.config.device_suffix,
        );
        SessionId::try_from(id.as_str())
    }

    /// Epoch-or-uptime milliseconds, clamped for use as a file mtime.
    pub fn wall_ms(&self, now_ms: u64) -> u64 {
        self.clock.timestamp_ms(now_ms).max(0) as u64
    }

    /// Captures the latest raw sample as the new zero pose.
    pub fn tare(&mut self) -> Option<Offsets> {
        let sample = self.last_sample?;
        self.offsets = Offsets::from_sample(&sample);
        info!("tared at {} mm", self.offsets.distance_mm);
        Some(self.offsets)
    }
}
