//! One function per command, each turning a request into a reply plus any
//! follow-up the loop has to carry out.
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::ops::ControlFlow;

use serde::de::DeserializeOwned;
use serde_json::Value;

use liftpuck_icd::{
    events, CapabilitiesBody, Code, DeviceDescriptor, DeviceMode, Lift,
    ModeBody, ModeSetArgs, PingBody, SessionEndBody, SessionId,
    SessionListItem, SessionStartArgs, SessionStartBody, SessionStartedEvent,
    SessionStreamArgs, SessionStreamBody, SessionsClearBody, SessionsListArgs,
    SessionsListBody, SessionsRebuildBody, StatusBody, TimeSyncArgs,
    TimeSyncBody, TimeSyncWindow, TimeSyncedEvent, MAX_PAGE_LIMIT,
};

use super::command::Command;
use super::envelope::{Body, Event, Reply};
use super::pending::PendingStart;
use crate::context::{AppContext, LinkStatus};
use crate::storage::{session_path, BlockStorage};
use crate::stream::StreamRequest;

/// What the loop must do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub reply: Reply,
    pub events: Vec<Event>,
    /// Set when `session.stream` validated and the transfer should begin.
    pub stream: Option<StreamRequest>,
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Self { reply, events: Vec::new(), stream: None }
    }
}

type Handled = Result<Outcome, Reply>;

fn decode<T: DeserializeOwned>(args: &Body) -> Result<T, Reply> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|_| Reply::err(Code::BadArgs, "Invalid arguments"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl<S: BlockStorage> AppContext<S> {
    pub fn handle(
        &mut self,
        command: Command,
        args: &Body,
        links: LinkStatus,
        now_ms: u64,
    ) -> Outcome {
        debug!("command {}", command.name());
        let handled = match command {
            Command::Ping => Ok(self.ping(now_ms)),
            Command::CapabilitiesGet => Ok(self.capabilities()),
            Command::TimeSync => self.time_sync(args, now_ms),
            Command::ModeSet => self.mode_set(args, now_ms),
            Command::StatusGet => Ok(self.status(links, now_ms)),
            Command::SessionStart => self.session_start(args, now_ms),
            Command::SessionEnd => Ok(self.session_end(now_ms)),
            Command::SessionsList => self.sessions_list(args),
            Command::SessionStream => self.session_stream(args, links),
            Command::SessionsClear => Ok(self.sessions_clear()),
            Command::SessionsRebuild => Ok(self.sessions_rebuild()),
        };
        handled.unwrap_or_else(Outcome::from)
    }

    fn ping(&self, now_ms: u64) -> Outcome {
        Reply::ok(&PingBody {
            uptime_ms: now_ms,
            epoch_ms: self.clock.epoch_ms(now_ms).unwrap_or(0),
            fw: self.config.fw_version.clone(),
        })
        .into()
    }

    fn capabilities(&self) -> Outcome {
        let features = ["pendingStart", "timeSync", "secondaryStream", "indexRebuild"]
            .into_iter()
            .map(|f| (f.to_string(), true))
            .collect::<BTreeMap<_, _>>();
        Reply::ok(&CapabilitiesBody {
            device: DeviceDescriptor {
                model: self.config.model.clone(),
                fw: self.config.fw_version.clone(),
            },
            max_mtu: self.config.max_mtu,
            commands: Command::ALL.iter().map(|c| c.name().to_string()).collect(),
            features,
        })
        .into()
    }

    fn time_sync(&mut self, args: &Body, now_ms: u64) -> Handled {
        let args: TimeSyncArgs = decode(args)?;
        if args.phone_epoch_ms <= 0 {
            return Err(Reply::err(Code::BadArgs, "phoneEpochMs must be > 0"));
        }
        let anchor = self.clock.sync(args.phone_epoch_ms, now_ms);
        let mut outcome = Outcome::from(Reply::ok(&TimeSyncBody {
            epoch_at_sync_ms: anchor.epoch_ms,
            tick_at_sync_ms: anchor.tick_ms,
        }));
        if self.pending.clear_time_sync() {
            outcome.events.push(Event::new(
                events::TIME_SYNCED,
                &TimeSyncedEvent { epoch_ms: anchor.epoch_ms },
            ));
        }
        Ok(outcome)
    }

    fn mode_set(&mut self, args: &Body, now_ms: u64) -> Handled {
        let args: ModeSetArgs = decode(args)?;
        let Some(name) = args.mode else {
            return Err(Reply::err(Code::BadArgs, "Missing mode"));
        };
        let mode: DeviceMode = name.parse().map_err(|_| {
            Reply::err(Code::BadArgs, "mode must be RUN/IDLE/DUMP/CALIBRATE")
        })?;
        self.state.set_mode(mode);
        self.motion.touch(now_ms);
        Ok(Reply::ok(&ModeBody { mode }).into())
    }

    fn status(&self, links: LinkStatus, now_ms: u64) -> Outcome {
        let readiness = self.state.readiness();
        Reply::ok(&StatusBody {
            mode: self.state.mode(),
            imu_calibrated: readiness.imu_calibrated,
            range_valid: readiness.range_valid,
            ready: readiness.is_ready(),
            session_active: self.store.is_active(),
            session_id: self.store.active().map(|s| s.id.clone()),
            pending_start: self.pending.start().map(|p| p.session_id.clone()),
            time_synced: self.clock.is_synced(),
            awaiting_time_sync: self.pending.awaiting_time_sync(),
            stream_active: links.streaming,
            uptime_ms: now_ms,
        })
        .into()
    }

    fn session_start(&mut self, args: &Body, now_ms: u64) -> Handled {
        if self.store.is_active() {
            return Err(Reply::err(Code::AlreadyActive, "Session already active"));
        }
        let args: SessionStartArgs = decode(args)?;
        let lift = match non_empty(args.lift) {
            Some(label) => Lift::try_from(label.as_str())
                .map_err(|_| Reply::err(Code::BadArgs, "Invalid lift"))?,
            None => Lift::unknown(),
        };
        let session_id = match non_empty(args.session_id) {
            Some(id) => SessionId::try_from(id.as_str()),
            None => self.new_session_id(&lift, now_ms),
        }
        .map_err(|_| Reply::err(Code::BadArgs, "Invalid sessionId"))?;
        match self.store.id_taken(&session_id) {
            Ok(false) => {}
            Ok(true) => {
                return Err(Reply::err(Code::BadArgs, "Session id already exists"));
            }
            Err(e) => return Err(Reply::err(e.code(), "Failed to check session files")),
        }

        self.state.set_mode(DeviceMode::Run);
        self.motion.touch(now_ms);

        let body = SessionStartBody {
            session_id: session_id.clone(),
            lift: lift.clone(),
            mode: DeviceMode::Run,
            pending: false,
        };
        if !self.state.is_ready() {
            info!("session {} deferred until ready", session_id);
            self.pending.defer_start(PendingStart { session_id, lift });
            return Err(Reply::err(
                Code::CalibrationRequired,
                "Calibration required; session will auto-start when ready.",
            )
            .with_body(&SessionStartBody { pending: true, ..body }));
        }

        let offsets = self.offsets;
        match self.store.start_session(session_id, lift, offsets, now_ms) {
            Ok(()) => {
                self.pending.take_start();
                Ok(Reply::ok(&body).into())
            }
            Err(e) => {
                error!("session start failed: {}", e.code());
                Err(Reply::err(e.code(), "Failed to open session file"))
            }
        }
    }

    fn session_end(&mut self, now_ms: u64) -> Outcome {
        if !self.store.is_active() {
            if let Some(pending) = self.pending.take_start() {
                info!("pending start {} canceled", pending.session_id);
                let body = SessionEndBody {
                    session_id: Some(pending.session_id),
                    canceled: true,
                    ..Default::default()
                };
                return Reply::ok(&body)
                    .with_msg("Canceled pending session.start")
                    .into();
            }
            return Reply::err(Code::NotActive, "No active session").into();
        }

        let id = self.store.active().map(|s| s.id.clone());
        let wall_ms = self.wall_ms(now_ms);
        match self.store.end_session(wall_ms) {
            Ok(entry) => Reply::ok(&SessionEndBody {
                session_id: id,
                name: Some(entry.name),
                size: Some(entry.size),
                canceled: false,
            })
            .into(),
            Err(e) => Reply::err(e.code(), "Failed to finalize session").into(),
        }
    }

    fn sessions_list(&mut self, args: &Body) -> Handled {
        let args: SessionsListArgs = decode(args)?;
        let cursor = args.cursor.clamp(0, u32::MAX as i64) as u32;
        let limit = match args.limit {
            l if l <= 0 || l > MAX_PAGE_LIMIT as i64 => MAX_PAGE_LIMIT as u32,
            l => l as u32,
        };

        let mut items = Vec::new();
        let page = self
            .store
            .read_index(cursor, limit, |entry, line| {
                items.push(SessionListItem {
                    name: entry.name.clone(),
                    size: entry.size,
                    mtime: entry.mtime,
                    line,
                });
                ControlFlow::Continue(())
            })
            .map_err(|_| {
                Reply::err(Code::SdError, "Failed to read session index")
            })?;

        Ok(Reply::ok(&SessionsListBody {
            items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
        .into())
    }

    fn session_stream(&mut self, args: &Body, links: LinkStatus) -> Handled {
        let args: SessionStreamArgs = decode(args)?;
        let Some(raw_id) = non_empty(args.session_id) else {
            return Err(Reply::err(Code::BadArgs, "Missing sessionId"));
        };
        let session_id = SessionId::try_from(raw_id.as_str())
            .map_err(|_| Reply::err(Code::BadArgs, "Invalid sessionId"))?;
        if !links.secondary {
            return Err(Reply::err(
                Code::NoSecondaryLink,
                "Secondary link not connected",
            ));
        }

        let sd_error = || Reply::err(Code::SdError, "Failed to open session file");
        let name = self
            .store
            .find_session(session_id.as_str())
            .map_err(|_| sd_error())?
            .ok_or_else(|| Reply::err(Code::NotFound, "Session file not found"))?;
        let path = session_path(&name);
        let storage = self.store.storage();
        if !storage.exists(&path).map_err(|_| sd_error())? {
            return Err(Reply::err(Code::NotFound, "Indexed file missing"));
        }
        let size = storage.metadata(&path).map_err(|_| sd_error())?.size;

        let mut outcome = Outcome::from(Reply::ok(&SessionStreamBody {
            session_id: session_id.clone(),
            size,
        }));
        outcome.stream = Some(StreamRequest { session_id, path, size });
        Ok(outcome)
    }

    fn sessions_clear(&mut self) -> Outcome {
        match self.store.clear_sessions() {
            Ok(removed) => Reply::ok(&SessionsClearBody { removed }).into(),
            Err(e) => Reply::err(e.code(), "Failed to clear sessions").into(),
        }
    }

    fn sessions_rebuild(&mut self) -> Outcome {
        match self.store.rebuild_index() {
            Ok(count) => Reply::ok(&SessionsRebuildBody { count }).into(),
            Err(e) => Reply::err(e.code(), "Failed to rebuild index").into(),
        }
    }

    /// Runs once per cycle, before new commands: expires an unanswered time
    /// sync and opens a deferred session once the device is ready.
    pub fn resolve_pending(&mut self, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let timeout_ms = self.config.time_sync_timeout_ms;
        if self.pending.expire_time_sync(now_ms, timeout_ms) {
            warn!("time sync not answered within {} ms", timeout_ms);
            out.push(Event::new(
                events::TIME_SYNC_TIMEOUT,
                &TimeSyncWindow { timeout_ms },
            ));
        }

        let can_start = self.state.mode() == DeviceMode::Run
            && !self.store.is_active()
            && self.state.is_ready();
        if can_start {
            if let Some(start) = self.pending.take_start() {
                let PendingStart { session_id, lift } = start;
                let offsets = self.offsets;
                match self.store.start_session(
                    session_id.clone(),
                    lift.clone(),
                    offsets,
                    now_ms,
                ) {
                    Ok(()) => out.push(Event::new(
                        events::SESSION_STARTED,
                        &SessionStartedEvent { session_id, lift, auto: true },
                    )),
                    Err(e) => {
                        error!("deferred start of {} failed: {}", session_id, e.code())
                    }
                }
            }
        }
        out
    }
}
