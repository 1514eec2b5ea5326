//! The control loop.
//!
//! [`Device::poll`] runs one cycle: pending operations, queued transport
//! traffic, one stream chunk, then sensing. Transport contexts only ever
//! post into the [`Inbox`]; all state lives here and is touched from the
//! loop alone.
use alloc::string::String;
use alloc::vec::Vec;

use liftpuck_icd::{
    events, CalibrationEvent, Code, DeviceMode, Envelope, Facing,
    FileErrorEvent, OrientationEvent, SecondaryRequiredEvent, TimeSyncWindow,
};

use crate::config::Config;
use crate::console;
use crate::context::{AppContext, LinkStatus};
use crate::motion::{facing, readiness_of, Offsets, Sensor};
use crate::protocol::{dispatch, EdgeNotifier, Envelopes, Event};
use crate::screen::{screen_for, Screen};
use crate::storage::{BlockStorage, RowSample};
use crate::stream::{FileStreamer, StreamStatus};
use crate::transport::{InboundEvent, Inbox, Link, TransportId, INBOX_DEPTH};

/// Hardware the loop drives. One implementation per board, plus the host
/// simulator.
pub trait Platform {
    type Storage: BlockStorage;
    type Sensor: Sensor;
    type Wireless: Link;
    type Wired: Link;
    type Secondary: Link;
}

pub struct Parts<P: Platform> {
    pub storage: P::Storage,
    pub sensor: P::Sensor,
    pub wireless: P::Wireless,
    pub wired: P::Wired,
    pub secondary: P::Secondary,
}

pub struct Device<'a, P: Platform> {
    ctx: AppContext<P::Storage>,
    sensor: P::Sensor,
    wireless: P::Wireless,
    wired: P::Wired,
    secondary: P::Secondary,
    inbox: &'a Inbox,
    streamer: FileStreamer,
    envelopes: Envelopes,
    calibration: EdgeNotifier<bool>,
    orientation: EdgeNotifier<Facing>,
    screen: Screen,
}

impl<'a, P: Platform> Device<'a, P> {
    pub fn new(config: Config, parts: Parts<P>, inbox: &'a Inbox, now_ms: u64) -> Self {
        info!("{} {} up", config.model.as_str(), config.fw_version.as_str());
        Self {
            ctx: AppContext::new(config, parts.storage, now_ms),
            sensor: parts.sensor,
            wireless: parts.wireless,
            wired: parts.wired,
            secondary: parts.secondary,
            inbox,
            streamer: FileStreamer::new(),
            envelopes: Envelopes::new(),
            calibration: EdgeNotifier::new(Some(false)),
            orientation: EdgeNotifier::new(None),
            screen: Screen::Idle,
        }
    }

    pub fn context(&self) -> &AppContext<P::Storage> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AppContext<P::Storage> {
        &mut self.ctx
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn is_streaming(&self) -> bool {
        self.streamer.is_active()
    }

    pub fn sensor_mut(&mut self) -> &mut P::Sensor {
        &mut self.sensor
    }

    pub fn wireless_mut(&mut self) -> &mut P::Wireless {
        &mut self.wireless
    }

    pub fn wired_mut(&mut self) -> &mut P::Wired {
        &mut self.wired
    }

    pub fn secondary_mut(&mut self) -> &mut P::Secondary {
        &mut self.secondary
    }

    pub fn tare(&mut self) -> Option<Offsets> {
        self.ctx.tare()
    }

    pub fn links(&self) -> LinkStatus {
        LinkStatus {
            wireless: self.wireless.is_connected(),
            wired: self.wired.is_connected(),
            secondary: self.secondary.is_connected(),
            streaming: self.streamer.is_active(),
        }
    }

    /// Runs one control cycle and returns the screen to show.
    pub fn poll(&mut self, now_ms: u64) -> Screen {
        for event in self.ctx.resolve_pending(now_ms) {
            self.emit(now_ms, event);
        }

        // Bounded so a chatty producer cannot starve sensing.
        for _ in 0..INBOX_DEPTH {
            let Some(inbound) = self.inbox.try_receive() else {
                break;
            };
            self.on_inbound(inbound, now_ms);
        }

        let status = self.streamer.pump(self.ctx.store.storage(), &mut self.secondary);
        self.on_stream_status(status, now_ms);

        // Rows buffered before logging paused still reach the medium.
        if let Err(e) = self.ctx.store.flush_if_due(now_ms) {
            warn!("session flush failed: {}", e.code());
        }

        if self.ctx.state.mode() == DeviceMode::Dump {
            self.screen = Screen::Dump;
            return self.screen;
        }
        self.sense(now_ms);
        self.screen
    }

    fn sense(&mut self, now_ms: u64) {
        let sample = self.sensor.read();
        let readiness = readiness_of(&sample, self.ctx.config.calibration_quality_min);
        self.ctx.state.set_readiness(readiness);

        let imu = readiness.imu_calibrated;
        if self.calibration.is_change(imu) {
            let name = if imu {
                events::CALIBRATION_SUCCEEDED
            } else {
                events::CALIBRATION_LOST
            };
            let body = CalibrationEvent {
                imu,
                range: readiness.range_valid,
                ready: readiness.is_ready(),
            };
            if self.emit(now_ms, Event::new(name, &body)) {
                self.calibration.record(imu);
            }
        }

        self.ctx.state.apply_guard(self.ctx.config.guard_target.mode());

        let pose = self.sensor.compute_pose(&sample, &self.ctx.offsets);
        let facing = facing(&pose, self.ctx.config.facing_threshold_deg);
        if self.orientation.is_change(facing) {
            let body = OrientationEvent { facing, ok: facing.is_usable() };
            if self.emit(now_ms, Event::new(events::ORIENTATION_STATUS, &body)) {
                self.orientation.record(facing);
            }
        }

        let ctx = &mut self.ctx;
        if ctx.state.mode() == DeviceMode::Run && ctx.store.is_active() && ctx.state.is_ready() {
            let row = RowSample {
                timestamp_ms: ctx.clock.timestamp_ms(now_ms),
                raw_distance_mm: sample.raw_distance_mm,
                rel_dist_mm: pose.rel_dist_mm,
                roll: pose.roll,
                pitch: pose.pitch,
                yaw: pose.yaw,
            };
            if let Err(e) = ctx.store.log_sample(&row, now_ms) {
                warn!("row not logged: {}", e.code());
            }
        }

        ctx.motion.update(&pose, now_ms, &mut ctx.state, &ctx.config);

        self.screen = screen_for(
            ctx.state.mode(),
            sample.calibration,
            sample.range_valid,
            facing,
            pose,
        );
        ctx.last_sample = Some(sample);
        ctx.last_pose = Some(pose);
    }

    fn on_inbound(&mut self, inbound: InboundEvent, now_ms: u64) {
        match inbound {
            InboundEvent::Connected(TransportId::Wireless) => {
                info!("wireless peer connected");
                let timeout_ms = self.ctx.config.time_sync_timeout_ms;
                self.ctx.pending.arm_time_sync(now_ms);
                self.calibration.reset();
                self.orientation.reset();
                self.emit(
                    now_ms,
                    Event::new(events::TIME_SYNC_REQUEST, &TimeSyncWindow { timeout_ms }),
                );
                if !self.secondary.is_connected() {
                    let body = SecondaryRequiredEvent { status: String::from("not_connected") };
                    self.emit(now_ms, Event::new(events::SECONDARY_REQUIRED, &body));
                }
            }
            InboundEvent::Disconnected(TransportId::Wireless) => {
                info!("wireless peer disconnected");
                self.ctx.pending.clear_time_sync();
            }
            InboundEvent::Disconnected(TransportId::Secondary) => {
                info!("secondary link down");
                if self.streamer.is_active() {
                    let status = self.streamer.abort(Code::StreamAborted);
                    self.on_stream_status(status, now_ms);
                }
            }
            InboundEvent::Connected(t) | InboundEvent::Disconnected(t) => {
                debug!("{} link state changed", t);
            }
            InboundEvent::Payload { from, data } => self.on_payload(from, &data, now_ms),
        }
    }

    fn on_payload(&mut self, from: TransportId, data: &[u8], now_ms: u64) {
        if from == TransportId::Wireless && !self.wireless.is_connected() {
            debug!("wireless payload without a peer dropped");
            return;
        }
        let payload = data.trim_ascii();
        if payload.is_empty() {
            return;
        }

        match from {
            TransportId::Secondary => {
                debug!("ignoring {} bytes inbound on secondary", payload.len());
            }
            TransportId::Wired if payload[0] != b'{' => {
                let Ok(keys) = core::str::from_utf8(payload) else {
                    return;
                };
                for key in keys.chars() {
                    for line in console::run(&mut self.ctx, key, now_ms) {
                        let mut bytes = line.into_bytes();
                        bytes.push(b'\n');
                        self.send_raw(TransportId::Wired, &bytes);
                    }
                }
            }
            _ => self.on_command(from, payload, now_ms),
        }
    }

    fn on_command(&mut self, from: TransportId, payload: &[u8], now_ms: u64) {
        let links = self.links();
        let dispatched = dispatch(&mut self.ctx, payload, links, now_ms);
        let outcome = dispatched.outcome;

        let ts = self.ctx.clock.timestamp_ms(now_ms);
        let response = self.envelopes.response(
            ts,
            &dispatched.name,
            dispatched.reference,
            outcome.reply,
        );
        self.send_envelope(from, &response);

        for event in outcome.events {
            self.emit(now_ms, event);
        }

        if let Some(request) = outcome.stream {
            let session_id = request.session_id.clone();
            if let Err(e) = self.streamer.start(&mut self.secondary, request) {
                warn!("stream of {} not started: {}", session_id, e);
                let body = FileErrorEvent { session_id, code: Code::StreamFailed, sent: None };
                self.emit(now_ms, Event::new(events::SESSION_FILE_ERROR, &body));
            }
        }
    }

    fn on_stream_status(&mut self, status: StreamStatus, now_ms: u64) {
        if let StreamStatus::Aborted { session_id, sent, code } = status {
            let body = FileErrorEvent { session_id, code, sent: Some(sent) };
            self.emit(now_ms, Event::new(events::SESSION_FILE_ERROR, &body));
        }
    }

    /// Routes an event to the phone: wireless when a peer is connected,
    /// else the wired line. Returns whether it went out.
    fn emit(&mut self, now_ms: u64, event: Event) -> bool {
        let name = event.name;
        let target = if self.wireless.is_connected() {
            TransportId::Wireless
        } else if self.wired.is_connected() {
            TransportId::Wired
        } else {
            trace!("event {} dropped, no peer", name);
            return false;
        };
        let ts = self.ctx.clock.timestamp_ms(now_ms);
        let envelope = self.envelopes.event(ts, event);
        self.send_envelope(target, &envelope)
    }

    fn send_envelope(&mut self, to: TransportId, envelope: &Envelope) -> bool {
        let mut bytes: Vec<u8> = match serde_json::to_vec(envelope) {
            Ok(bytes) => bytes,
            Err(_) => {
                error!("envelope {} not encodable", envelope.name.as_str());
                return false;
            }
        };
        if to.is_line_framed() {
            bytes.push(b'\n');
        }
        self.send_raw(to, &bytes)
    }

    fn send_raw(&mut self, to: TransportId, bytes: &[u8]) -> bool {
        let sent = match to {
            TransportId::Wireless => send_if_connected(&mut self.wireless, bytes),
            TransportId::Wired => send_if_connected(&mut self.wired, bytes),
            TransportId::Secondary => send_if_connected(&mut self.secondary, bytes),
        };
        if !sent {
            debug!("{} bytes not delivered on {}", bytes.len(), to);
        }
        sent
    }
}

fn send_if_connected<L: Link>(link: &mut L, bytes: &[u8]) -> bool {
    link.is_connected() && link.send(bytes).is_ok()
}
