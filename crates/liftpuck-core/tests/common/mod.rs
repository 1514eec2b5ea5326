#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use liftpuck_core::motion::{CalibrationStatus, Orientation, Sensor, SensorSample};
use liftpuck_core::storage::MemStorage;
use liftpuck_core::{Config, Device, InboundEvent, Inbox, Link, Parts, Platform, TransportId};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Recording link
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct WireState {
    pub up: bool,
    pub writes: Vec<Vec<u8>>,
}

/// A link whose writes the test can inspect after handing it to the device.
#[derive(Clone, Default)]
pub struct Wire(Rc<RefCell<WireState>>);

impl Wire {
    pub fn set_up(&self, up: bool) {
        self.0.borrow_mut().up = up;
    }

    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.0.borrow_mut().writes)
    }

    /// Everything written so far, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().writes.concat()
    }

    /// Drains writes and decodes those that are JSON objects.
    pub fn envelopes(&self) -> Vec<Value> {
        self.take()
            .iter()
            .filter_map(|w| serde_json::from_slice::<Value>(w.trim_ascii()).ok())
            .filter(Value::is_object)
            .collect()
    }
}

impl Link for Wire {
    type Error = ();

    fn is_connected(&self) -> bool {
        self.0.borrow().up
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), ()> {
        self.0.borrow_mut().writes.push(bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted sensor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ScriptedSensor(Rc<RefCell<SensorSample>>);

impl ScriptedSensor {
    /// Level, range valid, IMU not yet calibrated.
    pub fn warming_up() -> Self {
        Self(Rc::new(RefCell::new(SensorSample {
            orientation: Orientation::default(),
            calibration: CalibrationStatus::default(),
            raw_distance_mm: 500,
            range_valid: true,
        })))
    }

    pub fn set_calibrated(&self, calibrated: bool) {
        let q = if calibrated { 3 } else { 0 };
        self.0.borrow_mut().calibration =
            CalibrationStatus { system: q, gyro: q, accel: q, mag: q };
    }

    pub fn update(&self, f: impl FnOnce(&mut SensorSample)) {
        f(&mut self.0.borrow_mut());
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> SensorSample {
        *self.0.borrow()
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Storage = MemStorage;
    type Sensor = ScriptedSensor;
    type Wireless = Wire;
    type Wired = Wire;
    type Secondary = Wire;
}

pub struct Rig {
    pub device: Device<'static, TestPlatform>,
    pub inbox: &'static Inbox,
    pub sensor: ScriptedSensor,
    pub wireless: Wire,
    pub wired: Wire,
    pub secondary: Wire,
}

impl Rig {
    pub fn new() -> Self {
        let inbox: &'static Inbox = Box::leak(Box::new(Inbox::new()));
        let sensor = ScriptedSensor::warming_up();
        let (wireless, wired, secondary) = (Wire::default(), Wire::default(), Wire::default());
        let parts = Parts::<TestPlatform> {
            storage: MemStorage::new(),
            sensor: sensor.clone(),
            wireless: wireless.clone(),
            wired: wired.clone(),
            secondary: secondary.clone(),
        };
        let device = Device::new(Config::default(), parts, inbox, 0);
        Self { device, inbox, sensor, wireless, wired, secondary }
    }

    pub fn connect(&mut self, link: TransportId, now_ms: u64) {
        self.wire(link).set_up(true);
        self.inbox.post(InboundEvent::Connected(link));
        self.device.poll(now_ms);
    }

    pub fn disconnect(&mut self, link: TransportId, now_ms: u64) {
        self.wire(link).set_up(false);
        self.inbox.post(InboundEvent::Disconnected(link));
        self.device.poll(now_ms);
    }

    pub fn wire(&self, link: TransportId) -> &Wire {
        match link {
            TransportId::Wireless => &self.wireless,
            TransportId::Wired => &self.wired,
            TransportId::Secondary => &self.secondary,
        }
    }

    /// Posts a payload, runs one cycle and returns every envelope the cycle
    /// wrote to `from`.
    pub fn send(&mut self, from: TransportId, payload: &str, now_ms: u64) -> Vec<Value> {
        self.inbox.post(InboundEvent::Payload {
            from,
            data: payload.as_bytes().to_vec(),
        });
        self.device.poll(now_ms);
        self.wire(from).envelopes()
    }

    /// Like [`Rig::send`] but returns only the response.
    pub fn request(&mut self, from: TransportId, payload: &str, now_ms: u64) -> Value {
        self.send(from, payload, now_ms)
            .into_iter()
            .find(|e| e["kind"] == "resp")
            .expect("no response")
    }
}

pub fn named<'a>(envelopes: &'a [Value], name: &str) -> Vec<&'a Value> {
    envelopes
        .iter()
        .filter(|e| e["kind"] == "evt" && e["name"] == name)
        .collect()
}
