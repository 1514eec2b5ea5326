use alloc::string::{String, ToString};
use serde::Serialize;
use serde_json::{Map, Value};

use liftpuck_icd::{
    body_of, Code, Envelope, Kind, DST_PHONE, PROTOCOL_VERSION, SRC_DEVICE,
};

pub type Body = Map<String, Value>;

/// Outcome of a command, before it is wrapped in an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub code: Code,
    pub msg: Option<String>,
    pub body: Body,
}

impl Reply {
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self { code: Code::Ok, msg: None, body: body_of(body) }
    }

    pub fn err(code: Code, msg: &str) -> Self {
        Self { code, msg: Some(String::from(msg)), body: Body::new() }
    }

    pub fn with_msg(mut self, msg: &str) -> Self {
        self.msg = Some(String::from(msg));
        self
    }

    pub fn with_body<T: Serialize>(mut self, body: &T) -> Self {
        self.body = body_of(body);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

/// An unsolicited notification waiting to be routed.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: &'static str,
    pub body: Body,
}

impl Event {
    pub fn new<T: Serialize>(name: &'static str, body: &T) -> Self {
        Self { name, body: body_of(body) }
    }
}

/// Stamps outgoing envelopes with a running id.
#[derive(Debug)]
pub struct Envelopes {
    next_id: u32,
}

impl Default for Envelopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelopes {
    pub const fn new() -> Self {
        Self { next_id: 1 }
    }

    fn envelope(&mut self, ts: i64, kind: Kind, name: &str) -> Envelope {
        let id = self.next_id.to_string();
        self.next_id = self.next_id.wrapping_add(1);
        Envelope {
            v: PROTOCOL_VERSION,
            id,
            ts,
            src: String::from(SRC_DEVICE),
            dst: String::from(DST_PHONE),
            kind,
            name: String::from(name),
            reference: None,
            ok: None,
            code: None,
            msg: None,
            body: Body::new(),
        }
    }

    pub fn response(
        &mut self,
        ts: i64,
        name: &str,
        reference: Option<String>,
        reply: Reply,
    ) -> Envelope {
        let mut env = self.envelope(ts, Kind::Resp, name);
        env.reference = reference;
        env.ok = Some(reply.is_ok());
        env.code = Some(reply.code);
        env.msg = reply.msg;
        env.body = reply.body;
        env
    }

    pub fn event(&mut self, ts: i64, event: Event) -> Envelope {
        let mut env = self.envelope(ts, Kind::Evt, event.name);
        env.body = event.body;
        env
    }
}
