//! Link contract and the inbound queue that hands transport traffic to the
//! control loop.
use alloc::vec::Vec;
use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use portable_atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportId {
    /// Low-energy command channel to the phone.
    Wireless,
    /// Serial command line.
    Wired,
    /// Serial-style channel carrying file streams.
    Secondary,
}

impl TransportId {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wireless => "wireless",
            Self::Wired => "wired",
            Self::Secondary => "secondary",
        }
    }

    /// Wired and secondary links carry newline-terminated JSON; the wireless
    /// link delivers one payload per write.
    pub const fn is_line_framed(&self) -> bool {
        !matches!(self, Self::Wireless)
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound half of a transport.
pub trait Link {
    type Error: fmt::Debug;

    fn is_connected(&self) -> bool;

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Connected(TransportId),
    Disconnected(TransportId),
    /// One complete application payload: a line on framed links, a write on
    /// the wireless link.
    Payload { from: TransportId, data: Vec<u8> },
}

impl InboundEvent {
    pub fn transport(&self) -> TransportId {
        match self {
            Self::Connected(t) | Self::Disconnected(t) => *t,
            Self::Payload { from, .. } => *from,
        }
    }
}

pub const INBOX_DEPTH: usize = 8;

/// Bounded queue between transport contexts and the control loop.
///
/// Producers call [`Inbox::post`] from any context; only the loop receives.
pub struct Inbox {
    channel: Channel<CriticalSectionRawMutex, InboundEvent, INBOX_DEPTH>,
    dropped: AtomicU32,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub const fn new() -> Self {
        Self { channel: Channel::new(), dropped: AtomicU32::new(0) }
    }

    /// Never blocks. A full queue drops the event and returns `false`.
    pub fn post(&self, event: InboundEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "inbox full, dropped {} event ({} total)",
                    event.transport(),
                    total
                );
                false
            }
        }
    }

    pub fn try_receive(&self) -> Option<InboundEvent> {
        self.channel.try_receive().ok()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}
