#![cfg_attr(not(any(test, feature = "use-std")), no_std)]
//! Control core of the lift-tracking puck.
//!
//! Everything here is hardware-agnostic: the sensor, the storage medium and
//! the three links are reached through the traits bundled by
//! [`device::Platform`], and a single [`device::Device`] owns all mutable
//! state.
extern crate alloc;

#[macro_use]
mod fmt;

pub mod clock;
pub mod config;
pub mod console;
pub mod context;
pub mod device;
pub mod motion;
pub mod protocol;
pub mod screen;
pub mod state;
pub mod storage;
pub mod stream;
pub mod transport;

pub use config::Config;
pub use context::{AppContext, LinkStatus};
pub use device::{Device, Parts, Platform};
pub use screen::Screen;
pub use transport::{InboundEvent, Inbox, Link, TransportId};

pub mod prelude {
    pub use crate::device::{Device, Parts, Platform};
    pub use crate::motion::{
        CalibrationStatus, Orientation, Offsets, Pose, Sensor, SensorSample,
    };
    pub use crate::storage::{BlockStorage, DirEntry, Metadata};
    pub use crate::transport::{InboundEvent, Inbox, Link, TransportId};
    pub use crate::Config;
}
