//! Runs the puck core on a desktop: sessions land in a directory, the phone
//! and the stream receiver connect over TCP, and the wired console is this
//! process's stdin/stdout.
pub mod fs_storage;
pub mod links;
pub mod sim_sensor;

pub use liftpuck_core as core;
pub use liftpuck_icd as icd;

use liftpuck_core::Platform;

pub use fs_storage::FsStorage;
pub use links::ChannelLink;
pub use sim_sensor::SimSensor;

pub struct HostPlatform;

impl Platform for HostPlatform {
    type Storage = FsStorage;
    type Sensor = SimSensor;
    type Wireless = ChannelLink;
    type Wired = ChannelLink;
    type Secondary = ChannelLink;
}

/// Reads an optional JSON config file; missing fields keep their defaults.
pub fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<liftpuck_core::Config> {
    let Some(path) = path else {
        return Ok(liftpuck_core::Config::default());
    };
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
