use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceMode {
    Run,
    #[default]
    Idle,
    Dump,
    Calibrate,
}

impl DeviceMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "RUN",
            Self::Idle => "IDLE",
            Self::Dump => "DUMP",
            Self::Calibrate => "CALIBRATE",
        }
    }

    /// Order used by the single-key console toggle: RUN, DUMP, IDLE, RUN...
    pub const fn cycled(&self) -> Self {
        match self {
            Self::Run => Self::Dump,
            Self::Dump => Self::Idle,
            Self::Idle => Self::Run,
            Self::Calibrate => Self::Dump,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownMode;

impl FromStr for DeviceMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Run, Self::Idle, Self::Dump, Self::Calibrate]
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownMode)
    }
}

/// Coarse direction the puck's face points, relative to the tare pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "UPPERCASE")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Only face-up and face-down mounts give usable bar-path readings.
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive() {
        assert_eq!("run".parse::<DeviceMode>(), Ok(DeviceMode::Run));
        assert_eq!("Calibrate".parse::<DeviceMode>(), Ok(DeviceMode::Calibrate));
        assert_eq!("BOGUS".parse::<DeviceMode>(), Err(UnknownMode));
        assert_eq!("".parse::<DeviceMode>(), Err(UnknownMode));
    }

    #[test]
    fn console_cycle_visits_three_modes() {
        let mut mode = DeviceMode::Run;
        mode = mode.cycled();
        assert_eq!(mode, DeviceMode::Dump);
        mode = mode.cycled();
        assert_eq!(mode, DeviceMode::Idle);
        mode = mode.cycled();
        assert_eq!(mode, DeviceMode::Run);
    }
}
