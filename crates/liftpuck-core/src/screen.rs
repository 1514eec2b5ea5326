use liftpuck_icd::{DeviceMode, Facing};

use crate::motion::{CalibrationStatus, Pose};

/// What the status display should show this cycle. Rendering is up to the
/// display driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    Dump,
    Idle,
    CalibrationOrWarmup {
        calibration: CalibrationStatus,
        range_valid: bool,
    },
    OrientationWarning(Facing),
    Tracking(Pose),
}

pub fn screen_for(
    mode: DeviceMode,
    calibration: CalibrationStatus,
    range_valid: bool,
    facing: Facing,
    pose: Pose,
) -> Screen {
    match mode {
        DeviceMode::Dump => Screen::Dump,
        DeviceMode::Idle => Screen::Idle,
        DeviceMode::Calibrate => {
            Screen::CalibrationOrWarmup { calibration, range_valid }
        }
        DeviceMode::Run if !range_valid => {
            Screen::CalibrationOrWarmup { calibration, range_valid }
        }
        DeviceMode::Run if !facing.is_usable() => {
            Screen::OrientationWarning(facing)
        }
        DeviceMode::Run => Screen::Tracking(pose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_screens_by_priority() {
        let cal = CalibrationStatus { system: 3, gyro: 3, accel: 3, mag: 3 };
        let pose = Pose { rel_dist_mm: 12, ..Default::default() };
        assert!(matches!(
            screen_for(DeviceMode::Run, cal, false, Facing::Left, pose),
            Screen::CalibrationOrWarmup { range_valid: false, .. }
        ));
        assert_eq!(
            screen_for(DeviceMode::Run, cal, true, Facing::Left, pose),
            Screen::OrientationWarning(Facing::Left)
        );
        assert_eq!(
            screen_for(DeviceMode::Run, cal, true, Facing::Down, pose),
            Screen::Tracking(pose)
        );
        assert_eq!(
            screen_for(DeviceMode::Idle, cal, true, Facing::Up, pose),
            Screen::Idle
        );
    }
}
