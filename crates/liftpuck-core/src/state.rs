use liftpuck_icd::DeviceMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub imu_calibrated: bool,
    pub range_valid: bool,
}

impl Readiness {
    pub const fn is_ready(&self) -> bool {
        self.imu_calibrated && self.range_valid
    }
}

/// Device mode plus the readiness flags derived from the latest sample.
///
/// Mode is only ever changed through [`DeviceState::set_mode`].
#[derive(Debug, Default)]
pub struct DeviceState {
    mode: DeviceMode,
    readiness: Readiness,
}

impl DeviceState {
    pub const fn new(mode: DeviceMode) -> Self {
        Self {
            mode,
            readiness: Readiness { imu_calibrated: false, range_valid: false },
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Returns whether the mode actually changed.
    pub fn set_mode(&mut self, mode: DeviceMode) -> bool {
        if self.mode == mode {
            return false;
        }
        info!("mode {} -> {}", self.mode, mode);
        self.mode = mode;
        true
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn set_readiness(&mut self, readiness: Readiness) {
        self.readiness = readiness;
    }

    /// Calibration guard, evaluated before any motion rule.
    ///
    /// RUN without a calibrated IMU falls back to `lost_target`; CALIBRATE
    /// returns to RUN once both sensors are usable.
    pub fn apply_guard(&mut self, lost_target: DeviceMode) -> Option<DeviceMode> {
        let next = match self.mode {
            DeviceMode::Run if !self.readiness.imu_calibrated => lost_target,
            DeviceMode::Calibrate if self.readiness.is_ready() => DeviceMode::Run,
            _ => return None,
        };
        self.set_mode(next).then_some(next)
    }
}
