//! Sensor contract, relative pose and the motion-driven mode rules.
use liftpuck_icd::{DeviceMode, Facing};

use crate::config::Config;
use crate::state::{DeviceState, Readiness};

/// Per-subsystem IMU calibration status, each on a 0..=3 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationStatus {
    pub system: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

impl CalibrationStatus {
    /// Single quality figure the readiness threshold is applied to.
    pub const fn quality(&self) -> u8 {
        self.system
    }
}

/// Absolute orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub yaw: f32,
    pub roll: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSample {
    pub orientation: Orientation,
    pub calibration: CalibrationStatus,
    pub raw_distance_mm: i32,
    pub range_valid: bool,
}

/// Tare offsets subtracted from every raw sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub distance_mm: i32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Offsets {
    pub fn from_sample(sample: &SensorSample) -> Self {
        Self {
            distance_mm: sample.raw_distance_mm,
            roll: sample.orientation.roll,
            pitch: sample.orientation.pitch,
            yaw: sample.orientation.yaw,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub rel_dist_mm: i32,
    pub roll: f32,
    pub pitch: f32,
    /// Always within (-180, 180].
    pub yaw: f32,
}

/// Orientation and distance acquisition.
pub trait Sensor {
    fn read(&mut self) -> SensorSample;

    fn compute_pose(&self, sample: &SensorSample, offsets: &Offsets) -> Pose {
        compute_pose(sample, offsets)
    }
}

pub fn compute_pose(sample: &SensorSample, offsets: &Offsets) -> Pose {
    Pose {
        rel_dist_mm: sample.raw_distance_mm - offsets.distance_mm,
        roll: sample.orientation.roll - offsets.roll,
        pitch: sample.orientation.pitch - offsets.pitch,
        yaw: normalize_yaw(sample.orientation.yaw - offsets.yaw),
    }
}

pub fn normalize_yaw(mut yaw: f32) -> f32 {
    if !yaw.is_finite() {
        return yaw;
    }
    while yaw > 180.0 {
        yaw -= 360.0;
    }
    while yaw <= -180.0 {
        yaw += 360.0;
    }
    yaw
}

fn abs(x: f32) -> f32 {
    if x < 0.0 {
        -x
    } else {
        x
    }
}

pub fn readiness_of(sample: &SensorSample, quality_min: u8) -> Readiness {
    Readiness {
        imu_calibrated: sample.calibration.quality() >= quality_min,
        range_valid: sample.range_valid,
    }
}

/// Coarse facing: whichever of pitch and roll dominates decides the axis.
pub fn facing(pose: &Pose, threshold_deg: f32) -> Facing {
    if abs(pose.pitch) >= abs(pose.roll) {
        if pose.pitch >= threshold_deg {
            Facing::Up
        } else {
            Facing::Down
        }
    } else if pose.roll >= threshold_deg {
        Facing::Right
    } else {
        Facing::Left
    }
}

/// Tracks the last significant pose and when it was seen.
#[derive(Debug)]
pub struct MotionTracker {
    snapshot: Pose,
    last_motion_ms: u64,
}

impl MotionTracker {
    pub fn new(now_ms: u64) -> Self {
        Self { snapshot: Pose::default(), last_motion_ms: now_ms }
    }

    /// Resets the idle timer without moving the snapshot.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_motion_ms = now_ms;
    }

    pub fn last_motion_ms(&self) -> u64 {
        self.last_motion_ms
    }

    /// Compared against the snapshot, not the previous cycle, so slow drift
    /// cannot sneak under the thresholds one step at a time.
    pub fn is_significant(&self, pose: &Pose, config: &Config) -> bool {
        let s = &self.snapshot;
        (pose.rel_dist_mm - s.rel_dist_mm).abs() > config.motion_distance_mm
            || abs(pose.roll - s.roll) > config.motion_angle_deg
            || abs(pose.pitch - s.pitch) > config.motion_angle_deg
            || abs(pose.yaw - s.yaw) > config.motion_angle_deg
    }

    /// Motion wake (IDLE -> RUN) then idle timeout (RUN -> IDLE).
    pub fn update(
        &mut self,
        pose: &Pose,
        now_ms: u64,
        state: &mut DeviceState,
        config: &Config,
    ) -> Option<DeviceMode> {
        let mut changed = None;
        if self.is_significant(pose, config) {
            trace!("motion at {}", now_ms);
            self.snapshot = *pose;
            self.last_motion_ms = now_ms;
            if state.mode() == DeviceMode::Idle && state.set_mode(DeviceMode::Run)
            {
                changed = Some(DeviceMode::Run);
            }
        }
        let still_for = now_ms.saturating_sub(self.last_motion_ms);
        if state.mode() == DeviceMode::Run
            && still_for > config.idle_timeout_ms
            && state.set_mode(DeviceMode::Idle)
        {
            info!("idle after {} ms without motion", still_for);
            changed = Some(DeviceMode::Idle);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(dist: i32, roll: f32, pitch: f32, yaw: f32) -> Pose {
        Pose { rel_dist_mm: dist, roll, pitch, yaw }
    }

    #[test]
    fn yaw_wraps_into_half_open_range() {
        assert_eq!(normalize_yaw(190.0), -170.0);
        assert_eq!(normalize_yaw(-190.0), 170.0);
        assert_eq!(normalize_yaw(180.0), 180.0);
        assert_eq!(normalize_yaw(-180.0), 180.0);
        assert_eq!(normalize_yaw(-179.5), -179.5);
        assert_eq!(normalize_yaw(0.0), 0.0);
        assert_eq!(normalize_yaw(540.0), 180.0);
    }

    #[test]
    fn pose_subtracts_offsets() {
        let sample = SensorSample {
            orientation: Orientation { yaw: 10.0, roll: 3.0, pitch: -2.0 },
            raw_distance_mm: 420,
            ..Default::default()
        };
        let offsets =
            Offsets { distance_mm: 400, roll: 1.0, pitch: 1.0, yaw: 200.0 };
        let p = compute_pose(&sample, &offsets);
        assert_eq!(p, pose(20, 2.0, -3.0, 170.0));
    }

    #[test]
    fn distance_threshold_is_strict() {
        let cfg = Config::default();
        let tracker = MotionTracker::new(0);
        assert!(!tracker.is_significant(&pose(15, 0.0, 0.0, 0.0), &cfg));
        assert!(tracker.is_significant(&pose(16, 0.0, 0.0, 0.0), &cfg));
        assert!(tracker.is_significant(&pose(-16, 0.0, 0.0, 0.0), &cfg));
        assert!(!tracker.is_significant(&pose(0, 5.0, -5.0, 5.0), &cfg));
        assert!(tracker.is_significant(&pose(0, 0.0, 5.5, 0.0), &cfg));
    }

    #[test]
    fn steps_are_measured_against_snapshot() {
        let cfg = Config::default();
        let mut state = DeviceState::new(DeviceMode::Idle);
        let mut tracker = MotionTracker::new(0);
        for (i, d) in [10, 20].into_iter().enumerate() {
            tracker.update(&pose(d, 0.0, 0.0, 0.0), i as u64, &mut state, &cfg);
        }
        assert_eq!(state.mode(), DeviceMode::Run);
        assert_eq!(tracker.last_motion_ms(), 1);
    }

    #[test]
    fn wake_and_idle_timeout() {
        let cfg = Config::default();
        let mut state = DeviceState::new(DeviceMode::Idle);
        let mut tracker = MotionTracker::new(0);
        let still = pose(0, 0.0, 0.0, 0.0);
        assert_eq!(tracker.update(&still, 10, &mut state, &cfg), None);
        assert_eq!(
            tracker.update(&pose(30, 0.0, 0.0, 0.0), 100, &mut state, &cfg),
            Some(DeviceMode::Run)
        );
        let held = pose(30, 0.0, 0.0, 0.0);
        assert_eq!(tracker.update(&held, 30_100, &mut state, &cfg), None);
        assert_eq!(
            tracker.update(&held, 30_101, &mut state, &cfg),
            Some(DeviceMode::Idle)
        );
    }

    #[test]
    fn idle_timeout_only_applies_in_run() {
        let cfg = Config::default();
        let mut state = DeviceState::new(DeviceMode::Calibrate);
        let mut tracker = MotionTracker::new(0);
        let still = Pose::default();
        assert_eq!(tracker.update(&still, 60_000, &mut state, &cfg), None);
        assert_eq!(state.mode(), DeviceMode::Calibrate);
    }

    #[test]
    fn facing_follows_dominant_axis() {
        assert_eq!(facing(&pose(0, 0.0, 70.0, 0.0), 60.0), Facing::Up);
        assert_eq!(facing(&pose(0, 0.0, -70.0, 0.0), 60.0), Facing::Down);
        assert_eq!(facing(&pose(0, 0.0, 0.0, 0.0), 60.0), Facing::Down);
        assert_eq!(facing(&pose(0, 80.0, 10.0, 0.0), 60.0), Facing::Right);
        assert_eq!(facing(&pose(0, -80.0, 10.0, 0.0), 60.0), Facing::Left);
        assert_eq!(facing(&pose(0, 30.0, 10.0, 0.0), 60.0), Facing::Left);
    }

    #[test]
    fn readiness_uses_quality_threshold() {
        let mut sample = SensorSample { range_valid: true, ..Default::default() };
        sample.calibration.system = 1;
        assert!(!readiness_of(&sample, 2).imu_calibrated);
        sample.calibration.system = 2;
        assert!(readiness_of(&sample, 2).is_ready());
    }
}
