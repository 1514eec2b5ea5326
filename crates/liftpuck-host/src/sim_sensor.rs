use std::time::{Duration, Instant};

use liftpuck_core::motion::{CalibrationStatus, Orientation, Sensor, SensorSample};

/// Synthetic puck on a barbell: the IMU calibrates over `warmup`, then the
/// bar moves through slow reps between `floor_mm` and `floor_mm + rom_mm`.
#[derive(Debug, Clone)]
pub struct SimSensor {
    started: Instant,
    warmup: Duration,
    rep: Duration,
    floor_mm: i32,
    rom_mm: i32,
}

impl SimSensor {
    pub fn new(warmup: Duration) -> Self {
        Self {
            started: Instant::now(),
            warmup,
            rep: Duration::from_secs(3),
            floor_mm: 300,
            rom_mm: 450,
        }
    }

    fn calibration(&self, elapsed: Duration) -> CalibrationStatus {
        let step = self.warmup.as_millis().max(1) / 3;
        let q = (elapsed.as_millis() / step.max(1)).min(3) as u8;
        CalibrationStatus { system: q, gyro: 3, accel: q, mag: q.saturating_sub(1) }
    }
}

impl Sensor for SimSensor {
    fn read(&mut self) -> SensorSample {
        let elapsed = self.started.elapsed();
        let phase = elapsed.as_secs_f32() / self.rep.as_secs_f32() * std::f32::consts::TAU;
        let lift = (1.0 - phase.cos()) / 2.0;
        SensorSample {
            orientation: Orientation {
                yaw: 2.0 * phase.sin(),
                roll: 1.5 * phase.sin(),
                pitch: 80.0 + 3.0 * phase.cos(),
            },
            calibration: self.calibration(elapsed),
            raw_distance_mm: self.floor_mm + (lift * self.rom_mm as f32) as i32,
            range_valid: elapsed >= self.warmup / 2,
        }
    }
}
