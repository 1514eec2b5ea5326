//! Single-key service console on the wired line.
//!
//! | key | action |
//! |-----|--------|
//! | `m` | cycle RUN -> DUMP -> IDLE -> RUN |
//! | `r` | force RUN |
//! | `s` | start a session with a generated id |
//! | `e` | end the active session |
//! | `i` | dump the index and the session directory |
//! | `d` | sensor and readiness diagnostic |
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use liftpuck_icd::{DeviceMode, Lift, SESSIONS_DIR, SESSION_INDEX_PATH};

use crate::context::AppContext;
use crate::storage::{BlockStorage, Lines, SLUG_PLACEHOLDER};

/// Runs one console key and returns the text lines to print.
pub fn run<S: BlockStorage>(
    ctx: &mut AppContext<S>,
    key: char,
    now_ms: u64,
) -> Vec<String> {
    match key {
        'm' => {
            let next = ctx.state.mode().cycled();
            ctx.state.set_mode(next);
            ctx.motion.touch(now_ms);
            vec![format!("Device mode changed to: {}", next)]
        }
        'r' => {
            ctx.state.set_mode(DeviceMode::Run);
            ctx.motion.touch(now_ms);
            vec![String::from("Forced RUN")]
        }
        's' => vec![start(ctx, now_ms)],
        'e' => {
            if !ctx.store.is_active() {
                return vec![String::from("No active session to end.")];
            }
            let wall_ms = ctx.wall_ms(now_ms);
            match ctx.store.end_session(wall_ms) {
                Ok(entry) => vec![format!("Session ended: {}", entry.name)],
                Err(e) => vec![format!("Session end failed: {}", e)],
            }
        }
        'i' => index_dump(ctx.store.storage()),
        'd' => diagnostic(ctx),
        _ => Vec::new(),
    }
}

fn start<S: BlockStorage>(ctx: &mut AppContext<S>, now_ms: u64) -> String {
    if ctx.store.is_active() {
        return String::from("Session already active, cannot start new one.");
    }
    if ctx.state.mode() != DeviceMode::Run {
        return String::from("Device not in RUN mode, cannot start session.");
    }
    let Ok(lift) = Lift::try_from(SLUG_PLACEHOLDER) else {
        return String::from("Session start failed: bad lift");
    };
    let id = match ctx.new_session_id(&lift, now_ms) {
        Ok(id) => id,
        Err(e) => return format!("Session start failed: {}", e),
    };
    let offsets = ctx.offsets;
    match ctx.store.start_session(id.clone(), lift, offsets, now_ms) {
        Ok(()) => format!("Session started: {}", id),
        Err(e) => format!("Session start failed: {}", e),
    }
}

fn index_dump<S: BlockStorage>(storage: &S) -> Vec<String> {
    let mut out = vec![format!("--- {} ---", SESSION_INDEX_PATH)];
    match storage.exists(SESSION_INDEX_PATH) {
        Ok(true) => {
            let mut lines = Lines::new(storage, SESSION_INDEX_PATH);
            while let Ok(Some(line)) = lines.next_line() {
                let line = line.trim();
                if !line.is_empty() {
                    out.push(String::from(line));
                }
            }
        }
        _ => out.push(String::from("(missing)")),
    }

    out.push(format!("--- {} entries ---", SESSIONS_DIR));
    let is_dir = storage
        .metadata(SESSIONS_DIR)
        .map(|m| m.is_dir)
        .unwrap_or(false);
    match storage.list(SESSIONS_DIR) {
        Ok(entries) if is_dir => {
            for entry in entries {
                if entry.meta.is_dir {
                    out.push(format!("DIR  {}", entry.name));
                } else {
                    out.push(format!("FILE {}  {}", entry.name, entry.meta.size));
                }
            }
        }
        _ => out.push(String::from("(missing or not a dir)")),
    }
    out
}

fn diagnostic<S: BlockStorage>(ctx: &AppContext<S>) -> Vec<String> {
    let readiness = ctx.state.readiness();
    let Some(sample) = ctx.last_sample else {
        return vec![String::from("no sensor sample yet")];
    };
    let cal = sample.calibration;
    vec![
        format!("cal: s={} g={} a={} m={}", cal.system, cal.gyro, cal.accel, cal.mag),
        format!(
            "rangeValid={} dist={}",
            u8::from(readiness.range_valid),
            sample.raw_distance_mm
        ),
        format!("imuCalibrated={}", u8::from(readiness.imu_calibrated)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemStorage;

    fn ctx() -> AppContext<MemStorage> {
        AppContext::new(Config::default(), MemStorage::new(), 0)
    }

    #[test]
    fn mode_cycle_and_force_run() {
        let mut ctx = ctx();
        ctx.state.set_mode(DeviceMode::Run);
        assert_eq!(run(&mut ctx, 'm', 5), ["Device mode changed to: DUMP"]);
        assert_eq!(run(&mut ctx, 'm', 6), ["Device mode changed to: IDLE"]);
        assert_eq!(run(&mut ctx, 'r', 7), ["Forced RUN"]);
        assert_eq!(ctx.state.mode(), DeviceMode::Run);
        assert_eq!(ctx.motion.last_motion_ms(), 7);
        assert!(run(&mut ctx, 'x', 8).is_empty());
    }

    #[test]
    fn start_requires_run_then_index_lists_session() {
        let mut ctx = ctx();
        assert_eq!(
            run(&mut ctx, 's', 0),
            ["Device not in RUN mode, cannot start session."]
        );
        run(&mut ctx, 'r', 0);
        assert!(run(&mut ctx, 's', 1_000)[0].starts_with("Session started: "));
        assert!(ctx.store.is_active());
        assert!(run(&mut ctx, 'e', 2_000)[0].starts_with("Session ended: "));
        assert_eq!(run(&mut ctx, 'e', 2_001), ["No active session to end."]);

        let dump = run(&mut ctx, 'i', 3_000);
        assert_eq!(dump[0], "--- /sessions/index.ndjson ---");
        assert!(dump[1].contains(".csv"));
        assert_eq!(dump[2], "--- /sessions entries ---");
        assert!(dump.iter().any(|l| l.starts_with("FILE index.ndjson")));
    }

    #[test]
    fn index_dump_on_empty_card() {
        let mut ctx = ctx();
        assert_eq!(
            run(&mut ctx, 'i', 0),
            [
                "--- /sessions/index.ndjson ---",
                "(missing)",
                "--- /sessions entries ---",
                "(missing or not a dir)",
            ]
        );
    }
}
