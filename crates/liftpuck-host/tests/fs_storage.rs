use std::ops::ControlFlow;

use liftpuck_core::motion::Offsets;
use liftpuck_core::storage::{BlockStorage, RowSample, SessionStore};
use liftpuck_host::FsStorage;
use liftpuck_icd::{Lift, SessionId};
use tempfile::TempDir;

#[test]
fn file_contract_on_disk() {
    let tmp = TempDir::new().unwrap();
    let mut fs = FsStorage::new(tmp.path());

    fs.create_dir_all("/sessions").unwrap();
    assert!(fs.exists("/sessions").unwrap());
    assert!(!fs.exists("/sessions/a.txt").unwrap());

    fs.append("/sessions/a.txt", b"hello ").unwrap();
    fs.append("/sessions/a.txt", b"world").unwrap();
    fs.sync("/sessions/a.txt").unwrap();

    let mut buf = [0u8; 8];
    assert_eq!(fs.read_at("/sessions/a.txt", 6, &mut buf).unwrap(), 5);
    assert_eq!(&buf[..5], b"world");
    assert_eq!(fs.read_at("/sessions/a.txt", 11, &mut buf).unwrap(), 0);

    let meta = fs.metadata("/sessions/a.txt").unwrap();
    assert_eq!(meta.size, 11);
    assert!(!meta.is_dir);
    assert!(meta.modified_ms.is_some());

    fs.rename("/sessions/a.txt", "/sessions/b.txt").unwrap();
    let names: Vec<_> = fs.list("/sessions").unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["b.txt"]);

    fs.create("/sessions/b.txt").unwrap();
    assert_eq!(fs.metadata("/sessions/b.txt").unwrap().size, 0);
    fs.remove("/sessions/b.txt").unwrap();
    assert!(fs.read_at("/sessions/b.txt", 0, &mut buf).is_err());
}

#[test]
fn session_round_trip_on_disk() {
    let tmp = TempDir::new().unwrap();
    let mut store = SessionStore::new(FsStorage::new(tmp.path()), 1_000);
    let id = SessionId::try_from("D1").unwrap();
    store.start_session(id, Lift::try_from("deadlift").unwrap(), Offsets::default(), 0).unwrap();
    for t in 0..5 {
        let row = RowSample { timestamp_ms: t, raw_distance_mm: 400, rel_dist_mm: 10, roll: 0.0, pitch: 0.0, yaw: 0.0 };
        store.log_sample(&row, t as u64).unwrap();
    }
    let entry = store.end_session(5).unwrap();
    assert_eq!(entry.name, "D1.csv");

    let csv = std::fs::read_to_string(tmp.path().join("sessions/D1.csv")).unwrap();
    assert!(csv.contains("# exercise=deadlift"));
    assert_eq!(csv.lines().filter(|l| !l.starts_with('#')).count(), 6);

    let mut names = Vec::new();
    store
        .read_index(0, 15, |e, _| {
            names.push(e.name.clone());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(names, ["D1.csv"]);

    std::fs::write(tmp.path().join("sessions/index.ndjson"), "junk\n").unwrap();
    assert_eq!(store.rebuild_index().unwrap(), 1);
    assert_eq!(store.find_session("D1").unwrap().as_deref(), Some("D1.csv"));
    assert_eq!(store.clear_sessions().unwrap(), 1);
    assert!(!tmp.path().join("sessions/index.ndjson").exists());
}
