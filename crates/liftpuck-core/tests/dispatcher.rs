use liftpuck_core::protocol::{dispatch, Dispatched};
use liftpuck_core::state::Readiness;
use liftpuck_core::storage::MemStorage;
use liftpuck_core::{AppContext, Config, LinkStatus};
use liftpuck_icd::{Code, DeviceMode, MAX_PAYLOAD_LEN};
use serde_json::Value;

fn ctx() -> AppContext<MemStorage> {
    AppContext::new(Config::default(), MemStorage::new(), 0)
}

fn ready(ctx: &mut AppContext<MemStorage>) {
    ctx.state.set_readiness(Readiness { imu_calibrated: true, range_valid: true });
}

fn run(ctx: &mut AppContext<MemStorage>, payload: &str) -> Dispatched {
    dispatch(ctx, payload.as_bytes(), LinkStatus::default(), 1_000)
}

fn body(d: &Dispatched) -> Value {
    Value::Object(d.outcome.reply.body.clone())
}

fn index_with(lines: &[&str]) -> AppContext<MemStorage> {
    let mut ctx = ctx();
    let mut text = lines.join("\n");
    text.push('\n');
    ctx.store.storage_mut().insert("/sessions/index.ndjson", text.as_bytes());
    ctx
}

fn entry(n: usize) -> String {
    format!(r#"{{"name":"S{n}.csv","size":{n},"mtime":{n}}}"#)
}

#[test]
fn bogus_mode_is_rejected_without_change() {
    let mut ctx = ctx();
    ctx.state.set_mode(DeviceMode::Run);
    let d = run(&mut ctx, r#"{"id":"m1","name":"mode.set","body":{"mode":"BOGUS"}}"#);
    assert_eq!(d.outcome.reply.code, Code::BadArgs);
    assert_eq!(d.reference.as_deref(), Some("m1"));
    assert_eq!(ctx.state.mode(), DeviceMode::Run);

    let d = run(&mut ctx, r#"{"name":"mode.set","body":{}}"#);
    assert_eq!(d.outcome.reply.code, Code::BadArgs);

    let d = run(&mut ctx, r#"{"name":"MODE.SET","body":{"mode":"idle"}}"#);
    assert!(d.outcome.reply.is_ok());
    assert_eq!(ctx.state.mode(), DeviceMode::Idle);
}

#[test]
fn unknown_command_echoes_ref() {
    let mut ctx = ctx();
    let d = run(&mut ctx, r#"{"id":"42","name":"reboot"}"#);
    assert_eq!(d.outcome.reply.code, Code::Unsupported);
    assert_eq!(d.name, "reboot");
    assert_eq!(d.reference.as_deref(), Some("42"));
}

#[test]
fn oversized_and_malformed_payloads() {
    let mut ctx = ctx();
    let big = format!(r#"{{"name":"ping","pad":"{}"}}"#, "x".repeat(MAX_PAYLOAD_LEN));
    let d = run(&mut ctx, &big);
    assert_eq!(d.outcome.reply.code, Code::PayloadTooLarge);
    assert_eq!(d.name, "unknown");

    assert_eq!(run(&mut ctx, "not json").outcome.reply.code, Code::BadJson);
    assert_eq!(run(&mut ctx, r#"{"id":"x"}"#).outcome.reply.code, Code::MissingName);
}

#[test]
fn start_when_ready_and_again_while_active() {
    let mut ctx = ctx();
    ready(&mut ctx);
    let d = run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"A","exercise":"Bench Press"}}"#);
    assert!(d.outcome.reply.is_ok());
    assert_eq!(body(&d)["lift"], "Bench Press");
    assert_eq!(body(&d)["mode"], "RUN");
    assert!(body(&d).get("pending").is_none());
    assert!(ctx.store.is_active());

    let d = run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"B"}}"#);
    assert_eq!(d.outcome.reply.code, Code::AlreadyActive);
    assert_eq!(ctx.store.active().unwrap().id.as_str(), "A");

    let d = run(&mut ctx, r#"{"name":"sessions.clear"}"#);
    assert_eq!(d.outcome.reply.code, Code::SessionActive);
}

#[test]
fn generated_id_uses_lift_slug() {
    let mut ctx = ctx();
    ready(&mut ctx);
    let d = run(&mut ctx, r#"{"name":"session.start","body":{"lift":"Back Squat!!"}}"#);
    let id = body(&d)["sessionId"].as_str().unwrap().to_owned();
    assert!(id.ends_with("-back-squat-PUCK"), "{id}");
}

#[test]
fn invalid_ids_are_bad_args() {
    let mut ctx = ctx();
    ready(&mut ctx);
    let d = run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"../etc"}}"#);
    assert_eq!(d.outcome.reply.code, Code::BadArgs);
    assert!(!ctx.store.is_active());
    assert_eq!(ctx.state.mode(), DeviceMode::Idle);
}

#[test]
fn end_cancels_pending_start() {
    let mut ctx = ctx();
    let d = run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"P"}}"#);
    assert_eq!(d.outcome.reply.code, Code::CalibrationRequired);
    assert_eq!(body(&d)["pending"], true);
    assert!(ctx.pending.start().is_some());

    let d = run(&mut ctx, r#"{"name":"session.end"}"#);
    assert!(d.outcome.reply.is_ok());
    assert_eq!(d.outcome.reply.msg.as_deref(), Some("Canceled pending session.start"));
    assert_eq!(body(&d)["canceled"], true);
    assert_eq!(body(&d)["sessionId"], "P");
    assert!(ctx.pending.start().is_none());

    let d = run(&mut ctx, r#"{"name":"session.end"}"#);
    assert_eq!(d.outcome.reply.code, Code::NotActive);
}

#[test]
fn pending_start_resolves_once_ready_in_run() {
    let mut ctx = ctx();
    run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"P"}}"#);
    assert!(ctx.resolve_pending(2_000).is_empty());

    ready(&mut ctx);
    ctx.state.set_mode(DeviceMode::Calibrate);
    assert!(ctx.resolve_pending(3_000).is_empty());

    ctx.state.set_mode(DeviceMode::Run);
    let events = ctx.resolve_pending(4_000);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "session.started");
    assert_eq!(events[0].body["auto"], true);
    assert!(ctx.store.is_active());
    assert!(ctx.resolve_pending(5_000).is_empty());
}

#[test]
fn list_clamps_cursor_and_limit() {
    let lines: Vec<String> = (0..20).map(entry).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let mut ctx = index_with(&refs);

    for args in [r#"{"limit":0}"#, r#"{"limit":100}"#, r#"{"cursor":-3,"limit":-1}"#] {
        let d = run(&mut ctx, &format!(r#"{{"name":"sessions.list","body":{args}}}"#));
        let b = body(&d);
        assert_eq!(b["items"].as_array().unwrap().len(), 15, "{args}");
        assert_eq!(b["items"][0]["name"], "S0.csv");
        assert_eq!(b["nextCursor"], 15);
        assert_eq!(b["hasMore"], true);
    }

    let d = run(&mut ctx, r#"{"name":"sessions.list","body":{"cursor":15,"limit":15}}"#);
    let b = body(&d);
    assert_eq!(b["items"].as_array().unwrap().len(), 5);
    assert_eq!(b["items"][4]["line"], 19);
    assert_eq!(b["nextCursor"], 20);
    assert_eq!(b["hasMore"], false);
}

#[test]
fn list_accepts_flat_legacy_args() {
    let mut ctx = index_with(&[&entry(1), &entry(2), &entry(3)]);
    let d = run(&mut ctx, r#"{"cmd":"sessions.list","id":7,"limit":2}"#);
    assert_eq!(d.reference.as_deref(), Some("7"));
    assert_eq!(body(&d)["items"].as_array().unwrap().len(), 2);
    assert_eq!(body(&d)["hasMore"], true);
}

#[test]
fn stream_preconditions() {
    let mut ctx = index_with(&[r#"{"name":"A.csv","size":3,"mtime":1}"#, r#"{"name":"G.csv","size":3,"mtime":1}"#]);
    ctx.store.storage_mut().insert("/sessions/A.csv", b"abc");
    let linked = LinkStatus { secondary: true, ..Default::default() };

    let d = dispatch(&mut ctx, br#"{"name":"session.stream","body":{}}"#, linked, 0);
    assert_eq!(d.outcome.reply.code, Code::BadArgs);

    let d = dispatch(&mut ctx, br#"{"name":"session.stream","body":{"sessionId":"A"}}"#, LinkStatus::default(), 0);
    assert_eq!(d.outcome.reply.code, Code::NoSecondaryLink);
    assert!(d.outcome.stream.is_none());

    let d = dispatch(&mut ctx, br#"{"name":"session.stream","body":{"sessionId":"Z"}}"#, linked, 0);
    assert_eq!(d.outcome.reply.code, Code::NotFound);

    // Indexed but gone from the card.
    let d = dispatch(&mut ctx, br#"{"name":"session.stream","body":{"sessionId":"G"}}"#, linked, 0);
    assert_eq!(d.outcome.reply.code, Code::NotFound);

    let d = dispatch(&mut ctx, br#"{"name":"session.stream","body":{"sessionId":"A"}}"#, linked, 0);
    assert!(d.outcome.reply.is_ok());
    assert_eq!(body(&d)["size"], 3);
    let request = d.outcome.stream.unwrap();
    assert_eq!(request.path, "/sessions/A.csv");
    assert_eq!(request.size, 3);
}

#[test]
fn time_sync_validates_and_reports_completion() {
    let mut ctx = ctx();
    let d = run(&mut ctx, r#"{"name":"time.sync","body":{"phoneEpochMs":0}}"#);
    assert_eq!(d.outcome.reply.code, Code::BadArgs);
    assert!(!ctx.clock.is_synced());

    // Unsolicited sync: anchored, no completion event.
    let d = run(&mut ctx, r#"{"name":"time.sync","body":{"phoneEpochMs":5000}}"#);
    assert!(d.outcome.reply.is_ok());
    assert!(d.outcome.events.is_empty());

    ctx.pending.arm_time_sync(1_000);
    let d = run(&mut ctx, r#"{"name":"time.sync","body":{"phoneEpochMs":9000}}"#);
    assert_eq!(d.outcome.events.len(), 1);
    assert_eq!(d.outcome.events[0].name, "time.synced");
    assert!(!ctx.pending.awaiting_time_sync());
}

#[test]
fn status_and_capabilities() {
    let mut ctx = ctx();
    run(&mut ctx, r#"{"name":"session.start","body":{"sessionId":"P"}}"#);
    let d = run(&mut ctx, r#"{"name":"status.get"}"#);
    let b = body(&d);
    assert_eq!(b["mode"], "RUN");
    assert_eq!(b["ready"], false);
    assert_eq!(b["sessionActive"], false);
    assert_eq!(b["pendingStart"], "P");
    assert_eq!(b["uptimeMs"], 1_000);

    let d = run(&mut ctx, r#"{"name":"capabilities.get"}"#);
    let b = body(&d);
    let commands = b["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 11);
    assert!(commands.contains(&Value::from("session.stream")));
    assert_eq!(b["maxMtu"], 247);
    assert_eq!(b["device"]["model"], "liftpuck");

    let d = run(&mut ctx, r#"{"name":"ping"}"#);
    assert_eq!(body(&d)["epochMs"], 0);
}

#[test]
fn rebuild_and_clear() {
    let mut ctx = ctx();
    let fs = ctx.store.storage_mut();
    fs.insert("/sessions/index.ndjson", b"garbage\n");
    fs.insert("/sessions/A.csv", b"a");
    fs.insert("/sessions/B.tmp", b"bb");
    fs.insert("/sessions/notes.txt", b"n");

    let d = run(&mut ctx, r#"{"name":"sessions.rebuild"}"#);
    assert_eq!(body(&d)["count"], 2);

    let d = run(&mut ctx, r#"{"name":"sessions.clear"}"#);
    assert_eq!(body(&d)["removed"], 2);
    assert_eq!(ctx.store.storage().file_names(), ["/sessions/notes.txt"]);
}
