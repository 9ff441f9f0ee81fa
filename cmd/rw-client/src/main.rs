//! Random-walk engine client.
//!
//! A single command-line invocation performs the handshake, issues one
//! command, prints the reply, and exits. There is no interactive console
//! here: that's left to whatever drives this binary in a script or pipe.
//!
//! ## Usage
//!
//!     rw-client --socket PATH status
//!     rw-client --socket PATH create --kind obstacles --width 32 --height 32 \
//!               --probs 0.25,0.25,0.25,0.25 --k 500 --reps 10
//!     rw-client --socket PATH start
//!     rw-client --socket PATH snapshot
//!     rw-client --socket PATH stop
//!     rw-client --socket PATH save /tmp/results.bin
//!     rw-client --socket PATH quit

use std::path::PathBuf;
use std::time::Duration;

use rw_client::{connect, Dispatcher};
use rw_protocol::logging::{die, log_info};
use rw_protocol::wire::{
    CreateSim, GlobalMode, LoadResults, LoadWorld, MoveProbs, MsgType, QueryStatus, Quit, RequestSnapshot, RestartSim,
    SaveResults, SetGlobalMode, Status, StopSim, WireError, WireSize, WorldKind,
};

const DEFAULT_SOCKET_PATH: &str = "/tmp/rw-engine.sock";
const REQUEST_TIMEOUT_MS: u64 = 5_000;
const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const SNAPSHOT_POLL_ATTEMPTS: u32 = 100;

fn main() {
    let mut args = std::env::args().skip(1).peekable();
    let mut socket_path = PathBuf::from(DEFAULT_SOCKET_PATH);

    while let Some(arg) = args.peek() {
        if arg == "--socket" {
            args.next();
            match args.next() {
                Some(v) => socket_path = PathBuf::from(v),
                None => die("--socket requires a value"),
            }
        } else {
            break;
        }
    }

    let command = match args.next() {
        Some(c) => c,
        None => die("expected a command: status, create, load-world, start, restart, stop, snapshot, save, load-results, set-mode, quit"),
    };

    let rest: Vec<String> = args.collect();

    let (stream, welcome) = connect(&socket_path).unwrap_or_else(|e| die(&format!("connect failed: {e}")));
    log_info(&format!(
        "connected: world={:?} size={}x{} state known only after next status",
        welcome.world_kind, welcome.size.width, welcome.size.height
    ));

    let dispatcher = Dispatcher::spawn(stream).unwrap_or_else(|e| die(&format!("failed to start dispatcher: {e}")));

    match command.as_str() {
        "status" => cmd_status(&dispatcher),
        "create" => cmd_create(&dispatcher, &rest),
        "load-world" => cmd_load_world(&dispatcher, &rest),
        "start" => cmd_start(&dispatcher),
        "restart" => cmd_restart(&dispatcher, &rest),
        "stop" => cmd_stop(&dispatcher),
        "snapshot" => cmd_snapshot(&dispatcher),
        "save" => cmd_save(&dispatcher, &rest),
        "load-results" => cmd_load_results(&dispatcher, &rest),
        "set-mode" => cmd_set_mode(&dispatcher, &rest),
        "quit" => cmd_quit(&dispatcher, &rest),
        other => die(&format!("unknown command: {other}")),
    }
}

fn expect_ack_or_error(dispatcher: &Dispatcher, req_type: MsgType, payload: &[u8], on_success: &str) {
    let reply = dispatcher.send_and_wait(req_type as u16, payload, &[MsgType::Ack as u16, MsgType::Error as u16], REQUEST_TIMEOUT_MS);
    match reply {
        Ok((hdr, _payload)) if hdr.msg_type == MsgType::Ack as u16 => {
            log_info(on_success);
        }
        Ok((_hdr, payload)) => report_server_error(&payload),
        Err(e) => die(&format!("request failed: {e}")),
    }
}

fn report_server_error(payload: &[u8]) {
    match WireError::decode(payload) {
        Ok(err) => die(&format!("server error {}: {}", err.code, err.message)),
        Err(_) => die("server returned a malformed error"),
    }
}

fn cmd_status(dispatcher: &Dispatcher) {
    let req = QueryStatus { pid: std::process::id() };
    let reply = dispatcher.send_and_wait(
        MsgType::QueryStatus as u16,
        &req.encode(),
        &[MsgType::Status as u16, MsgType::Error as u16],
        REQUEST_TIMEOUT_MS,
    );
    match reply {
        Ok((hdr, payload)) if hdr.msg_type == MsgType::Status as u16 => {
            let status = Status::decode(&payload).unwrap_or_else(|e| die(&format!("malformed STATUS reply: {e}")));
            println!(
                "world={:?} size={}x{} k={} reps={}/{} mode={:?} state={:?} multi_user={} can_control={}",
                status.world_kind,
                status.size.width,
                status.size.height,
                status.k_max_steps,
                status.current_rep,
                status.total_reps,
                status.global_mode,
                status.sim_state,
                status.multi_user,
                status.can_control
            );
        }
        Ok((_hdr, payload)) => report_server_error(&payload),
        Err(e) => die(&format!("request failed: {e}")),
    }
}

fn parse_probs(s: &str) -> MoveProbs {
    let parts: Vec<f64> = s.split(',').map(|p| p.trim().parse().unwrap_or_else(|_| die("--probs must be four comma-separated numbers"))).collect();
    if parts.len() != 4 {
        die("--probs must be four comma-separated numbers: up,down,left,right");
    }
    MoveProbs { p_up: parts[0], p_down: parts[1], p_left: parts[2], p_right: parts[3] }
}

fn flag_value<'a>(rest: &'a [String], name: &str) -> Option<&'a str> {
    rest.iter().position(|a| a == name).and_then(|i| rest.get(i + 1)).map(String::as_str)
}

fn cmd_create(dispatcher: &Dispatcher, rest: &[String]) {
    let kind = match flag_value(rest, "--kind") {
        Some("obstacles") => WorldKind::Obstacles,
        Some("wrap") | None => WorldKind::Wrap,
        Some(other) => die(&format!("unknown --kind value: {other}")),
    };
    let width: u32 = flag_value(rest, "--width").and_then(|v| v.parse().ok()).unwrap_or_else(|| die("--width is required"));
    let height: u32 = flag_value(rest, "--height").and_then(|v| v.parse().ok()).unwrap_or_else(|| die("--height is required"));
    let probs = flag_value(rest, "--probs").map(parse_probs).unwrap_or(MoveProbs { p_up: 0.25, p_down: 0.25, p_left: 0.25, p_right: 0.25 });
    let k_max_steps: u32 = flag_value(rest, "--k").and_then(|v| v.parse().ok()).unwrap_or_else(|| die("--k is required"));
    let total_reps: u32 = flag_value(rest, "--reps").and_then(|v| v.parse().ok()).unwrap_or_else(|| die("--reps is required"));
    let multi_user = rest.iter().any(|a| a == "--multi-user");

    let req = CreateSim { world_kind: kind, size: WireSize { width, height }, probs, k_max_steps, total_reps, multi_user };
    expect_ack_or_error(dispatcher, MsgType::CreateSim, &req.encode(), "simulation created");
}

fn cmd_load_world(dispatcher: &Dispatcher, rest: &[String]) {
    let path = rest.first().unwrap_or_else(|| die("load-world requires a file path"));
    let multi_user = rest.iter().any(|a| a == "--multi-user");
    let req = LoadWorld { path: path.clone(), multi_user };
    let payload = req.encode().unwrap_or_else(|e| die(&format!("path too long: {e}")));
    expect_ack_or_error(dispatcher, MsgType::LoadWorld, &payload, "world loaded");
}

fn cmd_start(dispatcher: &Dispatcher) {
    expect_ack_or_error(dispatcher, MsgType::StartSim, &[], "simulation started");
}

fn cmd_restart(dispatcher: &Dispatcher, rest: &[String]) {
    let total_reps: u32 = rest.first().and_then(|v| v.parse().ok()).unwrap_or_else(|| die("restart requires a replication count"));
    let req = RestartSim { total_reps };
    expect_ack_or_error(dispatcher, MsgType::RestartSim, &req.encode(), "simulation restarted");
}

fn cmd_stop(dispatcher: &Dispatcher) {
    let req = StopSim { pid: std::process::id() };
    expect_ack_or_error(dispatcher, MsgType::StopSim, &req.encode(), "stop requested");
}

fn cmd_snapshot(dispatcher: &Dispatcher) {
    let req = RequestSnapshot { pid: std::process::id() };
    dispatcher
        .send_fire_and_forget(MsgType::RequestSnapshot as u16, &req.encode())
        .unwrap_or_else(|e| die(&format!("failed to send REQUEST_SNAPSHOT: {e}")));

    for _ in 0..SNAPSHOT_POLL_ATTEMPTS {
        if let Some(snapshot) = dispatcher.latest_snapshot() {
            println!(
                "snapshot {} cells={} fields_bitmask={:#06b}",
                snapshot.snapshot_id, snapshot.width as u64 * snapshot.height as u64, snapshot.included_fields
            );
            return;
        }
        std::thread::sleep(SNAPSHOT_POLL_INTERVAL);
    }
    die("timed out waiting for snapshot");
}

fn cmd_save(dispatcher: &Dispatcher, rest: &[String]) {
    let path = rest.first().unwrap_or_else(|| die("save requires a file path"));
    let req = SaveResults { path: path.clone() };
    let payload = req.encode().unwrap_or_else(|e| die(&format!("path too long: {e}")));
    expect_ack_or_error(dispatcher, MsgType::SaveResults, &payload, "results saved");
}

fn cmd_load_results(dispatcher: &Dispatcher, rest: &[String]) {
    let path = rest.first().unwrap_or_else(|| die("load-results requires a file path"));
    let req = LoadResults { path: path.clone() };
    let payload = req.encode().unwrap_or_else(|e| die(&format!("path too long: {e}")));
    expect_ack_or_error(dispatcher, MsgType::LoadResults, &payload, "results loaded");
}

fn cmd_set_mode(dispatcher: &Dispatcher, rest: &[String]) {
    let mode = match rest.first().map(String::as_str) {
        Some("interactive") => GlobalMode::Interactive,
        Some("summary") => GlobalMode::Summary,
        _ => die("set-mode requires interactive or summary"),
    };
    let req = SetGlobalMode { new_mode: mode };
    expect_ack_or_error(dispatcher, MsgType::SetGlobalMode, &req.encode(), "global mode changed");
}

fn cmd_quit(dispatcher: &Dispatcher, rest: &[String]) {
    let stop_if_owner = rest.iter().any(|a| a == "--stop");
    let req = Quit { pid: std::process::id(), stop_if_owner };
    expect_ack_or_error(dispatcher, MsgType::Quit, &req.encode(), "disconnected");
}
