//! Random-walk engine server.
//!
//! Binds a Unix stream socket and runs one session thread per accepted
//! connection against a single shared `Server`.
//!
//! ## Usage
//!
//!     rw-server [--socket PATH] [--kind wrap|obstacles] [--width W] [--height H]
//!               [--workers N] [--queue-capacity N]

use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rw_engine::server::Server;
use rw_engine::session::run_session;
use rw_engine::world::WorldKind;
use rw_protocol::logging::{die, log_error, log_info};

const DEFAULT_SOCKET_PATH: &str = "/tmp/rw-engine.sock";
const DEFAULT_WIDTH: u32 = 64;
const DEFAULT_HEIGHT: u32 = 64;

static RUNNING: AtomicBool = AtomicBool::new(true);

struct Config {
    socket_path: PathBuf,
    world_kind: WorldKind,
    width: u32,
    height: u32,
    num_workers: usize,
    queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            world_kind: WorldKind::Wrap,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            num_workers: rw_engine::sim_manager::DEFAULT_WORKERS,
            queue_capacity: rw_engine::sim_manager::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut cfg = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--socket" => {
                i += 1;
                if let Some(v) = args.get(i) {
                    cfg.socket_path = PathBuf::from(v);
                }
            }
            "--kind" => {
                i += 1;
                match args.get(i).map(String::as_str) {
                    Some("obstacles") => cfg.world_kind = WorldKind::Obstacles,
                    Some("wrap") => cfg.world_kind = WorldKind::Wrap,
                    Some(other) => die(&format!("unknown --kind value: {other}")),
                    None => die("--kind requires a value"),
                }
            }
            "--width" => {
                i += 1;
                if let Some(w) = args.get(i).and_then(|s| s.parse().ok()) {
                    cfg.width = w;
                } else {
                    die("--width requires a positive integer");
                }
            }
            "--height" => {
                i += 1;
                if let Some(h) = args.get(i).and_then(|s| s.parse().ok()) {
                    cfg.height = h;
                } else {
                    die("--height requires a positive integer");
                }
            }
            "--workers" => {
                i += 1;
                if let Some(w) = args.get(i).and_then(|s| s.parse().ok()) {
                    cfg.num_workers = w;
                } else {
                    die("--workers requires a positive integer");
                }
            }
            "--queue-capacity" => {
                i += 1;
                if let Some(c) = args.get(i).and_then(|s| s.parse().ok()) {
                    cfg.queue_capacity = c;
                } else {
                    die("--queue-capacity requires a positive integer");
                }
            }
            other => die(&format!("unrecognized argument: {other}")),
        }
        i += 1;
    }
    cfg
}

extern "C" fn handle_shutdown_signal(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

fn main() {
    let cfg = parse_args();

    unsafe {
        libc::signal(libc::SIGINT, handle_shutdown_signal as usize);
        libc::signal(libc::SIGTERM, handle_shutdown_signal as usize);
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    if cfg.socket_path.exists() {
        if let Err(e) = std::fs::remove_file(&cfg.socket_path) {
            die(&format!("failed to remove stale socket {}: {e}", cfg.socket_path.display()));
        }
    }

    let listener = match UnixListener::bind(&cfg.socket_path) {
        Ok(l) => l,
        Err(e) => {
            die(&format!("failed to bind socket {}: {e}", cfg.socket_path.display()));
        }
    };
    log_info(&format!(
        "rw-server: listening on {} ({:?} {}x{}, {} workers)",
        cfg.socket_path.display(),
        cfg.world_kind,
        cfg.width,
        cfg.height,
        cfg.num_workers
    ));

    let server = Arc::new(Server::new(cfg.world_kind, cfg.width, cfg.height, cfg.num_workers, cfg.queue_capacity));

    while RUNNING.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let server = Arc::clone(&server);
                let builder = std::thread::Builder::new().name("rw-session".to_string());
                if let Err(e) = builder.spawn(move || run_session(server, stream)) {
                    log_error(&format!("failed to spawn session thread: {e}"));
                }
            }
            Err(e) => {
                if !RUNNING.load(Ordering::Relaxed) {
                    break;
                }
                log_error(&format!("accept error: {e}"));
            }
        }
    }

    std::fs::remove_file(&cfg.socket_path).ok();
    log_info("rw-server: shutdown complete");
}
