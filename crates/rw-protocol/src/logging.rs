//! Level-filtered stderr logging, in the direct-`eprintln!` style this
//! workspace already uses rather than pulling in a tracing/log crate.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
}

impl Level {
    fn from_env(val: &str) -> Self {
        match val.to_lowercase().as_str() {
            "off" | "0" => Level::Off,
            "error" | "1" => Level::Error,
            "warn" | "2" => Level::Warn,
            _ => Level::Info,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Level::Off => "",
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static INIT: OnceLock<()> = OnceLock::new();

fn ensure_init() {
    INIT.get_or_init(|| {
        if let Ok(val) = std::env::var("RW_LOG_LEVEL") {
            LOG_LEVEL.store(Level::from_env(&val) as u8, Ordering::Relaxed);
        }
    });
}

fn current_level() -> Level {
    ensure_init();
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => Level::Off,
        1 => Level::Error,
        2 => Level::Warn,
        _ => Level::Info,
    }
}

fn log(level: Level, msg: &str) {
    if level > current_level() {
        return;
    }
    eprintln!("{} {}", level.tag(), msg);
}

pub fn log_info(msg: &str) {
    log(Level::Info, msg);
}

pub fn log_warn(msg: &str) {
    log(Level::Warn, msg);
}

pub fn log_error(msg: &str) {
    log(Level::Error, msg);
}

/// Print a fatal error and exit with a non-zero status, for unrecoverable
/// startup failures (bad CLI args, socket bind failure). Never panics.
pub fn die(msg: &str) -> ! {
    eprintln!("[FATAL] {}", msg);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_gates_output() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
    }

    #[test]
    fn from_env_defaults_to_info() {
        assert_eq!(Level::from_env("bogus"), Level::Info);
        assert_eq!(Level::from_env("error"), Level::Error);
        assert_eq!(Level::from_env("0"), Level::Off);
    }
}
