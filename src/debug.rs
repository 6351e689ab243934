//! Logging setup. Warnings are always on; `enable()` turns on debug output
//! (the `-d/--debug` flag). `RUST_LOG` still wins when set.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG: AtomicBool = AtomicBool::new(false);

pub fn enable() {
    DEBUG.store(true, Ordering::Relaxed);
}

pub fn is_on() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Install the env_logger backend. Call once, after flags are parsed.
pub fn init() {
    let level = if is_on() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();
    log::debug!("debug logging on");
}
