//! Logging setup plus conditional logging macros gated on a module-level
//! `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//! use crate::utils::logging::TRACKING;
//!
//! log_info!(target: TRACKING, "Started tracking tab {}", tab_id);
//! log_warn!("plain message without a category");
//! ```
//!
//! Stdout carries the native messaging stream, so every log line goes to
//! stderr.

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Session lifecycle (start, completion, pattern changes).
pub const SESSION: &str = "breakwatch::session";
/// Tracking loop start/stop and tick progress.
pub const TRACKING: &str = "breakwatch::tracking";
/// Break enforcement sequence.
pub const BLOCK: &str = "breakwatch::block";
/// Visual penalty start/stop.
pub const PENALTY: &str = "breakwatch::penalty";

/// Install the global logger. `RUST_LOG` overrides the `Info` default.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .target(Target::Stderr)
        .format_target(true)
        .try_init();
}

/// Conditional info logging. Accepts an optional `target: <expr>,` prefix.
///
/// Each module that uses this macro must define:
/// ```rust,ignore
/// const ENABLE_LOGS: bool = true; // or false
/// ```
#[macro_export]
macro_rules! log_info {
    (target: $target:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!(target: $target, $($arg)*);
        }
    };
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional warn logging. Accepts an optional `target: <expr>,` prefix.
#[macro_export]
macro_rules! log_warn {
    (target: $target:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!(target: $target, $($arg)*);
        }
    };
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging. Accepts an optional `target: <expr>,` prefix.
#[macro_export]
macro_rules! log_error {
    (target: $target:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!(target: $target, $($arg)*);
        }
    };
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
