//! Thin `log` facade wrappers, grounded on
//! `examples/jfabienke-mbuscrate/src/logging.rs` with the RTT/defmt
//! embedded-target branches dropped — this crate runs on a Linux host
//! talking to a character device, not on a bare-metal target.

use log::{info, log_enabled, Level};

/// Initializes the logger with the `env_logger` crate, reading filter
/// configuration from the `RUST_LOG` environment variable as usual.
pub fn init_logger() {
    env_logger::init();
}

/// Logs an informational message. The dispatch loop's warnings/traces go
/// through the `log` macros directly; this wrapper exists for the CLI's
/// user-facing result lines, which only ever log at `Info`.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
