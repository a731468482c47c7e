//! Logging setup shared by both binaries.
//!
//! Library code only emits `tracing` events; a binary installs one of the
//! subscribers below at startup. `RUST_LOG` overrides the default level.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Mutex, Once};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Map `-v` counts to a filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Human-readable logs on stderr. Later calls are ignored.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(fmt_layer)
            .init();
    });
}

/// JSON logs on stderr, one object per line.
pub fn init_tracing_json(default_level: &str) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .with_current_span(true);

        tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(fmt_layer)
            .init();
    });
}

/// Logs appended to a file. Used by the terminal viewer, which owns the
/// screen and cannot share stderr.
pub fn init_tracing_file(path: &Path, default_level: &str) -> io::Result<()> {
    let file = File::options().create(true).append(true).open(path)?;
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_thread_names(true);

        tracing_subscriber::registry()
            .with(env_filter(default_level))
            .with(fmt_layer)
            .init();
    });
    Ok(())
}
