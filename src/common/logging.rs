//! Logging and tracing configuration
//!
//! The library itself only emits `debug`/`trace` events. Callers that want to
//! see them install a subscriber; the CLI does so here.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "launchd_procinfo=info,warn";

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable. `verbose`
/// raises this crate to DEBUG when `RUST_LOG` is not set.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("launchd_procinfo=debug,warn")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    // try_init: tests and embedding callers may already own the global subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
