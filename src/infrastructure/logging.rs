//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Default filter when `SOLPATTERN_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "solpattern=debug"
    } else {
        "solpattern=info"
    }
}

/// Installs the global subscriber once; later calls are no-ops. Logs go to
/// stderr so reports on stdout stay machine-readable.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("SOLPATTERN_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    });
}
