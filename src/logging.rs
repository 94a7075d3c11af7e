//! Logging configuration for storefront-migrate.
//!
//! Progress goes to stderr so stdout only carries the final banner and
//! inspection output.

use tracing_subscriber::EnvFilter;

/// Returns the filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "storefront_migrate=debug,info"
    } else {
        "info"
    }
}

/// Initializes logging to stderr.
///
/// `RUST_LOG` takes precedence over the `verbose` flag.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
