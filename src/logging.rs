//! Structured logging for the CLI.
//!
//! Log records go to stderr so they never interleave with the progress
//! lines [`crate::output`] prints on stdout. The level comes from `RUST_LOG`
//! when set, otherwise from the `--verbose` flag.

use std::io;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "adcanvas=debug,info" } else { "warn" }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_debug_for_crate() {
        assert_eq!(default_directive(true), "adcanvas=debug,info");
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
