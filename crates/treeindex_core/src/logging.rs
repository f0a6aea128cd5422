use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`; output goes
/// to stderr so report lines on stdout stay machine-readable.
pub fn init_tracing(default_filter: &str, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(default_filter.replace("=info", "=debug"))
        } else {
            EnvFilter::new(default_filter)
        }
    });

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}
