use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Installs the global subscriber writing to stderr, so stdout only carries the report.
///
/// `RUST_LOG` wins over `base_level` when it is set.
pub fn setup_logging(base_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .map_err(|e| Error::Config(format!("invalid log filter: {e}")))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logger initialization failed: {e}")))?;

    return Ok(());
}
