/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ExtractConfig;
use crate::error::{FurrowError, Result};

/// Pick the effective level: `verbose` wins over the configured level
pub fn effective_level(config: &ExtractConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Filter for furrow's own events; `RUST_LOG` replaces it when set
pub fn log_filter(config: &ExtractConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("furrow={}", effective_level(config))))
        .map_err(|e| FurrowError::Config(format!("Failed to create log filter: {}", e)))
}

/// Install the global subscriber.
///
/// Events go to stdout in compact form, or to `config.log_file` as JSON
/// lines when one is set.
pub fn init_logging(config: &ExtractConfig) -> Result<()> {
    let filter = log_filter(config)?;

    let (console, json_file) = match config.log_file {
        Some(ref path) => {
            let file = File::create(path).map_err(|e| {
                FurrowError::Config(format!("Failed to create log file {}: {}", path.display(), e))
            })?;
            (None, Some(fmt::layer().with_writer(file).with_ansi(false).json()))
        }
        None => (Some(fmt::layer().with_target(true).compact()), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json_file)
        .try_init()
        .map_err(|e| FurrowError::Config(format!("Failed to install logger: {}", e)))
}

/// Initialize logging with custom format for testing
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("furrow=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
