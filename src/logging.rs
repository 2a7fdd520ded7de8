use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogConfig;
use crate::error::{AppError, AppResult};

/// Installs the global stderr subscriber. `RUST_LOG` wins over the config filter.
pub fn init(config: &LogConfig) -> AppResult<()> {
    let filter = resolve_filter(config)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| AppError::invalid_argument(format!("logging already initialized: {err}")))
}

fn resolve_filter(config: &LogConfig) -> AppResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|err| {
        AppError::invalid_argument(format!("invalid log filter {:?}: {err}", config.filter))
    })
}
