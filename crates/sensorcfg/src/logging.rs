#![forbid(unsafe_code)]

//! Process-wide `tracing` setup.
//!
//! `RUST_LOG` wins when it is set and parses; otherwise the directives from
//! [`LoggingConfig::filter`] are used. Output is human-readable unless
//! [`LoggingConfig::json`] asks for JSON lines.

use sensorcfg_runtime::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[source] TryInitError),
}

/// Parse `EnvFilter` directives.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|source| LoggingError::Filter {
        filter: directives.to_owned(),
        source,
    })
}

/// The filter the subscriber will use.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_filter(&config.filter),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
    .map_err(LoggingError::AlreadyInstalled)?;
    tracing::debug!(json = config.json, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_crate_directives() {
        assert!(parse_filter("info,sensorcfg_runtime=debug").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_filter("sensorcfg=loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { ref filter, .. } if filter == "sensorcfg=loud"));
    }
}
