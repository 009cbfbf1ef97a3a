//! Logging subsystem.
//!
//! Structured logging via tracing with JSON (production) and plaintext
//! (development) output. Token values never reach the logs: the token type
//! renders redacted and call sites log lengths or previews only.
//!
//! # Environment Variables
//!
//! - `CONDUCTOR_LOG` - primary log level/filter (takes precedence)
//! - `RUST_LOG` - fallback log level/filter

use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Guard to track if logging has been initialized
static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for production (structured logs)
    Json,
    /// Human-readable plaintext for development
    #[default]
    Plaintext,
}

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format (JSON or plaintext)
    pub format: LogFormat,
    /// Default log level when no env filter is set
    pub default_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plaintext,
            default_level: Level::INFO,
        }
    }
}

impl LogConfig {
    /// Development configuration (plaintext, debug level)
    pub fn development() -> Self {
        Self {
            format: LogFormat::Plaintext,
            default_level: Level::DEBUG,
        }
    }

    /// Production configuration (JSON, info level)
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            default_level: Level::INFO,
        }
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to parse log filter: {0}")]
    FilterParse(#[from] tracing_subscriber::filter::ParseError),
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("failed to initialize subscriber: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Build an EnvFilter from environment variables or the default level.
///
/// Checks CONDUCTOR_LOG first, then RUST_LOG.
fn build_env_filter(default_level: Level) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = std::env::var("CONDUCTOR_LOG") {
        return Ok(EnvFilter::try_new(filter)?);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        return Ok(EnvFilter::try_new(filter)?);
    }
    Ok(EnvFilter::try_new(
        default_level.as_str().to_lowercase(),
    )?)
}

/// Initialize the logging subsystem with the given configuration.
///
/// Call once at process startup; subsequent calls return an error.
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    if INIT_GUARD.set(()).is_err() {
        return Err(LoggingError::AlreadyInitialized);
    }

    let filter = build_env_filter(config.default_level)?;

    match config.format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_env_filter_default() {
        // No env override set in the test environment for this name.
        std::env::remove_var("CONDUCTOR_LOG");
        std::env::remove_var("RUST_LOG");
        assert!(build_env_filter(Level::INFO).is_ok());
    }

    #[test]
    fn test_second_init_errors() {
        let first = init_logging(LogConfig::development());
        let second = init_logging(LogConfig::default());
        // Whichever test initializes first wins; the second attempt must
        // always report AlreadyInitialized.
        if first.is_ok() {
            assert!(matches!(second, Err(LoggingError::AlreadyInitialized)));
        } else {
            assert!(matches!(first, Err(LoggingError::AlreadyInitialized)));
        }
    }
}
