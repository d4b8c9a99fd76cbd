//! Logging setup.
//!
//! Installs a `tracing` subscriber writing through a non-blocking stdout
//! appender. Output is JSON unless `LOG_FORMAT=pretty`; filtering follows
//! `RUST_LOG`.

use std::error::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Reads `LOG_FORMAT`, defaulting to JSON.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT").map_or(Self::Json, |v| Self::from_str(&v))
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(format: LogFormat) -> Result<WorkerGuard, Box<dyn Error + Send + Sync>> {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    match format {
        LogFormat::Pretty => subscriber.try_init()?,
        LogFormat::Json => subscriber.json().try_init()?,
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("other"), LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        let _first = init(LogFormat::Pretty);
        assert!(init(LogFormat::Json).is_err());
    }
}
