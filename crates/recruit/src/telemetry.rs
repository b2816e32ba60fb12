use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Installs the process-wide subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = level_filter(config, from_env.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// Environment directives when they parse, else the configured level.
fn level_filter(
    config: &TelemetryConfig,
    from_env: Option<&str>,
) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = from_env
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::EnvFilter {
        value: config.log_level.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.to_string(),
        }
    }

    #[test]
    fn malformed_configured_level_is_rejected() {
        match level_filter(&config("recruit=loud"), None) {
            Err(TelemetryError::EnvFilter { value, .. }) => assert_eq!(value, "recruit=loud"),
            other => panic!("expected filter error, got {other:?}"),
        }
    }

    #[test]
    fn environment_directives_win_when_they_parse() {
        let filter = level_filter(&config("recruit=loud"), Some("recruit=debug")).expect("env");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = level_filter(&config("warn"), Some("recruit=loud")).expect("fallback");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let filter = level_filter(&config("info"), Some("  ")).expect("blank env");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
