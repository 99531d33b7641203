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
                write!(f, "invalid log filter '{value}' in APP_LOG_LEVEL")
            }
            TelemetryError::Subscriber(err) => {
                write!(f, "could not install tracing subscriber: {err}")
            }
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

/// Filter for the moderation crates. A bare level such as `debug` applies to our own targets
/// only and keeps dependencies at `warn`; anything else is taken as a full directive list.
pub fn moderation_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let level = log_level.trim();
    let directives = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,rental_moderation={level},rental_moderation_api={level}")
    };

    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::EnvFilter {
        value: log_level.to_string(),
        source,
    })
}

/// Install the global fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => moderation_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(!config.ansi)
        .with_ansi(config.ansi)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_scopes_to_moderation_targets() {
        let filter = moderation_filter("debug").expect("level parses");
        let rendered = filter.to_string();
        assert!(rendered.contains("rental_moderation=debug"));
        assert!(rendered.contains("rental_moderation_api=debug"));
    }

    #[test]
    fn directive_lists_pass_through() {
        let filter = moderation_filter("info,tower=debug").expect("directives parse");
        assert!(filter.to_string().contains("tower=debug"));
    }

    #[test]
    fn malformed_level_is_reported() {
        match moderation_filter("rental_moderation=loud") {
            Err(TelemetryError::EnvFilter { value, .. }) => {
                assert_eq!(value, "rental_moderation=loud")
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }
}
