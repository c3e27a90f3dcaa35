//! Observability utilities.

use std::sync::OnceLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::types::{Error, Result};

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// Log format defaults to plain text and can be switched to JSON via
/// `WARDEN_LOG_FORMAT=json`. Filter defaults to `info` if `RUST_LOG` is unset.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter_layer, handle) = reload::Layer::new(env_filter);
        let json = std::env::var("WARDEN_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().compact())
                .try_init()
        };

        match result {
            Ok(()) => {
                let _ = FILTER_HANDLE.set(handle);
            }
            Err(err) => eprintln!("tracing init skipped: {err}"),
        }
    });
}

/// Parse a level name (`trace`..`error`, `off`) as sent in remote configs.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| Error::invalid_log_level(level))
}

/// Replace the active filter with a single global level.
///
/// No-op when [`init_tracing`] has not installed the subscriber.
pub fn set_log_level(level: &str) -> Result<()> {
    let filter = parse_level(level)?;
    let Some(handle) = FILTER_HANDLE.get() else {
        tracing::debug!(level = %filter, "log level change ignored, tracing not initialised");
        return Ok(());
    };
    handle
        .reload(EnvFilter::new(filter.to_string()))
        .map_err(|e| Error::internal(format!("reload log filter: {}", e)))?;
    tracing::info!(level = %filter, "log level changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn parse_level_accepts_config_spellings() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level(" error ").unwrap(), LevelFilter::ERROR);
        assert!(matches!(
            parse_level("loud"),
            Err(Error::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn set_log_level_rejects_garbage() {
        assert!(set_log_level("verbose-ish").is_err());
        assert!(set_log_level("info").is_ok());
    }
}
