//! Remote config receiver.
//!
//! Bridges config blobs pushed by the membership layer to the supervisor:
//! validate, apply the log level, persist and restart.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::observability;
use crate::supervisor::Supervisor;
use crate::types::Result;

/// Key holding the log level inside a config blob.
pub const LOG_LEVEL_KEY: &str = "logLevel";

#[derive(Debug)]
pub struct ConfigReceiver<T> {
    supervisor: Supervisor,
    _config: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ConfigReceiver<T> {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            _config: PhantomData,
        }
    }

    /// Validate `raw` as `T`, apply its log level, then hand it to the child.
    ///
    /// Nothing is written when validation fails.
    pub fn receive(&self, raw: impl Into<Bytes>) -> Result<T> {
        let raw = raw.into();
        let config: T = serde_json::from_slice(&raw)?;

        if let Some(level) = log_level(&raw)? {
            observability::set_log_level(&level)?;
        }

        self.supervisor.update_config(raw)?;
        Ok(config)
    }
}

/// The `logLevel` string of a config blob, if present and non-empty.
pub fn log_level(raw: &[u8]) -> Result<Option<String>> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;
    Ok(value
        .get(LOG_LEVEL_KEY)
        .and_then(serde_json::Value::as_str)
        .filter(|level| !level.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MockHostNotifier;
    use crate::types::{Error, SupervisorConfig};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct RemoteConfig {
        log_level: String,
        workers: u32,
    }

    fn receiver(dir: &std::path::Path) -> (ConfigReceiver<RemoteConfig>, std::path::PathBuf) {
        let path = dir.join("config.json");
        let config = SupervisorConfig::new("127.0.0.1:9000", &path, "main.py");
        let supervisor = Supervisor::new(config, Arc::new(MockHostNotifier::new()));
        (ConfigReceiver::new(supervisor), path)
    }

    #[test]
    fn test_log_level_extraction() {
        assert_eq!(
            log_level(br#"{"logLevel":"debug"}"#).unwrap(),
            Some("debug".to_string())
        );
        assert_eq!(log_level(br#"{"logLevel":""}"#).unwrap(), None);
        assert_eq!(log_level(br#"{"other":1}"#).unwrap(), None);
        assert!(log_level(b"not json").is_err());
    }

    #[test]
    fn test_receive_persists_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let (receiver, path) = receiver(dir.path());
        let raw = br#"{"logLevel":"info","workers":4}"#;

        let config = receiver.receive(&raw[..]).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(std::fs::read(&path).unwrap(), raw);
    }

    #[test]
    fn test_invalid_config_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let (receiver, path) = receiver(dir.path());

        let err = receiver.receive(&br#"{"logLevel":"info"}"#[..]).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (receiver, path) = receiver(dir.path());

        let err = receiver
            .receive(&br#"{"logLevel":"chatty","workers":1}"#[..])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLogLevel(_)));
        assert!(!path.exists());
    }
}
