//! Configuration structures.
//!
//! Paths are resolved from environment variables (see [`crate::paths`]); the
//! timing knobs default to the values the supervisor has always used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::paths;
use crate::types::Result;

/// Environment variable carrying the host service's bound address to the child.
pub const BINDING_ADDRESS_ENV: &str = "BINDING_ADDRESS";
/// Environment variable carrying the config file path to the child.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Address the host service is bound to. Also the notification target.
    pub binding_address: String,

    /// Where config blobs are written before each (re)start.
    pub config_path: PathBuf,

    /// Entry point handed to the child command as its last argument.
    pub module_path: PathBuf,

    /// How the child is launched.
    #[serde(default)]
    pub command: ChildCommand,

    /// Wait after SIGTERM before escalating to SIGKILL.
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Pause before respawning after a crash or a failed spawn.
    #[serde(default = "default_restart_backoff", with = "humantime_serde")]
    pub restart_backoff: Duration,

    /// Bound on waiting for the exit status after a forced kill.
    #[serde(default = "default_kill_reap_timeout", with = "humantime_serde")]
    pub kill_reap_timeout: Duration,

    /// Host list delivery retry settings.
    #[serde(default)]
    pub propagation: PropagationConfig,
}

fn default_grace_period() -> Duration {
    Duration::from_secs(5)
}

fn default_restart_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_kill_reap_timeout() -> Duration {
    Duration::from_secs(1)
}

impl SupervisorConfig {
    pub fn new(
        binding_address: impl Into<String>,
        config_path: impl Into<PathBuf>,
        module_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binding_address: binding_address.into(),
            config_path: config_path.into(),
            module_path: module_path.into(),
            command: ChildCommand::default(),
            grace_period: default_grace_period(),
            restart_backoff: default_restart_backoff(),
            kill_reap_timeout: default_kill_reap_timeout(),
            propagation: PropagationConfig::default(),
        }
    }

    /// Build a config with module and config paths resolved from the environment.
    pub fn from_env(binding_address: impl Into<String>) -> Result<Self> {
        let dev = paths::is_dev_mode();
        let config_path = paths::resolve_config_path(dev)?;
        let module_path = paths::resolve_module_path(dev)?;
        Ok(Self::new(binding_address, config_path, module_path))
    }

    pub fn with_command(mut self, command: ChildCommand) -> Self {
        self.command = command;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_restart_backoff(mut self, restart_backoff: Duration) -> Self {
        self.restart_backoff = restart_backoff;
        self
    }

    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }

    /// Base URL of the child's notification endpoint.
    pub fn notify_base_url(&self) -> String {
        format!("http://{}", self.binding_address)
    }
}

/// Program and arguments used to launch the child.
///
/// The module path is appended after `args`, so the default launches
/// `uv run <module_path>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment on top of the inherited one.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ChildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl Default for ChildCommand {
    fn default() -> Self {
        Self::new("uv").args(["run"])
    }
}

/// Host list delivery retry configuration (exponential backoff within a budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Total time budget for one delivery, retries included.
    #[serde(with = "humantime_serde")]
    pub max_elapsed: Duration,

    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Cap on a single delay.
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,

    /// Timeout for one notification request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_elapsed: Duration::from_secs(5),
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::new("127.0.0.1:9000", "/tmp/c.json", "/srv/main.py");
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.restart_backoff, Duration::from_secs(2));
        assert_eq!(config.command.program, "uv");
        assert_eq!(config.command.args, vec!["run".to_string()]);
        assert_eq!(config.propagation.max_elapsed, Duration::from_secs(5));
        assert_eq!(config.notify_base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_deserialize_humantime_durations() {
        let json = serde_json::json!({
            "binding_address": "10.0.0.5:8080",
            "config_path": "/var/lib/child/config.json",
            "module_path": "/srv/child/main.py",
            "grace_period": "750ms",
            "restart_backoff": "3s",
            "command": { "program": "python3", "args": ["-u"] },
        });
        let config: SupervisorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.grace_period, Duration::from_millis(750));
        assert_eq!(config.restart_backoff, Duration::from_secs(3));
        assert_eq!(config.kill_reap_timeout, Duration::from_secs(1));
        assert_eq!(config.command.program, "python3");
        assert!(config.command.env.is_empty());
        assert_eq!(config.propagation, PropagationConfig::default());
    }
}
