//! Supervisor - keeps one child worker process alive, configured and
//! informed of peer addresses.
//!
//! [`Supervisor`] is a cheap handle; the state lives in a single event loop
//! run by [`Supervisor::start`]. Handles only send messages into it:
//!
//! ```text
//!   update_config ──► restart slot (1) ─┐
//!   upgrade ────────► upgrade queue ────┼─► event loop ─► runner / terminator
//!   stop ───────────► cancel token ─────┘        │
//!                                                └────► propagator ─► child
//! ```

mod actor;
mod backoff;
mod propagator;
mod registry;
mod runner;
mod state;
mod terminator;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::notifier::HostNotifier;
use crate::types::{Error, ModuleName, Result, SupervisorConfig};

use actor::SupervisorActor;

pub use actor::UpgradeEvent;
pub use backoff::BackoffPolicy;
pub use propagator::Propagator;
pub use registry::HostRegistry;
pub use runner::{ChildHandle, ExitDescription, ProcessRunner};
pub use state::{SupervisorState, SupervisorStatus};
pub use terminator::{TerminationOutcome, TerminationStrategy, Terminator};

/// Lifecycle handle for the supervised child.
#[derive(Debug, Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config_path: PathBuf,
    upgrades: mpsc::UnboundedSender<UpgradeEvent>,
    config_updated: mpsc::Sender<()>,
    cancel: CancellationToken,
    status: Arc<watch::Sender<SupervisorStatus>>,
    actor: Mutex<Option<SupervisorActor>>,
}

impl Supervisor {
    /// Build a supervisor using the platform's termination strategy.
    pub fn new(config: SupervisorConfig, notifier: Arc<dyn HostNotifier>) -> Self {
        Self::with_strategy(config, notifier, TerminationStrategy::for_platform())
    }

    pub fn with_strategy(
        config: SupervisorConfig,
        notifier: Arc<dyn HostNotifier>,
        strategy: TerminationStrategy,
    ) -> Self {
        let (upgrades_tx, upgrades_rx) = mpsc::unbounded_channel();
        // Single slot: further updates before the loop reacts collapse into one restart.
        let (config_tx, config_rx) = mpsc::channel(1);
        let (status_tx, _) = watch::channel(SupervisorStatus::default());
        let status = Arc::new(status_tx);
        let cancel = CancellationToken::new();

        let actor = SupervisorActor {
            runner: ProcessRunner::new(
                config.clone(),
                strategy == TerminationStrategy::ProcessGroup,
            ),
            terminator: Terminator::new(strategy, config.grace_period, config.kill_reap_timeout),
            propagator: Propagator::new(notifier, BackoffPolicy::from(&config.propagation)),
            registry: HostRegistry::new(),
            restart_backoff: config.restart_backoff,
            upgrades: upgrades_rx,
            config_updated: config_rx,
            cancel: cancel.clone(),
            status: status.clone(),
        };

        Self {
            inner: Arc::new(Inner {
                config_path: config.config_path,
                upgrades: upgrades_tx,
                config_updated: config_tx,
                cancel,
                status,
                actor: Mutex::new(Some(actor)),
            }),
        }
    }

    /// Run the event loop until [`stop`](Self::stop) is called or `shutdown`
    /// is cancelled.
    ///
    /// The child is first spawned on the first config update. Errors only if
    /// the loop has already been started or the supervisor was stopped.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let actor = self
            .take_actor()?
            .ok_or_else(|| Error::state_transition("supervisor already started or stopped"))?;
        actor.run(shutdown).await;
        Ok(())
    }

    /// Persist a new config blob and schedule a restart.
    ///
    /// The file is replaced atomically with owner-only permissions. Updates
    /// arriving faster than the loop restarts collapse into one restart that
    /// picks up the latest file.
    pub fn update_config(&self, config: impl Into<Bytes>) -> Result<()> {
        let config = config.into();
        write_config(&self.inner.config_path, &config).map_err(|source| Error::ConfigWrite {
            path: self.inner.config_path.clone(),
            source,
        })?;

        match self.inner.config_updated.try_send(()) {
            Ok(()) => tracing::debug!(bytes = config.len(), "config written, restart scheduled"),
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!(bytes = config.len(), "config written, restart already pending")
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::debug!("config written, supervisor no longer running")
            }
        }
        Ok(())
    }

    /// Record a module's new host list and push it to the child if one is
    /// running. Fire-and-forget.
    pub fn upgrade(&self, module: impl Into<String>, hosts: Vec<String>) {
        let module = match ModuleName::from_string(module.into()) {
            Ok(module) => module,
            Err(e) => {
                tracing::warn!(error = e, "hosts upgrade dropped");
                return;
            }
        };
        if self
            .inner
            .upgrades
            .send(UpgradeEvent { module, hosts })
            .is_err()
        {
            tracing::debug!("hosts upgrade after supervisor stopped, ignored");
        }
    }

    /// Request shutdown and wait until the child is stopped and the loop has
    /// exited. Safe to call repeatedly.
    pub async fn stop(&self) -> Result<()> {
        self.inner.cancel.cancel();

        // Never started: nothing to wait for.
        if self.take_actor()?.is_some() {
            self.inner.status.send_modify(|s| s.state = SupervisorState::Stopped);
            return Ok(());
        }

        let mut status = self.inner.status.subscribe();
        status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map_err(|_| Error::internal("status channel closed"))?;
        Ok(())
    }

    /// Alias of [`stop`](Self::stop).
    pub async fn close(&self) -> Result<()> {
        self.stop().await
    }

    pub fn status(&self) -> SupervisorStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.inner.status.subscribe()
    }

    pub fn config_path(&self) -> &Path {
        &self.inner.config_path
    }

    fn take_actor(&self) -> Result<Option<SupervisorActor>> {
        let mut slot = self
            .inner
            .actor
            .lock()
            .map_err(|_| Error::internal("supervisor lock poisoned"))?;
        Ok(slot.take())
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_config(path: &Path, config: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = (|| {
        let mut file = options.open(&tmp)?;
        file.write_all(config)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
