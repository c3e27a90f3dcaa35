//! Supervisor event loop.
//!
//! The actor owns the child handle, the host registry and the state. Every
//! external trigger arrives as a message; nothing here is shared.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::propagator::Propagator;
use super::registry::HostRegistry;
use super::runner::{ChildHandle, ExitDescription, ProcessRunner};
use super::state::{SupervisorState, SupervisorStatus};
use super::terminator::Terminator;
use crate::types::ModuleName;

/// A module's new host list, queued for the registry and the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeEvent {
    pub module: ModuleName,
    pub hosts: Vec<String>,
}

/// What woke the loop up.
#[derive(Debug)]
enum Event {
    Stop,
    Upgrade(UpgradeEvent),
    ConfigUpdated,
    Exited(ExitDescription),
}

#[derive(Debug)]
pub(crate) struct SupervisorActor {
    pub(crate) runner: ProcessRunner,
    pub(crate) terminator: Terminator,
    pub(crate) propagator: Propagator,
    pub(crate) registry: HostRegistry,
    pub(crate) restart_backoff: Duration,
    pub(crate) upgrades: mpsc::UnboundedReceiver<UpgradeEvent>,
    pub(crate) config_updated: mpsc::Receiver<()>,
    pub(crate) cancel: CancellationToken,
    pub(crate) status: Arc<watch::Sender<SupervisorStatus>>,
}

impl SupervisorActor {
    /// Run until cancelled. Leaves the status in `Stopped`.
    pub(crate) async fn run(mut self, shutdown: CancellationToken) {
        let _stopped = MarkStopped(self.status.clone());
        let span = tracing::info_span!("supervisor");
        async move {
            let mut child: Option<ChildHandle> = None;

            loop {
                let event = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Event::Stop,
                    _ = shutdown.cancelled() => Event::Stop,
                    Some(ev) = self.upgrades.recv() => Event::Upgrade(ev),
                    Some(()) = self.config_updated.recv() => Event::ConfigUpdated,
                    exit = wait_exit(&mut child) => Event::Exited(exit),
                };

                match event {
                    Event::Stop => {
                        self.shutdown(child.take()).await;
                        return;
                    }
                    Event::Upgrade(ev) => self.apply_upgrade(ev, child.is_some(), &shutdown).await,
                    Event::ConfigUpdated => {
                        if let Some(mut old) = child.take() {
                            self.transition(SupervisorState::Restarting);
                            tracing::info!(pid = old.pid(), "config updated, restarting process");
                            let outcome = self.terminator.stop(&mut old).await;
                            tracing::debug!(outcome = %outcome, "previous process stopped");
                            self.bump_restarts();
                        } else {
                            tracing::info!("config received, starting process");
                        }
                        child = self.ensure_running(&shutdown).await;
                    }
                    Event::Exited(exit) => {
                        child = None;
                        exit.log();
                        self.transition(SupervisorState::Starting);
                        self.clear_process();
                        if !self.pause(self.restart_backoff, &shutdown).await {
                            continue;
                        }
                        tracing::info!("restart process");
                        self.bump_restarts();
                        child = self.ensure_running(&shutdown).await;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn apply_upgrade(
        &mut self,
        ev: UpgradeEvent,
        running: bool,
        shutdown: &CancellationToken,
    ) {
        self.registry.set(ev.module.clone(), ev.hosts.clone());
        if !running {
            tracing::debug!(module = %ev.module, "no process running, hosts buffered for replay");
            return;
        }
        tracing::info!(module = %ev.module, "apply hosts upgrade");
        self.propagate(&ev.module, &ev.hosts, "failed to apply hosts", shutdown).await;
    }

    /// Spawn until it works, then replay the registry.
    ///
    /// Returns `None` only when a stop arrives while waiting to retry.
    async fn ensure_running(&mut self, shutdown: &CancellationToken) -> Option<ChildHandle> {
        loop {
            self.transition(SupervisorState::Starting);
            // The file is written before the slot is signaled, so this
            // spawn already reads whatever a pending update carried.
            while self.config_updated.try_recv().is_ok() {}
            match self.runner.start() {
                Ok(child) => {
                    let (pid, instance) = (child.pid(), child.instance().clone());
                    self.transition(SupervisorState::Running);
                    self.status.send_modify(|s| {
                        s.pid = Some(pid);
                        s.instance = Some(instance);
                        s.started_at = Some(Utc::now());
                    });
                    self.replay(shutdown).await;
                    return Some(child);
                }
                Err(e) => {
                    tracing::error!(error = %e, "start failed");
                    if !self.pause(self.restart_backoff, shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Bring a fresh child up to date with every known module.
    async fn replay(&mut self, shutdown: &CancellationToken) {
        let snapshot = self.registry.snapshot_all();
        if snapshot.is_empty() {
            return;
        }
        tracing::info!(modules = snapshot.len(), "restoring hosts");
        for (module, hosts) in snapshot {
            if self.is_stopping(shutdown) {
                return;
            }
            self.propagate(&module, &hosts, "restore hosts for module", shutdown).await;
        }
    }

    async fn propagate(
        &self,
        module: &ModuleName,
        hosts: &[String],
        failure: &str,
        shutdown: &CancellationToken,
    ) {
        let result = tokio::select! {
            result = self.propagator.send(module.as_str(), hosts) => result,
            _ = self.cancel.cancelled() => return,
            _ = shutdown.cancelled() => return,
        };
        if let Err(e) = result {
            tracing::error!(module = %module, error = %e, "{}", failure);
        }
    }

    async fn shutdown(&mut self, child: Option<ChildHandle>) {
        self.transition(SupervisorState::Stopping);
        if let Some(mut child) = child {
            tracing::info!(pid = child.pid(), "stopping process");
            let outcome = self.terminator.stop(&mut child).await;
            tracing::info!(outcome = %outcome, "process stopped");
        }
        self.clear_process();
        self.transition(SupervisorState::Stopped);
        tracing::info!("supervisor stopped");
    }

    /// Sleep unless a stop arrives first. Returns false on stop.
    async fn pause(&self, duration: Duration, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
            _ = shutdown.cancelled() => false,
        }
    }

    fn is_stopping(&self, shutdown: &CancellationToken) -> bool {
        self.cancel.is_cancelled() || shutdown.is_cancelled()
    }

    fn transition(&self, to: SupervisorState) {
        self.status.send_if_modified(|s| {
            if s.state == to {
                return false;
            }
            if !s.state.can_transition_to(to) {
                tracing::debug!(from = ?s.state, to = ?to, "ignoring illegal transition");
                return false;
            }
            tracing::debug!(from = ?s.state, to = ?to, "state transition");
            s.state = to;
            true
        });
    }

    fn clear_process(&self) {
        self.status.send_modify(|s| {
            s.pid = None;
            s.instance = None;
            s.started_at = None;
        });
    }

    fn bump_restarts(&self) {
        self.status.send_modify(|s| s.restarts += 1);
    }
}

/// Leaves the status `Stopped` however the loop ends, including when the
/// future driving it is dropped. The dropped child handle kills the process.
struct MarkStopped(Arc<watch::Sender<SupervisorStatus>>);

impl Drop for MarkStopped {
    fn drop(&mut self) {
        self.0.send_if_modified(|s| {
            if s.state.is_terminal() {
                return false;
            }
            tracing::warn!(from = ?s.state, "supervisor loop dropped before stopping");
            s.state = SupervisorState::Stopped;
            s.pid = None;
            s.instance = None;
            s.started_at = None;
            true
        });
    }
}

async fn wait_exit(child: &mut Option<ChildHandle>) -> ExitDescription {
    match child {
        Some(child) => child.wait_exit().await,
        None => std::future::pending().await,
    }
}
