//! Terminator - graceful-then-forceful stop of a child process tree.
//!
//! On unix the child leads its own process group and the whole group is
//! signaled, so interpreters that fork helpers do not leak them. Elsewhere
//! only the direct process can be reached.

use std::fmt;
use std::time::Duration;

use super::runner::{ChildHandle, ExitDescription};

/// How a stop request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process exited within the grace period.
    Graceful(ExitDescription),
    /// The grace period ran out and the process was killed. `reaped` is the
    /// exit observed after the kill, if it arrived in time.
    Forced { reaped: Option<ExitDescription> },
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful(exit) => write!(f, "graceful ({})", exit),
            Self::Forced { reaped: Some(exit) } => write!(f, "forced ({})", exit),
            Self::Forced { reaped: None } => write!(f, "forced (exit not observed)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStrategy {
    /// Signal the child's process group.
    ProcessGroup,
    /// Signal only the child itself.
    SingleProcess,
}

impl TerminationStrategy {
    pub fn for_platform() -> Self {
        if cfg!(unix) {
            Self::ProcessGroup
        } else {
            Self::SingleProcess
        }
    }
}

/// Whom the signals go to, decided per stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Group(i32),
    Process(u32),
}

#[derive(Debug, Clone)]
pub struct Terminator {
    strategy: TerminationStrategy,
    grace_period: Duration,
    reap_timeout: Duration,
}

impl Terminator {
    pub fn new(
        strategy: TerminationStrategy,
        grace_period: Duration,
        reap_timeout: Duration,
    ) -> Self {
        Self {
            strategy,
            grace_period,
            reap_timeout,
        }
    }

    /// Stop the child: SIGTERM, wait up to the grace period, then SIGKILL.
    ///
    /// Never hangs: bounded by `grace_period + reap_timeout`.
    pub async fn stop(&self, child: &mut ChildHandle) -> TerminationOutcome {
        let target = self.resolve_target(child);

        if let Err(e) = send_graceful(target, child) {
            tracing::warn!(error = %e, ?target, "failed to send SIGTERM, killing");
            return self.force(target, child).await;
        }

        match tokio::time::timeout(self.grace_period, child.wait_exit()).await {
            Ok(exit) => {
                exit.log();
                TerminationOutcome::Graceful(exit)
            }
            Err(_) => {
                tracing::warn!(
                    ?target,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "timeout, sending SIGKILL"
                );
                self.force(target, child).await
            }
        }
    }

    async fn force(&self, target: Target, child: &mut ChildHandle) -> TerminationOutcome {
        if let Err(e) = send_kill(target, child) {
            tracing::warn!(error = %e, ?target, "failed to send SIGKILL");
        }
        let reaped = tokio::time::timeout(self.reap_timeout, child.wait_exit())
            .await
            .ok();
        match &reaped {
            Some(exit) => tracing::info!(exit = %exit, "process killed after timeout"),
            None => tracing::warn!(pid = child.pid(), "killed process did not report exit"),
        }
        TerminationOutcome::Forced { reaped }
    }

    fn resolve_target(&self, child: &ChildHandle) -> Target {
        if self.strategy == TerminationStrategy::SingleProcess || !child.own_group() {
            return Target::Process(child.pid());
        }
        match process_group_of(child.pid()) {
            Ok(pgid) => {
                tracing::debug!(pid = child.pid(), pgid, "resolved process group");
                Target::Group(pgid)
            }
            Err(e) => {
                tracing::warn!(
                    pid = child.pid(),
                    error = %e,
                    "failed to get pgid, signaling process directly"
                );
                Target::Process(child.pid())
            }
        }
    }
}

#[cfg(unix)]
mod os {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::{getpgid, Pid};

    pub(super) fn pgid(pid: u32) -> Result<i32, String> {
        let pid = i32::try_from(pid).map_err(|e| e.to_string())?;
        getpgid(Some(Pid::from_raw(pid)))
            .map(Pid::as_raw)
            .map_err(|e| e.to_string())
    }

    pub(super) fn signal_group(pgid: i32, signal: Signal) -> Result<(), String> {
        killpg(Pid::from_raw(pgid), signal).map_err(|e| e.to_string())
    }

    pub(super) fn signal_process(pid: u32, signal: Signal) -> Result<(), String> {
        let pid = i32::try_from(pid).map_err(|e| e.to_string())?;
        kill(Pid::from_raw(pid), signal).map_err(|e| e.to_string())
    }
}

#[cfg(unix)]
fn process_group_of(pid: u32) -> Result<i32, String> {
    os::pgid(pid)
}

#[cfg(not(unix))]
fn process_group_of(_pid: u32) -> Result<i32, String> {
    Err("process groups unsupported on this platform".to_string())
}

#[cfg(unix)]
fn send_graceful(target: Target, _child: &mut ChildHandle) -> Result<(), String> {
    use nix::sys::signal::Signal;
    tracing::info!(?target, "sending SIGTERM");
    match target {
        Target::Group(pgid) => os::signal_group(pgid, Signal::SIGTERM),
        Target::Process(pid) => os::signal_process(pid, Signal::SIGTERM),
    }
}

// No SIGTERM equivalent for a plain process handle: report failure so the
// caller escalates straight to a kill.
#[cfg(not(unix))]
fn send_graceful(_target: Target, _child: &mut ChildHandle) -> Result<(), String> {
    Err("graceful termination unsupported on this platform".to_string())
}

#[cfg(unix)]
fn send_kill(target: Target, child: &mut ChildHandle) -> Result<(), String> {
    use nix::sys::signal::Signal;
    match target {
        Target::Group(pgid) => os::signal_group(pgid, Signal::SIGKILL).or_else(|e| {
            // The leader may still be reachable even if the group is not.
            if child.request_kill() {
                Ok(())
            } else {
                Err(e)
            }
        }),
        Target::Process(_) => {
            if child.request_kill() {
                Ok(())
            } else {
                Err("process already reaped".to_string())
            }
        }
    }
}

#[cfg(not(unix))]
fn send_kill(_target: Target, child: &mut ChildHandle) -> Result<(), String> {
    if child.request_kill() {
        Ok(())
    } else {
        Err("process already reaped".to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::runner::ProcessRunner;
    use crate::types::{ChildCommand, SupervisorConfig};
    use std::time::Instant;

    fn spawn(script: &str, group: bool) -> ChildHandle {
        let config = SupervisorConfig::new("127.0.0.1:9000", "/tmp/warden-term.json", script)
            .with_command(ChildCommand::new("/bin/sh").args(["-c"]));
        ProcessRunner::new(config, group).start().unwrap()
    }

    // Zombies count as dead: the orphan may wait a while for its reaper.
    #[cfg(target_os = "linux")]
    fn alive(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .map(|state| state != "Z")
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn terminator(grace: Duration) -> Terminator {
        Terminator::new(TerminationStrategy::ProcessGroup, grace, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_graceful_stop() {
        let mut child = spawn("sleep 30", true);
        let outcome = terminator(Duration::from_secs(5)).stop(&mut child).await;
        assert_eq!(
            outcome,
            TerminationOutcome::Graceful(ExitDescription::Signaled { signal: 15 })
        );
    }

    #[tokio::test]
    async fn test_forced_stop_when_term_ignored() {
        let mut child = spawn("trap '' TERM; sleep 30", true);
        // Let the shell install its trap before signaling.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        let outcome = terminator(Duration::from_millis(300)).stop(&mut child).await;

        assert_eq!(
            outcome,
            TerminationOutcome::Forced {
                reaped: Some(ExitDescription::Signaled { signal: 9 })
            }
        );
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_group_stop_reaches_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let mut child = spawn(&script, true);

        let grandchild = loop {
            if let Ok(raw) = std::fs::read_to_string(&pid_file) {
                if let Ok(pid) = raw.trim().parse::<i32>() {
                    break pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        };
        assert!(alive(grandchild));

        let outcome = terminator(Duration::from_secs(5)).stop(&mut child).await;
        assert!(matches!(outcome, TerminationOutcome::Graceful(_)));

        // SIGTERM delivery to the orphan is asynchronous; give it a moment.
        let deadline = Instant::now() + Duration::from_secs(2);
        while alive(grandchild) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive(grandchild));
    }

    #[tokio::test]
    async fn test_single_process_fallback() {
        let mut child = spawn("sleep 30", false);
        let terminator = Terminator::new(
            TerminationStrategy::SingleProcess,
            Duration::from_secs(5),
            Duration::from_secs(2),
        );
        let outcome = terminator.stop(&mut child).await;
        assert!(matches!(outcome, TerminationOutcome::Graceful(_)));
    }

    #[tokio::test]
    async fn test_stop_already_exited() {
        let mut child = spawn("exit 0", true);
        let _ = child.wait_exit().await;
        let outcome = terminator(Duration::from_millis(200)).stop(&mut child).await;
        // Signals fail on a reaped pid; the cached exit is still reported.
        assert!(matches!(
            outcome,
            TerminationOutcome::Forced { reaped: Some(ExitDescription::Exited { code: 0 }) }
                | TerminationOutcome::Graceful(ExitDescription::Exited { code: 0 })
        ));
    }
}
