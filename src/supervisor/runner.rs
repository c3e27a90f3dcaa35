//! Process runner - spawns one child instance and watches for its exit.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::types::{
    Error, InstanceId, Result, SupervisorConfig, BINDING_ADDRESS_ENV, CONFIG_FILE_ENV,
};

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDescription {
    /// Exited on its own with a status code.
    Exited { code: i32 },
    /// Terminated by a signal (unix).
    Signaled { signal: i32 },
    /// Waiting on the process failed; its fate is unknown.
    WaitFailed(String),
}

impl ExitDescription {
    pub fn from_wait(result: std::io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) => Self::from_status(status),
            Err(e) => Self::WaitFailed(e.to_string()),
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled { signal };
            }
        }
        Self::WaitFailed(format!("unexpected exit status: {}", status))
    }

    /// Emit the exit at a level matching how it happened.
    pub fn log(&self) {
        match self {
            Self::Exited { code: 0 } => tracing::info!("process exited gracefully"),
            Self::Exited { code } => tracing::info!(code, "process exited"),
            Self::Signaled { .. } => tracing::info!(signal = %self, "process exited"),
            Self::WaitFailed(error) => tracing::warn!(error = %error, "process wait error"),
        }
    }
}

impl fmt::Display for ExitDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exit code {}", code),
            Self::Signaled { signal } => write!(f, "{}", signal_name(*signal)),
            Self::WaitFailed(error) => write!(f, "wait failed: {}", error),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signal))
}

#[cfg(not(unix))]
fn signal_name(signal: i32) -> String {
    format!("signal {}", signal)
}

/// One spawned child process.
///
/// The process itself is owned by a background watcher task; this handle
/// receives the exit exactly once and can ask the watcher to kill.
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct ChildHandle {
    pid: u32,
    instance: InstanceId,
    own_group: bool,
    exit_rx: oneshot::Receiver<ExitDescription>,
    kill_tx: Option<oneshot::Sender<()>>,
    exited: Option<ExitDescription>,
}

impl ChildHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Whether the child was made leader of its own process group.
    pub fn own_group(&self) -> bool {
        self.own_group
    }

    /// Wait for the process to end. Cancel-safe; repeat calls return the
    /// same description.
    pub async fn wait_exit(&mut self) -> ExitDescription {
        if let Some(exit) = &self.exited {
            return exit.clone();
        }
        let exit = (&mut self.exit_rx)
            .await
            .unwrap_or_else(|_| ExitDescription::WaitFailed("exit watcher dropped".to_string()));
        self.exited = Some(exit.clone());
        exit
    }

    /// Ask the watcher to kill the process directly (SIGKILL on unix,
    /// TerminateProcess elsewhere). Only the first request has an effect.
    pub fn request_kill(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Spawns child processes from a [`SupervisorConfig`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: SupervisorConfig,
    new_process_group: bool,
}

impl ProcessRunner {
    /// `new_process_group` makes each child the leader of a fresh process
    /// group (unix only), so the whole tree can be signaled at once.
    pub fn new(config: SupervisorConfig, new_process_group: bool) -> Self {
        Self {
            config,
            new_process_group: new_process_group && cfg!(unix),
        }
    }

    fn command(&self) -> Command {
        let spec = &self.config.command;
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .arg(&self.config.module_path)
            .envs(&spec.env)
            .env(BINDING_ADDRESS_ENV, &self.config.binding_address)
            .env(CONFIG_FILE_ENV, &self.config.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            if self.new_process_group {
                cmd.process_group(0);
            }
        }

        cmd
    }

    /// Spawn a new instance and start watching it.
    pub fn start(&self) -> Result<ChildHandle> {
        let child = self.command().spawn().map_err(|source| Error::Spawn {
            program: self.config.command.program.clone(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::internal("spawned child has no pid"))?;
        let instance = InstanceId::new();

        tracing::info!(
            pid,
            instance = %instance,
            binding_address = %self.config.binding_address,
            config_path = %self.config.config_path.display(),
            module_path = %self.config.module_path.display(),
            "child process started"
        );

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_exit(child, exit_tx, kill_rx));

        Ok(ChildHandle {
            pid,
            instance,
            own_group: self.new_process_group,
            exit_rx,
            kill_tx: Some(kill_tx),
            exited: None,
        })
    }
}

async fn watch_exit(
    mut child: Child,
    exit_tx: oneshot::Sender<ExitDescription>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let result = tokio::select! {
        result = child.wait() => result,
        // A dropped handle counts as a kill request.
        _ = &mut kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill process");
            }
            child.wait().await
        }
    };
    let _ = exit_tx.send(ExitDescription::from_wait(result));
}
