//! Supervisor lifecycle state and the status snapshot published to embedders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::InstanceId;

/// Supervisor lifecycle state.
///
/// State transitions:
/// ```text
/// NOT_STARTED → STARTING ⇄ RUNNING → RESTARTING → STARTING
///                  (any) → STOPPING → STOPPED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    NotStarted,
    Starting,
    Running,
    Restarting,
    Stopping,
    Stopped,
}

impl SupervisorState {
    /// Check if this is the terminal state.
    pub fn is_terminal(self) -> bool {
        self == SupervisorState::Stopped
    }

    /// Check if transition is valid.
    pub fn can_transition_to(self, to: SupervisorState) -> bool {
        use SupervisorState::*;
        match (self, to) {
            // STOPPED is terminal
            (Stopped, _) => false,
            (_, Stopping) => self != Stopping,
            (Stopping, Stopped) => true,
            (NotStarted, Starting) => true,
            // Spawn succeeded / spawn retry
            (Starting, Running) => true,
            (Starting, Starting) => true,
            // Config update
            (Running, Restarting) => true,
            (Restarting, Starting) => true,
            // Crash
            (Running, Starting) => true,
            _ => false,
        }
    }
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    /// OS pid of the live child, if any.
    pub pid: Option<u32>,
    pub instance: Option<InstanceId>,
    /// Respawns after the first successful start.
    pub restarts: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            state: SupervisorState::NotStarted,
            pid: None,
            instance: None,
            restarts: 0,
            started_at: None,
        }
    }
}
