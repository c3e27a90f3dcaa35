//! # Warden Core - Child Worker Supervisor
//!
//! Keeps one long-running child worker process alive on behalf of a host
//! service:
//! - Spawns the child with the binding address and config path in its env
//! - Restarts it on crash and on every new configuration
//! - Pushes peer module host lists to it, replaying all of them after each start
//! - Stops it gracefully (process-group SIGTERM, then SIGKILL after a grace period)
//!
//! ## Architecture
//!
//! The supervisor follows a single-actor model where one event loop owns all
//! mutable state:
//! ```text
//!                      ┌─────────────────────────────────┐
//!   update_config  →   │        Supervisor Actor         │
//!   upgrade        →   │  ┌─────────┐ ┌──────────┐       │
//!   stop           →   │  │ Runner  │ │Terminator│       │
//!                      │  └─────────┘ └──────────┘       │
//!                      │  ┌─────────┐ ┌──────────┐       │
//!                      │  │Registry │ │Propagator│ → child
//!                      │  └─────────┘ └──────────┘       │
//!                      └─────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod hosts;
pub mod notifier;
pub mod paths;
pub mod remote_config;
pub mod supervisor;
pub mod types;

// Internal utilities
pub mod observability;

pub use notifier::{HostNotifier, HttpNotifier};
pub use supervisor::{Supervisor, SupervisorState, SupervisorStatus};
pub use types::{Error, Result, SupervisorConfig};
