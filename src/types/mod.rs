//! Core types for the supervisor.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (ModuleName, InstanceId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the child command, timings and propagation

mod config;
mod errors;
mod ids;

pub use config::{
    ChildCommand, PropagationConfig, SupervisorConfig, BINDING_ADDRESS_ENV, CONFIG_FILE_ENV,
};
pub use errors::{Error, Result};
pub use ids::{InstanceId, ModuleName};
