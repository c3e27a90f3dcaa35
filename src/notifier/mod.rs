//! Host-address notification boundary.
//!
//! The child learns about peer addresses through a single call carrying a
//! module name and its host list. [`HostNotifier`] is that call, one attempt
//! per invocation; retrying is the propagator's job.

mod http;

use async_trait::async_trait;

use crate::types::Result;

pub use http::{HttpNotifier, RECEIVE_MODULE_ADDRESSES_PATH};

/// One delivery attempt of a module's host list to the running child.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostNotifier: Send + Sync + std::fmt::Debug {
    async fn receive_module_addresses(&self, module: &str, hosts: &[String]) -> Result<()>;
}
