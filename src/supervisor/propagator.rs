//! Propagator - delivers host lists to the running child with bounded retry.

use std::sync::Arc;
use tokio::time::Instant;

use super::backoff::BackoffPolicy;
use crate::notifier::HostNotifier;
use crate::types::{Error, Result};

/// Wraps a [`HostNotifier`] with exponential backoff inside a time budget.
///
/// Every attempt is capped by the remaining budget, so `send` returns within
/// `max_elapsed` even if the child never answers.
#[derive(Debug, Clone)]
pub struct Propagator {
    notifier: Arc<dyn HostNotifier>,
    policy: BackoffPolicy,
}

impl Propagator {
    pub fn new(notifier: Arc<dyn HostNotifier>, policy: BackoffPolicy) -> Self {
        Self { notifier, policy }
    }

    pub async fn send(&self, module: &str, hosts: &[String]) -> Result<()> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            let remaining = self.policy.max_elapsed.saturating_sub(started.elapsed());
            attempts += 1;

            let err = match tokio::time::timeout(
                remaining,
                self.notifier.receive_module_addresses(module, hosts),
            )
            .await
            {
                Ok(Ok(())) => {
                    if attempts > 1 {
                        tracing::debug!(module, attempts, "hosts delivered after retry");
                    }
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => Error::notify("attempt timed out"),
            };

            if !err.is_retryable() {
                return Err(delivery_error(module, attempts, &err));
            }

            match self.policy.next_delay(attempts - 1, started.elapsed()) {
                Some(delay) => {
                    tracing::debug!(
                        module,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "host delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(delivery_error(module, attempts, &err)),
            }
        }
    }
}

fn delivery_error(module: &str, attempts: u32, err: &Error) -> Error {
    Error::Delivery {
        module: module.to_string(),
        attempts,
        reason: err.to_string(),
    }
}
