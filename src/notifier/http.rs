//! HTTP notifier talking to the child's address endpoint.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::HostNotifier;
use crate::types::{Error, Result};

pub const RECEIVE_MODULE_ADDRESSES_PATH: &str = "/receive_module_addresses";

#[derive(Debug, Serialize)]
struct ModuleAddresses<'a> {
    module: &'a str,
    hosts: &'a [String],
}

/// Posts `{"module", "hosts"}` as JSON to the child. Any 2xx is accepted.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                RECEIVE_MODULE_ADDRESSES_PATH
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl HostNotifier for HttpNotifier {
    async fn receive_module_addresses(&self, module: &str, hosts: &[String]) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ModuleAddresses { module, hosts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::notify(format!(
                "call endpoint {}: status code {}",
                RECEIVE_MODULE_ADDRESSES_PATH,
                status.as_u16()
            )));
        }
        tracing::debug!(module, hosts = hosts.len(), "module addresses delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let notifier = HttpNotifier::with_client(reqwest::Client::new(), "http://127.0.0.1:9000/");
        assert_eq!(
            notifier.endpoint(),
            "http://127.0.0.1:9000/receive_module_addresses"
        );
    }

    #[test]
    fn test_payload_shape() {
        let hosts = vec!["h1:9000".to_string(), "h2:9000".to_string()];
        let body = serde_json::to_value(ModuleAddresses {
            module: "auth",
            hosts: &hosts,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "module": "auth", "hosts": ["h1:9000", "h2:9000"] })
        );
    }
}
