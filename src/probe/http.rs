//! HTTP transport backed by reqwest.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

use super::{ProbeError, Transport};

/// Identifies the service without exposing anything about the host.
pub const USER_AGENT: &str = concat!("pingkeeper/", env!("CARGO_PKG_VERSION"));

/// Plain GET transport. Redirects are never followed so a target can't
/// bounce the probe onto an internal address.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        // Read the full body so latency covers the complete transfer
        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        Ok(status)
    }
}
