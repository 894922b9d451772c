//! Probe module for uptime monitoring.
//!
//! One probe is a full check of a target: a safety gate, then up to
//! `RetryPolicy::max_attempts` HTTP attempts, collapsed into a single
//! `ProbeResult` that is written to the history store.

mod http;
mod safety;

pub use http::*;
pub use safety::*;

use crate::history::{HistoryStore, Outcome, ProbeResult, StatusCode};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("unsafe target: {0}")]
    Unsafe(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A single HTTP attempt. Returns the response status code.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<u16, ProbeError>;
}

/// Retry ceiling and linear, capped backoff between failed attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(2),
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }
}

/// Runs probes and records their results.
pub struct Prober {
    transport: Arc<dyn Transport>,
    store: Arc<HistoryStore>,
    retry: RetryPolicy,
    // Held for a whole probe so a target is never probed twice at once.
    in_flight: HashMap<String, Arc<Mutex<()>>>,
}

impl Prober {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<HistoryStore>,
        retry: RetryPolicy,
    ) -> Self {
        let in_flight = store
            .targets()
            .iter()
            .map(|t| (t.clone(), Arc::new(Mutex::new(()))))
            .collect();

        Self {
            transport,
            store,
            retry,
            in_flight,
        }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Probe a target and record the outcome.
    pub async fn probe(&self, target: &str) -> ProbeResult {
        let _guard = match self.in_flight.get(target) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let result = self.run(target).await;

        if let Err(e) = self.store.record(target, &result) {
            tracing::error!("Failed to record result for {}: {}", target, e);
        }

        result
    }

    async fn run(&self, target: &str) -> ProbeResult {
        if let Err(e) = check_url(target).await {
            tracing::warn!("Refusing to probe {}: {}", target, e);
            return failure(target, StatusCode::Blocked, "blocked");
        }

        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match self.transport.get(target).await {
                Ok(code) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    let outcome = if (200..300).contains(&code) {
                        Outcome::Success
                    } else {
                        Outcome::Failure
                    };
                    tracing::info!(
                        "Probed {}, status code: {}, response time: {}ms",
                        target,
                        code,
                        latency_ms
                    );
                    return ProbeResult {
                        target: target.to_string(),
                        timestamp: Utc::now(),
                        outcome,
                        latency_ms,
                        status_code: StatusCode::Http(code),
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::warn!("Attempt {} failed to probe {}: {}", attempt, target, e);

                    if attempt >= self.retry.max_attempts {
                        tracing::error!(
                            "All {} attempts to probe {} failed",
                            self.retry.max_attempts,
                            target
                        );
                        let indicator = match e {
                            ProbeError::Timeout(_) => "timeout",
                            _ => "unreachable",
                        };
                        return failure(target, StatusCode::Error, indicator);
                    }

                    let wait = self.retry.backoff(attempt);
                    tracing::info!("Retrying {} in {:?}", target, wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn failure(target: &str, status_code: StatusCode, error: &'static str) -> ProbeResult {
    ProbeResult {
        target: target.to_string(),
        timestamp: Utc::now(),
        outcome: Outcome::Failure,
        latency_ms: 0,
        status_code,
        error: Some(error),
    }
}
