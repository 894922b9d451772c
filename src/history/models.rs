//! History record types.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// HTTP status of a probe, or a sentinel when no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The server answered with this code.
    Http(u16),
    /// Every attempt failed at the transport level.
    Error,
    /// The URL was rejected before any request was made.
    Blocked,
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatusCode::Http(code) => serializer.serialize_u16(*code),
            StatusCode::Error => serializer.serialize_str("Error"),
            StatusCode::Blocked => serializer.serialize_str("Blocked"),
        }
    }
}

/// The single result of one logical probe, retries included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    #[serde(rename = "url")]
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "status")]
    pub outcome: Outcome,
    /// Round trip in milliseconds, 0 if not measured.
    #[serde(rename = "response_time")]
    pub latency_ms: u64,
    pub status_code: StatusCode,
    /// Short, caller-safe failure indicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// A probe result as stored, with the uptime computed at record time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub response_time: u64,
    pub status: Outcome,
    pub status_code: StatusCode,
    pub uptime: f64,
}

/// A non-success observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub time: DateTime<Utc>,
    pub status_code: StatusCode,
}

/// Cumulative success/total counts for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UptimeCounter {
    pub success: u64,
    pub total: u64,
}

impl UptimeCounter {
    /// Uptime percentage rounded to 2 decimals, 100.0 before any observation.
    ///
    /// Exact ties round half to even.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let raw = self.success as f64 / self.total as f64 * 100.0;
        // `{:.2}` rounds the exact binary value, so 3.125 becomes 3.12
        format!("{:.2}", raw).parse().unwrap_or(raw)
    }
}

/// Point-in-time metrics for one target, read under a single lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStats {
    pub url: String,
    pub uptime: f64,
    pub success: u64,
    pub total: u64,
    /// Recent non-zero latencies in ms, oldest first.
    pub latencies: Vec<u64>,
    pub incidents: Vec<Incident>,
}

/// Capacity limits applied to every target.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub max_entries: usize,
    pub max_latencies: usize,
    pub max_incidents: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_entries: 20,
            max_latencies: 100,
            max_incidents: 1000,
        }
    }
}
