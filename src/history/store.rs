//! In-memory per-target history store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::models::*;

/// History store error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistoryError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),
}

/// Everything kept for one target.
#[derive(Debug, Default)]
struct TargetHistory {
    entries: VecDeque<HistoryEntry>,
    latencies: VecDeque<u64>,
    incidents: VecDeque<Incident>,
    counter: UptimeCounter,
}

/// Thread-safe history store.
///
/// The target set is fixed at construction. Each target has its own lock, so
/// writes to one target are serialized while different targets never contend.
pub struct HistoryStore {
    order: Vec<String>,
    targets: HashMap<String, Mutex<TargetHistory>>,
    limits: HistoryLimits,
}

impl HistoryStore {
    /// Create a store with empty state for every target.
    pub fn new(targets: &[String], limits: HistoryLimits) -> Self {
        let order = targets.to_vec();
        let targets = order
            .iter()
            .map(|t| (t.clone(), Mutex::new(TargetHistory::default())))
            .collect();
        Self {
            order,
            targets,
            limits,
        }
    }

    fn lock(&self, target: &str) -> Result<MutexGuard<'_, TargetHistory>, HistoryError> {
        let slot = self
            .targets
            .get(target)
            .ok_or_else(|| HistoryError::UnknownTarget(target.to_string()))?;
        // A panic elsewhere never leaves a half-applied record behind, so the
        // data is still consistent.
        Ok(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Record one probe result and return the stored entry.
    pub fn record(&self, target: &str, result: &ProbeResult) -> Result<HistoryEntry, HistoryError> {
        let mut h = self.lock(target)?;

        h.counter.total += 1;
        if result.outcome.is_success() {
            h.counter.success += 1;
        }

        let entry = HistoryEntry {
            url: target.to_string(),
            timestamp: result.timestamp,
            response_time: result.latency_ms,
            status: result.outcome,
            status_code: result.status_code,
            uptime: h.counter.percentage(),
        };
        push_bounded(&mut h.entries, entry.clone(), self.limits.max_entries);

        if result.latency_ms > 0 {
            push_bounded(&mut h.latencies, result.latency_ms, self.limits.max_latencies);
        }

        if !result.outcome.is_success() {
            let incident = Incident {
                time: result.timestamp,
                status_code: result.status_code,
            };
            push_bounded(&mut h.incidents, incident, self.limits.max_incidents);
        }

        Ok(entry)
    }

    /// Current uptime percentage for a target.
    pub fn uptime(&self, target: &str) -> Option<f64> {
        self.lock(target).ok().map(|h| h.counter.percentage())
    }

    /// Chronological snapshot of a target's recent entries.
    pub fn history(&self, target: &str) -> Option<Vec<HistoryEntry>> {
        self.lock(target)
            .ok()
            .map(|h| h.entries.iter().cloned().collect())
    }

    /// Counters, latency series and incident log of a target.
    pub fn stats(&self, target: &str) -> Option<TargetStats> {
        self.lock(target).ok().map(|h| TargetStats {
            url: target.to_string(),
            uptime: h.counter.percentage(),
            success: h.counter.success,
            total: h.counter.total,
            latencies: h.latencies.iter().copied().collect(),
            incidents: h.incidents.iter().cloned().collect(),
        })
    }

    /// History of every target, in configured order.
    pub fn snapshot(&self) -> Vec<(String, Vec<HistoryEntry>)> {
        self.order
            .iter()
            .map(|t| (t.clone(), self.history(t).unwrap_or_default()))
            .collect()
    }

    pub fn targets(&self) -> &[String] {
        &self.order
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while buf.len() >= cap {
        buf.pop_front();
    }
    buf.push_back(item);
}
