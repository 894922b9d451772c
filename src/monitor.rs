//! On-demand monitoring operations.
//!
//! Everything the web layer can ask of the engine: the time until the next
//! scheduled cycle, manual probes, history and per-target stats. Manual probes are
//! refused inside the guard window so they never race a scheduled cycle.

use crate::history::{HistoryEntry, HistoryStore, ProbeResult, TargetStats};
use crate::probe::Prober;
use crate::scheduler::NextCycle;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Within this long of the next cycle it is reported as imminent.
const IMMINENT: Duration = Duration::from_secs(10);

/// Monitor error types.
#[derive(Error, Debug, PartialEq)]
pub enum MonitorError {
    #[error("invalid target index {0}")]
    InvalidIndex(usize),
    #[error("scheduled probe imminent, retry in {remaining:?}")]
    SchedulingConflict { remaining: Duration },
}

/// Time until the next scheduled cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleStatus {
    pub imminent: bool,
    #[serde(rename = "remainingTime")]
    pub remaining_seconds: f64,
}

/// One entry of a probe-all run.
#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub url: String,
    pub result: ProbeResult,
}

pub struct Monitor {
    targets: Vec<String>,
    prober: Arc<Prober>,
    next_cycle: Arc<NextCycle>,
    guard_window: Duration,
    probe_all_delay: Duration,
}

impl Monitor {
    pub fn new(prober: Arc<Prober>, next_cycle: Arc<NextCycle>, guard_window: Duration) -> Self {
        Self {
            targets: prober.store().targets().to_vec(),
            prober,
            next_cycle,
            guard_window,
            probe_all_delay: Duration::from_secs(1),
        }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        self.prober.store()
    }

    pub fn check_remaining_time(&self) -> ScheduleStatus {
        let remaining = self.next_cycle.time_remaining();
        ScheduleStatus {
            imminent: remaining <= IMMINENT,
            remaining_seconds: remaining.as_secs_f64(),
        }
    }

    fn ensure_clear_of_schedule(&self) -> Result<(), MonitorError> {
        let remaining = self.next_cycle.time_remaining();
        if remaining <= self.guard_window {
            tracing::info!(
                "Refusing manual probe, scheduled cycle in {:.0}s",
                remaining.as_secs_f64()
            );
            return Err(MonitorError::SchedulingConflict { remaining });
        }
        Ok(())
    }

    /// Probe the target at `index` now.
    pub async fn probe_one(&self, index: usize) -> Result<ProbeResult, MonitorError> {
        let target = self
            .targets
            .get(index)
            .ok_or(MonitorError::InvalidIndex(index))?;
        self.ensure_clear_of_schedule()?;

        tracing::info!("Manual probe of {}", target);
        Ok(self.prober.probe(target).await)
    }

    /// Probe every target in configured order.
    pub async fn probe_all(&self) -> Result<Vec<TargetResult>, MonitorError> {
        self.ensure_clear_of_schedule()?;

        tracing::info!("Manual probe of all {} targets", self.targets.len());
        let mut results = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let result = self.prober.probe(target).await;
            results.push(TargetResult {
                url: target.clone(),
                result,
            });
            tokio::time::sleep(self.probe_all_delay).await;
        }
        Ok(results)
    }

    pub fn get_history(&self) -> Vec<(String, Vec<HistoryEntry>)> {
        self.store().snapshot()
    }

    /// Uptime, latency series and incidents for every target, in configured order.
    pub fn get_stats(&self) -> Vec<TargetStats> {
        self.targets
            .iter()
            .filter_map(|t| self.store().stats(t))
            .collect()
    }
}
