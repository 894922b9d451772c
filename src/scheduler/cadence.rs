//! Randomized probe cadence and the published next-cycle deadline.

use rand::Rng;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for any drawn delay.
pub const MAX_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Bounds for the random delays the scheduler draws.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub probe_gap_min: Duration,
    pub probe_gap_max: Duration,
    pub cycle_min: Duration,
    pub cycle_max: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            probe_gap_min: Duration::from_secs(5),
            probe_gap_max: Duration::from_secs(15),
            cycle_min: Duration::from_secs(120),
            cycle_max: Duration::from_secs(600),
        }
    }
}

impl Cadence {
    /// Pause between two probes of the same cycle.
    pub fn next_probe_gap<R: Rng>(&self, rng: &mut R) -> Duration {
        uniform_secs(rng, self.probe_gap_min, self.probe_gap_max)
    }

    /// Idle time between the end of a cycle and the start of the next.
    pub fn next_cycle_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        uniform_secs(rng, self.cycle_min, self.cycle_max)
    }
}

/// Whole seconds drawn uniformly from `min..=max`, both clamped to `MAX_DELAY`.
fn uniform_secs<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    let cap = MAX_DELAY.as_secs();
    let (lo, hi) = (min.as_secs().min(cap), max.as_secs().min(cap));
    if hi <= lo {
        return Duration::from_secs(lo);
    }
    Duration::from_secs(rng.gen_range(lo..=hi))
}

/// Start time of the next scheduled cycle, shared with on-demand callers.
#[derive(Debug)]
pub struct NextCycle {
    deadline: Mutex<Instant>,
}

impl Default for NextCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl NextCycle {
    /// Starts out due immediately: the first cycle runs at startup.
    pub fn new() -> Self {
        Self {
            deadline: Mutex::new(Instant::now()),
        }
    }

    pub fn publish(&self, at: Instant) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time until the next cycle, zero once it is due or running.
    pub fn time_remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }
}
