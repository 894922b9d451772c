//! Scheduler module for running probe cycles.

mod cadence;

pub use cadence::*;

use crate::probe::Prober;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// The background task that probes every target on a randomized cadence.
pub struct Scheduler {
    targets: Vec<String>,
    prober: Arc<Prober>,
    next_cycle: Arc<NextCycle>,
    cadence: Cadence,
}

impl Scheduler {
    pub fn new(prober: Arc<Prober>, next_cycle: Arc<NextCycle>, cadence: Cadence) -> Self {
        Self {
            targets: prober.store().targets().to_vec(),
            prober,
            next_cycle,
            cadence,
        }
    }

    /// Run cycles until a stop signal arrives.
    pub async fn run(self: Arc<Self>, stop: broadcast::Receiver<()>) {
        self.run_with_rng(StdRng::from_entropy(), stop).await
    }

    pub(crate) async fn run_with_rng(
        self: Arc<Self>,
        mut rng: StdRng,
        mut stop: broadcast::Receiver<()>,
    ) {
        tracing::info!("Starting scheduler with {} targets", self.targets.len());

        loop {
            // Each cycle runs as its own task so a panic inside one cannot take
            // the scheduler down with it.
            let this = self.clone();
            let cycle_rng = StdRng::seed_from_u64(rng.gen());
            let mut cycle = tokio::spawn(async move { this.run_cycle(cycle_rng).await });

            tokio::select! {
                _ = stop.recv() => {
                    cycle.abort();
                    break;
                }
                joined = &mut cycle => {
                    if let Err(e) = joined {
                        tracing::error!("Probe cycle failed: {}", e);
                    }
                }
            }

            let delay = self.cadence.next_cycle_delay(&mut rng);
            let deadline = Instant::now() + delay;
            self.next_cycle.publish(deadline);
            tracing::info!("Completed all probes. Sleeping for {} seconds...", delay.as_secs());

            tokio::select! {
                _ = stop.recv() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }

    async fn run_cycle(&self, mut rng: StdRng) {
        tracing::info!("Starting a new probe cycle...");

        let mut order = self.targets.clone();
        order.shuffle(&mut rng);

        for target in &order {
            self.prober.probe(target).await;

            let gap = self.cadence.next_probe_gap(&mut rng);
            tracing::debug!("Sleeping for {} seconds before the next probe", gap.as_secs());
            tokio::time::sleep(gap).await;
        }

        let store = self.prober.store();
        for target in &self.targets {
            if let Some(uptime) = store.uptime(target) {
                tracing::info!("Uptime for {}: {:.2}%", target, uptime);
            }
        }
    }
}
