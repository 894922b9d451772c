//! Pingkeeper - Uptime Monitoring Service
//!
//! Probes a fixed set of URLs on a randomized schedule, keeps a short history
//! and uptime figures for each, and exposes them behind a small authenticated
//! JSON API.

mod auth;
mod config;
mod history;
mod monitor;
mod probe;
mod scheduler;
mod web;

use auth::{Authenticator, RateLimiter};
use config::ServerConfig;
use history::HistoryStore;
use monitor::Monitor;
use probe::{HttpTransport, Prober, RetryPolicy};
use scheduler::{NextCycle, Scheduler};
use web::{AppState, Server};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pingkeeper=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load()?;
    tracing::info!("Starting Pingkeeper on port {}...", cfg.http_port);
    tracing::info!("Monitoring {} targets", cfg.targets.len());
    if cfg.credentials.is_none() {
        tracing::warn!("No login credentials configured, all logins will be refused");
    }
    for target in &cfg.targets {
        if !probe::is_safe(target).await {
            tracing::warn!("Target {} is not publicly routable, probes will be blocked", target);
        }
    }

    // Probe engine
    let store = Arc::new(HistoryStore::new(&cfg.targets, cfg.limits));
    let transport = Arc::new(HttpTransport::new(CONNECT_TIMEOUT, REQUEST_TIMEOUT)?);
    let prober = Arc::new(Prober::new(transport, store, RetryPolicy::default()));
    let next_cycle = Arc::new(NextCycle::new());

    let scheduler = Arc::new(Scheduler::new(prober.clone(), next_cycle.clone(), cfg.cadence));
    let monitor = Arc::new(Monitor::new(prober, next_cycle, cfg.guard_window));

    // Access control
    let auth = match &cfg.session_secret {
        Some(secret) => {
            Authenticator::new(secret.as_bytes(), cfg.session_ttl, cfg.credentials.clone())?
        }
        None => {
            tracing::info!("No session secret configured, generating one for this process");
            Authenticator::with_random_secret(cfg.session_ttl, cfg.credentials.clone())?
        }
    };
    let limiter = RateLimiter::new(cfg.rate_limit_window, cfg.rate_limit_max)
        .with_max_clients(cfg.rate_limit_max_clients);

    // Start scheduler
    let (stop_tx, stop_rx) = broadcast::channel(1);
    let scheduler_task = tokio::spawn(scheduler.run(stop_rx));

    // Start web server
    let state = AppState {
        monitor,
        auth: Arc::new(auth),
        limiter: Arc::new(limiter),
    };
    let server = Server::new(cfg.http_port, state);
    let served = server.start(shutdown_signal()).await;

    let _ = stop_tx.send(());
    scheduler_task.await?;
    tracing::info!("Pingkeeper stopped");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
