//! Per-client sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Sliding-window request counter keyed by client identity.
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    /// Above this many tracked clients, idle ones are swept.
    max_clients: usize,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            max_clients: 10_000,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    /// Admit a request at `now` unless the client already used its quota.
    /// Rejected requests are not counted.
    pub fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if clients.len() >= self.max_clients && !clients.contains_key(client) {
            clients.retain(|_, w| {
                prune(w, now, self.window);
                !w.is_empty()
            });
        }

        let window = clients.entry(client.to_string()).or_default();
        prune(window, now, self.window);

        if window.len() >= self.max_requests {
            return false;
        }
        window.push_back(now);
        true
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) < length {
            break;
        }
        window.pop_front();
    }
}
