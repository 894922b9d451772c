//! History module for Pingkeeper.
//!
//! Bounded, in-memory probe history and uptime counters per target.

mod models;
mod store;

pub use models::*;
pub use store::*;
