//! Access control for the on-demand endpoints.
//!
//! Session tokens and per-client rate limiting. Both are plain data in,
//! data out; cookies and status codes live in the web layer.

mod rate_limit;
mod session;

pub use rate_limit::*;
pub use session::*;
