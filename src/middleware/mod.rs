//! Built-in middleware.
//!
//! Middleware are ordinary [`Handler`](crate::Handler)s placed ahead of the
//! terminal handler in a chain:
//!
//! - [`cors`]: permissive CORS, short-circuits `OPTIONS`
//! - [`trace`]: per-request log line with method, path, status, latency

mod cors;
mod trace;

pub use cors::{Cors, cors};
pub use trace::{Trace, trace};
