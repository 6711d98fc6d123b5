//! Built-in health-check handlers.
//!
//! | Probe | Typical path | Body |
//! |---|---|---|
//! | **Liveness** | `/healthz` | `{"status":"ok"}` |
//! | **Readiness** | `/readyz` | `{"status":"ready"}` |
//!
//! ```rust,no_run
//! use strand::{Engine, health};
//!
//! let mut engine = Engine::new();
//! engine.get("/healthz", health::liveness);
//! engine.get("/readyz", health::readiness);
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependencies
//! (database connections, downstream services, …).

use http::StatusCode;
use serde_json::json;

use crate::{BoxFuture, Context, Flow};

/// Always `200 OK` with `{"status":"ok"}`. If the process can answer, it is alive.
pub fn liveness(c: &mut Context) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        // A `Value` always encodes.
        let _ = c.json(StatusCode::OK, &json!({ "status": "ok" }));
        Flow::Next
    })
}

/// `200 OK` with `{"status":"ready"}`.
pub fn readiness(c: &mut Context) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        let _ = c.json(StatusCode::OK, &json!({ "status": "ready" }));
        Flow::Next
    })
}
