//! Request logging.

use tracing::info;

use crate::context::Context;
use crate::handler::{BoxFuture, Flow, Handler};

/// Logs one `info` line per request once the rest of the chain has run.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

pub fn trace() -> Trace {
    Trace
}

impl Handler for Trace {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            ctx.next().await;
            info!(
                method = %ctx.method(),
                path = ctx.path(),
                status = ctx.status_code().as_u16(),
                aborted = ctx.is_aborted(),
                latency_us = ctx.elapsed().as_micros() as u64,
                "request"
            );
            Flow::Next
        })
    }
}
