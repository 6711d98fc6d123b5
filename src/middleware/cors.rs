//! Allow-all CORS.

use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue};
use http::StatusCode;

use crate::context::Context;
use crate::handler::{BoxFuture, Flow, Handler};

/// Sets `Access-Control-Allow-Origin: *` and answers `OPTIONS` with `200 OK`
/// without running the rest of the chain.
///
/// Usually installed with [`Engine::allow_all_cors`](crate::Engine::allow_all_cors),
/// which also routes preflight requests to it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cors;

pub fn cors() -> Cors {
    Cors
}

impl Handler for Cors {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        ctx.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        let flow = if *ctx.method() == http::Method::OPTIONS {
            ctx.status(StatusCode::OK);
            Flow::Stop
        } else {
            Flow::Next
        };
        Box::pin(std::future::ready(flow))
    }
}
