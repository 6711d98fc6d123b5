//! Frozen dispatch table and per-request lifecycle.
//!
//! A [`Router`] comes out of [`Engine::apply`](crate::Engine::apply) and is
//! never mutated afterwards; share it behind an `Arc` and call
//! [`Router::handle`] for every request.
//!
//! # Request lifecycle
//!
//! ```text
//! exact path lookup ── miss ──────────────► 404
//!        │
//! verb lookup ──────── miss ──────────────► 405   (OPTIONS + CORS → preflight)
//!        │
//! ┌──────┴─────────── panic boundary ───────────────────────────┐
//! │ Context::new   (session token from `Authorization: Bearer`)  │
//! │ auth hook      (only for routes marked `.auth()`/`.roles()`) │
//! │ body parse     (failure → abort with 500 JSON)               │
//! │ ctx.next()     (chain from index 0)                          │
//! └──────┬───────────────────────────────────────────────────────┘
//!        ▼
//! buffered response
//! ```
//!
//! # Panics in handlers
//!
//! A panic anywhere inside the boundary is caught and logged with the
//! endpoint, the panic message, and the request body. No handler after the
//! panicking one runs and nothing is written on the panic's behalf: if a
//! status had been written, that partial response goes out; otherwise
//! [`Router::handle`] returns [`Error::Panicked`] and the connection is
//! dropped without a response.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Body;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::body;
use crate::config::Config;
use crate::context::{Context, RoleId};
use crate::error::Error;
use crate::handler::{BoxedAuthHook, BoxedHandler};
use crate::method::Method;
use crate::response;

/// A route frozen by `apply`: final path, full chain.
pub(crate) struct Endpoint {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) chain: Arc<[BoxedHandler]>,
    pub(crate) requires_auth: bool,
    pub(crate) allowed_roles: Arc<[RoleId]>,
}

/// The immutable dispatch table.
pub struct Router {
    endpoints: HashMap<String, Vec<Endpoint>>,
    auth: Option<BoxedAuthHook>,
    preflight: Option<Arc<[BoxedHandler]>>,
    config: Config,
}

/// What a request resolved to.
struct Target<'r> {
    path: &'r str,
    chain: Arc<[BoxedHandler]>,
    requires_auth: bool,
    allowed_roles: Arc<[RoleId]>,
}

impl Router {
    pub(crate) fn new(auth: Option<BoxedAuthHook>, cors: Option<BoxedHandler>, config: Config) -> Self {
        Self {
            endpoints: HashMap::new(),
            auth,
            preflight: cors.map(|cors| Arc::from([cors])),
            config,
        }
    }

    pub(crate) fn mount(&mut self, endpoint: Endpoint) {
        let same_path = self.endpoints.entry(endpoint.path.clone()).or_default();
        if same_path.iter().any(|e| e.method == endpoint.method) {
            panic!("duplicate route `{} {}`", endpoint.method, endpoint.path);
        }
        same_path.push(endpoint);
    }

    /// Every mounted `(verb, final path)` pair, in no particular order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.endpoints
            .values()
            .flatten()
            .map(|e| (e.method, e.path.as_str()))
    }

    /// Dispatches one request through its route's chain.
    ///
    /// Misses are answered here (`404`, `405`); everything else is whatever
    /// the chain wrote, `200 OK` with an empty body if it wrote nothing.
    pub async fn handle<B>(&self, req: http::Request<B>) -> Result<http::Response<Full<Bytes>>, Error>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(target) = self.resolve(req.method(), req.uri().path()) else {
            return Ok(self.miss(req.method(), req.uri().path()));
        };

        let mut ctx = Context::new(
            req.map(body::boxed),
            target.path.to_owned(),
            target.chain,
            target.allowed_roles,
            self.config.max_multipart_bytes,
        );

        let outcome = AssertUnwindSafe(self.run(&mut ctx, target.requires_auth))
            .catch_unwind()
            .await;

        match outcome {
            Ok(()) => Ok(ctx.into_response()),
            Err(panic) => recover(ctx, panic_message(panic.as_ref())).await,
        }
    }

    fn resolve(&self, method: &http::Method, path: &str) -> Option<Target<'_>> {
        let candidates = self.endpoints.get(path)?;

        if let Some(e) = candidates.iter().find(|e| e.method.matches(method)) {
            return Some(Target {
                path: &e.path,
                chain: Arc::clone(&e.chain),
                requires_auth: e.requires_auth,
                allowed_roles: Arc::clone(&e.allowed_roles),
            });
        }

        let chain = self.preflight.as_ref().filter(|_| *method == http::Method::OPTIONS)?;
        Some(Target {
            path: &candidates[0].path,
            chain: Arc::clone(chain),
            requires_auth: false,
            allowed_roles: Arc::from([]),
        })
    }

    fn miss(&self, method: &http::Method, path: &str) -> http::Response<Full<Bytes>> {
        if self.endpoints.contains_key(path) {
            debug!(%method, path, "method not allowed");
            response::empty(StatusCode::METHOD_NOT_ALLOWED)
        } else {
            debug!(%method, path, "no route");
            response::text(StatusCode::NOT_FOUND, "404 page not found")
        }
    }

    async fn run(&self, ctx: &mut Context, requires_auth: bool) {
        if requires_auth {
            if let Some(hook) = &self.auth {
                hook.call(ctx).await;
            }
        }

        if let Err(e) = ctx.parse_body().await {
            warn!(path = ctx.path(), "parsing request body: {e}");
            // An auth rejection already owns the response.
            if ctx.is_aborted() {
                return;
            }
            ctx.abort_with_status_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "couldn't parse request body" }),
            );
        }

        ctx.next().await;
    }

    #[cfg(test)]
    pub(crate) fn chain_len(&self, method: Method, path: &str) -> Option<usize> {
        self.endpoints
            .get(path)?
            .iter()
            .find(|e| e.method == method)
            .map(|e| e.chain.len())
    }
}

async fn recover(mut ctx: Context, message: String) -> Result<http::Response<Full<Bytes>>, Error> {
    let body = ctx.remaining_body().await;
    error!(
        endpoint = ctx.path(),
        body = %String::from_utf8_lossy(&body),
        "panic recovered: {message}"
    );

    if ctx.response_started() {
        Ok(ctx.into_response())
    } else {
        Err(Error::Panicked { endpoint: ctx.path().to_owned() })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
