//! # strand
//!
//! A minimal HTTP routing and middleware-chain core.
//!
//! Register endpoints by exact path and verb, bundle them into prefixed groups
//! that share middleware, and every request runs through an ordered chain of
//! handlers over one mutable [`Context`]. Each handler decides whether the
//! chain continues, stops, or aborts.
//!
//! ## What it does
//!
//! - Exact-path, exact-verb routing, with `404` / `405` on a miss
//! - Ordered chains: global → group → route middleware, then the handler
//! - Abort that reaches every pending `next()` up the stack
//! - One-shot body buffering (raw bytes, url-encoded forms, 5 MiB multipart)
//! - JSON binding with declarative `required` / `email` field rules
//! - An optional bearer-token auth hook per route
//! - Panic containment per request
//!
//! What it does not: path parameters, wildcards, sessions, TLS.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use serde_json::json;
//! use strand::{BoxFuture, Context, Engine, Flow, Server, auth_hook};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut engine = Engine::new();
//!     engine.allow_all_cors();
//!     engine.use_auth(auth_hook(|c| Box::pin(async move {
//!         if c.client().session_token != "secret" {
//!             c.abort_with_status(StatusCode::UNAUTHORIZED);
//!         }
//!     })));
//!
//!     engine.get("/health", health);
//!     engine.group("admin").get("/stats", health).auth();
//!
//!     Server::bind("0.0.0.0:3000").serve(engine.apply()).await.unwrap();
//! }
//!
//! fn health(c: &mut Context) -> BoxFuture<'_, Flow> {
//!     Box::pin(async move {
//!         c.json(StatusCode::OK, &json!({ "status": "ok" })).ok();
//!         Flow::Next
//!     })
//! }
//! ```

mod body;
mod config;
mod context;
mod engine;
mod error;
mod handler;
mod method;
mod multipart;
mod response;
mod route;
mod router;
mod server;

pub mod health;
pub mod middleware;
pub mod validate;

pub use body::DEFAULT_MAX_MULTIPART_BYTES;
pub use config::Config;
pub use context::{Client, Context, RoleId};
pub use engine::Engine;
pub use error::{BindError, BodyError, Error, ValidationError};
pub use handler::{AuthHook, BoxFuture, BoxedHandler, Flow, Handler, auth_hook, handler};
pub use method::Method;
pub use multipart::{FilePart, MultipartForm};
pub use route::{Route, RouteGroup};
pub use router::Router;
pub use server::Server;
