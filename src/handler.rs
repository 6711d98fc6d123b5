//! Handler trait, chain flow, and type erasure.
//!
//! # How handlers are stored
//!
//! A route's chain mixes handlers of *different* types: plain functions,
//! closures, and the built-in middleware structs. They are erased behind
//! `dyn Handler` and frozen into an `Arc<[BoxedHandler]>` when the engine is
//! applied:
//!
//! ```text
//! fn hello(c: &mut Context) -> BoxFuture<'_, Flow> { … }   ← user writes this
//!        ↓ engine.get("/", hello)
//! Arc::new(hello)                                          ← BoxedHandler
//!        ↓ engine.apply()
//! [cors, trace, auth_mw, hello]                            ← frozen chain
//!        ↓ at request time
//! ctx.next()  →  handler.call(&mut ctx)                    ← one vtable call per step
//! ```
//!
//! # Why `BoxFuture` and not `async fn`
//!
//! Every handler borrows the request's [`Context`] mutably for the duration of
//! its future. Expressing "a future that borrows its argument" needs a
//! higher-ranked signature, `for<'a> Fn(&'a mut Context) -> BoxFuture<'a, _>`.
//! Named functions satisfy it as written. Closures need their signature pinned
//! by an explicit `Fn` bound, which is what [`handler`] and [`auth_hook`] do.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;

// ── Flow ──────────────────────────────────────────────────────────────────────

/// What a handler tells the chain cursor when it returns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Continue with the next handler in the chain.
    Next,
    /// End the chain here. Later handlers do not run, but the request is not
    /// aborted: whatever has been written stays the response.
    Stop,
}

// ── Erased types ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future borrowing the request for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased handler shared by every request that hits its route.
pub type BoxedHandler = Arc<dyn Handler>;

pub(crate) type BoxedAuthHook = Arc<dyn AuthHook>;

// ── Handler ───────────────────────────────────────────────────────────────────

/// One step in a route's chain: a middleware or the terminal handler.
///
/// Implemented automatically for any function with the signature
///
/// ```text
/// fn name(c: &mut Context) -> BoxFuture<'_, Flow>
/// ```
///
/// and implementable by hand for stateful middleware.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        (self)(ctx)
    }
}

/// Pins the handler signature for a closure.
///
/// Rust cannot infer a higher-ranked closure signature through a blanket
/// trait impl, so closures go through this identity function:
///
/// ```rust
/// use strand::{Engine, Flow, handler};
///
/// let mut engine = Engine::new();
/// engine.get("/ping", handler(|c| Box::pin(async move {
///     c.status(http::StatusCode::NO_CONTENT);
///     Flow::Next
/// })));
/// ```
pub fn handler<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync + 'static,
{
    f
}

// ── AuthHook ──────────────────────────────────────────────────────────────────

/// The engine-wide authentication hook.
///
/// Runs before the chain of every route marked with [`Route::auth`]. It fills
/// in [`Context::client_mut`] from the bearer token and rejects a request by
/// aborting it, typically with [`Context::abort_with_status`].
///
/// [`Route::auth`]: crate::Route::auth
pub trait AuthHook: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()>;
}

impl<F> AuthHook for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
        (self)(ctx)
    }
}

/// Pins the auth hook signature for a closure. See [`handler`].
pub fn auth_hook<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    f
}
