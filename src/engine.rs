//! Route registration.
//!
//! [`Engine`] is the mutable half of a two-phase setup: register routes,
//! groups, middleware, and the auth hook, then call [`Engine::apply`] to get
//! the immutable [`Router`] that serves requests. The engine is consumed by
//! `apply`, so nothing can be registered once serving starts.

use std::sync::Arc;

use crate::config::Config;
use crate::handler::{AuthHook, BoxedAuthHook, BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Cors;
use crate::route::{Route, RouteGroup, push_route, verb_methods};
use crate::router::Router;

/// The registration builder.
///
/// ```rust
/// use strand::{Engine, health, middleware};
///
/// let mut engine = Engine::new();
/// engine.allow_all_cors();
/// engine.middleware(middleware::trace());
/// engine.get("/health", health::liveness);
///
/// let api = engine.group("api");
/// api.get("/ping", health::liveness);
///
/// let router = engine.apply();
/// assert!(router.routes().any(|(_, path)| path == "/api/ping"));
/// ```
#[derive(Default)]
pub struct Engine {
    routes: Vec<Route>,
    groups: Vec<RouteGroup>,
    auth: Option<BoxedAuthHook>,
    middlewares: Vec<BoxedHandler>,
    cors: Option<BoxedHandler>,
    config: Config,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self { config, ..Self::default() }
    }

    /// Installs the auth hook, replacing any previous one.
    pub fn use_auth(&mut self, hook: impl AuthHook) -> &mut Self {
        self.auth = Some(Arc::new(hook));
        self
    }

    /// Puts a permissive CORS middleware in front of every other global
    /// middleware, and answers preflight `OPTIONS` requests on registered paths.
    pub fn allow_all_cors(&mut self) -> &mut Self {
        if self.cors.is_none() {
            let cors: BoxedHandler = Arc::new(Cors);
            self.middlewares.insert(0, Arc::clone(&cors));
            self.cors = Some(cors);
        }
        self
    }

    /// Appends a global middleware. Groups created from now on include it;
    /// top-level routes never do.
    pub fn middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Registers a top-level route with no middleware and no auth requirement.
    ///
    /// Global middleware is carried by groups only. A top-level route that
    /// needs any adds it with [`Route::middleware`].
    pub fn register(&mut self, path: &str, method: Method, handler: impl Handler) -> &mut Route {
        let route = Route::new(path, method, Arc::new(handler), Vec::new());
        push_route(&mut self.routes, route)
    }

    verb_methods! {
        /// Registers a top-level `GET` route. See [`register`](Self::register).
        get => Get;
        /// Registers a top-level `POST` route. See [`register`](Self::register).
        post => Post;
        /// Registers a top-level `PUT` route. See [`register`](Self::register).
        put => Put;
        /// Registers a top-level `PATCH` route. See [`register`](Self::register).
        patch => Patch;
        /// Registers a top-level `DELETE` route. See [`register`](Self::register).
        delete => Delete;
    }

    /// Creates a group mounted under `/{prefix}` with a copy of the current
    /// global middleware.
    pub fn group(&mut self, prefix: &str) -> &mut RouteGroup {
        let idx = self.groups.len();
        self.groups.push(RouteGroup::new(prefix, self.middlewares.clone()));
        &mut self.groups[idx]
    }

    /// Freezes every route into its final chain and path.
    ///
    /// # Panics
    ///
    /// Panics if two routes end up with the same verb and final path.
    pub fn apply(self) -> Router {
        let mut router = Router::new(self.auth, self.cors, self.config);

        for route in self.routes {
            router.mount(route.freeze(""));
        }
        for group in self.groups {
            for endpoint in group.freeze() {
                router.mount(endpoint);
            }
        }

        router
    }
}
