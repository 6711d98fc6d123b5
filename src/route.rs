//! Route descriptors and path-prefix groups.
//!
//! Both are registration-time values: handed out as `&mut` by the
//! [`Engine`](crate::Engine) so they can be configured in place, then consumed
//! by [`Engine::apply`](crate::Engine::apply).
//!
//! # Middleware snapshots
//!
//! Middleware lists are copied, never shared:
//!
//! - a group copies the engine's global list when the group is created,
//! - a group route copies its group's list when it is registered,
//! - a top-level route starts empty and only has what it adds itself.
//!
//! Middleware added to the engine or a group later only reaches routes
//! registered after that point.

use std::sync::Arc;

use crate::context::RoleId;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::router::Endpoint;

/// One endpoint: verb, path, terminal handler, and what runs before it.
pub struct Route {
    path: String,
    method: Method,
    handler: BoxedHandler,
    middlewares: Vec<BoxedHandler>,
    requires_auth: bool,
    allowed_roles: Vec<RoleId>,
}

impl Route {
    pub(crate) fn new(path: &str, method: Method, handler: BoxedHandler, middlewares: Vec<BoxedHandler>) -> Self {
        Self {
            path: path.to_owned(),
            method,
            handler,
            middlewares,
            requires_auth: false,
            allowed_roles: Vec::new(),
        }
    }

    /// Runs the engine's auth hook before this route's chain.
    pub fn auth(&mut self) -> &mut Self {
        self.requires_auth = true;
        self
    }

    /// Requires auth and records roles allowed on this route.
    ///
    /// The roles are handed to the request as
    /// [`Context::allowed_roles`](crate::Context::allowed_roles); enforcing
    /// them is up to the auth hook.
    pub fn roles(&mut self, roles: impl IntoIterator<Item = RoleId>) -> &mut Self {
        self.requires_auth = true;
        self.allowed_roles.extend(roles);
        self
    }

    /// Appends a middleware that runs after the inherited ones and before the
    /// terminal handler.
    pub fn middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn allowed_roles(&self) -> &[RoleId] {
        &self.allowed_roles
    }

    /// Freezes the route: middlewares followed by the terminal handler, path
    /// behind `prefix`.
    pub(crate) fn freeze(self, prefix: &str) -> Endpoint {
        let mut chain = self.middlewares;
        chain.push(self.handler);
        Endpoint {
            method: self.method,
            path: format!("{prefix}{}", self.path),
            chain: chain.into(),
            requires_auth: self.requires_auth,
            allowed_roles: self.allowed_roles.into(),
        }
    }
}

pub(crate) fn push_route(routes: &mut Vec<Route>, route: Route) -> &mut Route {
    let idx = routes.len();
    routes.push(route);
    &mut routes[idx]
}

/// Routes sharing a path prefix and a middleware list.
pub struct RouteGroup {
    base_path: String,
    routes: Vec<Route>,
    middlewares: Vec<BoxedHandler>,
}

macro_rules! verb_methods {
    ($($(#[$doc:meta])* $name:ident => $method:ident;)*) => {$(
        $(#[$doc])*
        pub fn $name(&mut self, path: &str, handler: impl Handler) -> &mut Route {
            self.register(path, Method::$method, handler)
        }
    )*};
}
pub(crate) use verb_methods;

impl RouteGroup {
    pub(crate) fn new(prefix: &str, middlewares: Vec<BoxedHandler>) -> Self {
        Self {
            base_path: format!("/{prefix}"),
            routes: Vec::new(),
            middlewares,
        }
    }

    /// Appends a middleware for routes registered on this group from now on.
    pub fn middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Registers a route under this group's prefix. `path` is appended to the
    /// base path verbatim, so it normally starts with `/`.
    pub fn register(&mut self, path: &str, method: Method, handler: impl Handler) -> &mut Route {
        let route = Route::new(path, method, Arc::new(handler), self.middlewares.clone());
        push_route(&mut self.routes, route)
    }

    verb_methods! {
        /// Registers a `GET` route under this group's prefix.
        get => Get;
        /// Registers a `POST` route under this group's prefix.
        post => Post;
        /// Registers a `PUT` route under this group's prefix.
        put => Put;
        /// Registers a `PATCH` route under this group's prefix.
        patch => Patch;
        /// Registers a `DELETE` route under this group's prefix.
        delete => Delete;
    }

    pub(crate) fn freeze(self) -> impl Iterator<Item = Endpoint> {
        let base_path = self.base_path;
        self.routes.into_iter().map(move |route| route.freeze(&base_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, Flow};
    use crate::Context;

    fn noop(_c: &mut Context) -> BoxFuture<'_, Flow> {
        Box::pin(async { Flow::Next })
    }

    #[test]
    fn roles_imply_auth() {
        let mut route = Route::new("/x", Method::Get, Arc::new(noop), Vec::new());
        assert!(!route.requires_auth());

        route.roles([1, 2]).roles([3]);
        assert!(route.requires_auth());
        assert_eq!(route.allowed_roles(), [1_i8, 2, 3]);
    }

    #[test]
    fn freeze_appends_terminal_handler() {
        let mut route = Route::new("/x", Method::Post, Arc::new(noop), vec![Arc::new(noop) as BoxedHandler]);
        route.middleware(noop);

        let endpoint = route.freeze("/api");
        assert_eq!(endpoint.path, "/api/x");
        assert_eq!(endpoint.chain.len(), 3);
    }

    #[test]
    fn group_middleware_reaches_only_later_routes() {
        let mut group = RouteGroup::new("api", Vec::new());
        group.get("/before", noop);
        group.middleware(noop);
        group.get("/after", noop);

        let chains: Vec<_> = group.freeze().map(|e| (e.path, e.chain.len())).collect();
        assert_eq!(chains, [("/api/before".to_owned(), 1_usize), ("/api/after".to_owned(), 2)]);
    }
}
