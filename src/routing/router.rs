//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold one route table per listening port
//! - Look up the receiver for (port, path, method)
//! - Fall back to the port's not-found, method-not-allowed and options receivers
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Dormant routes (missing a feature) are dropped at build time
//! - Duplicate method + path on one port is a build error, never resolved by order
//! - Explicit `Dispatch` outcome; routing misses are not errors

use axum::http::Method;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::receiver::{
    HttpReceiver, MethodNotAllowedReceiver, NotFoundReceiver, OptionsReceiver, ReceiverContext,
};
use crate::routing::{Feature, PathMatcher, Route};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("port {port} is declared by more than one listener")]
    DuplicateListener { port: u16 },

    #[error("{method} {path:?} on port {port} is claimed by both {first:?} and {second:?}")]
    Duplicate {
        port: u16,
        method: Method,
        path: String,
        first: String,
        second: String,
    },
}

/// What the router decided for one request.
#[derive(Debug)]
pub enum Dispatch<'a> {
    Route(&'a Route),
    /// OPTIONS on a known path without an explicit OPTIONS route.
    Options(Vec<Method>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Clone)]
struct DefaultReceivers {
    not_found: Arc<dyn HttpReceiver>,
    method_not_allowed: Arc<dyn HttpReceiver>,
    options: Arc<dyn HttpReceiver>,
}

struct PathEntry {
    path: PathMatcher,
    routes: Vec<(Method, Arc<Route>)>,
}

impl PathEntry {
    fn route_for(&self, method: &Method) -> Option<&Route> {
        self.routes
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, route)| route.as_ref())
    }

    fn methods(&self) -> Vec<Method> {
        self.routes.iter().map(|(m, _)| m.clone()).collect()
    }
}

struct PortTable {
    features: BTreeSet<Feature>,
    /// Sorted most specific first.
    paths: Vec<PathEntry>,
}

/// Builds an immutable [`Router`].
pub struct RouterBuilder {
    listeners: Vec<(u16, BTreeSet<Feature>)>,
    routes: Vec<Route>,
    defaults: DefaultReceivers,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            routes: Vec::new(),
            defaults: DefaultReceivers {
                not_found: Arc::new(NotFoundReceiver),
                method_not_allowed: Arc::new(MethodNotAllowedReceiver),
                options: Arc::new(OptionsReceiver),
            },
        }
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a listening port and the features enabled on it.
    pub fn listener(mut self, port: u16, features: impl IntoIterator<Item = Feature>) -> Self {
        self.listeners.push((port, features.into_iter().collect()));
        self
    }

    /// Register a route on every listener.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn not_found(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.defaults.not_found = receiver;
        self
    }

    pub fn method_not_allowed(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.defaults.method_not_allowed = receiver;
        self
    }

    pub fn options(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.defaults.options = receiver;
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let routes: Vec<Arc<Route>> = self.routes.into_iter().map(Arc::new).collect();
        let mut ports = BTreeMap::new();

        for (port, features) in self.listeners {
            if ports.contains_key(&port) {
                return Err(RouteError::DuplicateListener { port });
            }

            let mut paths: Vec<PathEntry> = Vec::new();
            let mut dormant = 0usize;
            for route in &routes {
                if !route.is_active(&features) {
                    dormant += 1;
                    continue;
                }
                let index = match paths.iter().position(|e| e.path == *route.path()) {
                    Some(index) => index,
                    None => {
                        paths.push(PathEntry {
                            path: route.path().clone(),
                            routes: Vec::new(),
                        });
                        paths.len() - 1
                    }
                };
                let entry = &mut paths[index];
                for method in route.methods() {
                    if let Some(existing) = entry.route_for(method) {
                        return Err(RouteError::Duplicate {
                            port,
                            method: method.clone(),
                            path: route.path().spec().to_string(),
                            first: existing.name().to_string(),
                            second: route.name().to_string(),
                        });
                    }
                    entry.routes.push((method.clone(), Arc::clone(route)));
                }
            }
            paths.sort_by(|a, b| a.path.cmp(&b.path));

            tracing::info!(
                port,
                features = ?features,
                paths = paths.len(),
                dormant,
                "Route table built"
            );
            ports.insert(port, PortTable { features, paths });
        }

        Ok(Router {
            ports,
            defaults: self.defaults,
        })
    }
}

/// Immutable per-port route tables.
pub struct Router {
    ports: BTreeMap<u16, PortTable>,
    defaults: DefaultReceivers,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.keys().copied()
    }

    pub fn features(&self, port: u16) -> Option<&BTreeSet<Feature>> {
        self.ports.get(&port).map(|t| &t.features)
    }

    /// Select the receiver for a request. Pure; never fails.
    pub fn route(&self, port: u16, path: &str, method: &Method) -> Dispatch<'_> {
        let Some(table) = self.ports.get(&port) else {
            return Dispatch::NotFound;
        };
        let Some(entry) = table.paths.iter().find(|e| e.path.matches(path)) else {
            return Dispatch::NotFound;
        };
        match entry.route_for(method) {
            Some(route) => Dispatch::Route(route),
            None if *method == Method::OPTIONS => Dispatch::Options(entry.methods()),
            None => Dispatch::MethodNotAllowed(entry.methods()),
        }
    }

    /// Methods registered for the first path matching `path`.
    pub fn allowed_methods(&self, port: u16, path: &str) -> Vec<Method> {
        self.ports
            .get(&port)
            .and_then(|t| t.paths.iter().find(|e| e.path.matches(path)))
            .map(PathEntry::methods)
            .unwrap_or_default()
    }

    /// Dispatch a request to its receiver.
    pub fn receive(&self, port: u16, ctx: &mut ReceiverContext) {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();

        match self.route(port, &path, &method) {
            Dispatch::Route(route) => {
                tracing::trace!(port, %method, path, route = route.name(), "Dispatching");
                route.receiver().receive(ctx);
            }
            Dispatch::Options(allowed) => {
                ctx.set_allowed_methods(allowed);
                self.defaults.options.receive(ctx);
            }
            Dispatch::MethodNotAllowed(allowed) => {
                tracing::debug!(port, %method, path, allowed = ?allowed, "Method not allowed");
                ctx.set_allowed_methods(allowed);
                self.defaults.method_not_allowed.receive(ctx);
            }
            Dispatch::NotFound => {
                tracing::debug!(port, %method, path, "No route");
                self.defaults.not_found.receive(ctx);
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (port, table) in &self.ports {
            let paths: Vec<(&str, Vec<Method>)> = table
                .paths
                .iter()
                .map(|e| (e.path.spec(), e.methods()))
                .collect();
            map.entry(port, &paths);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpRequest;
    use axum::http::{header, StatusCode, Uri};

    struct Tag(&'static str);

    impl HttpReceiver for Tag {
        fn receive(&self, ctx: &mut ReceiverContext) {
            ctx.response_mut().set_body(self.0);
        }
    }

    fn tag(name: &'static str) -> Arc<dyn HttpReceiver> {
        Arc::new(Tag(name))
    }

    fn send(router: &Router, port: u16, method: Method, path: &str) -> ReceiverContext {
        let uri: Uri = path.parse().unwrap();
        let mut ctx = ReceiverContext::new(HttpRequest::new(method, uri));
        router.receive(port, &mut ctx);
        ctx
    }

    #[test]
    fn test_get_only_route() {
        let router = Router::builder()
            .listener(8080, [Feature::Bid])
            .route(Route::get("bid", "/bid", tag("bid")).requires(Feature::Bid))
            .build()
            .unwrap();

        assert!(matches!(
            router.route(8080, "/bid", &Method::GET),
            Dispatch::Route(r) if r.name() == "bid"
        ));

        let ctx = send(&router, 8080, Method::POST, "/bid");
        assert_eq!(ctx.response().status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ctx.allowed_methods(), &[Method::GET]);
        assert_eq!(ctx.response().header(header::ALLOW.as_str()), Some("GET"));

        let ctx = send(&router, 8080, Method::GET, "/other");
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_port_not_found() {
        let router = Router::builder()
            .listener(8080, [])
            .route(Route::get("x", "/x", tag("x")))
            .build()
            .unwrap();
        assert!(matches!(router.route(9090, "/x", &Method::GET), Dispatch::NotFound));
        assert_eq!(send(&router, 9090, Method::GET, "/x").response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_dormant_route() {
        let router = Router::builder()
            .listener(1, [Feature::Bid])
            .listener(2, [Feature::Impression])
            .route(Route::post("bid", "/bid", tag("bid")).requires(Feature::Bid))
            .build()
            .unwrap();

        assert!(matches!(router.route(1, "/bid", &Method::POST), Dispatch::Route(_)));
        assert!(matches!(router.route(2, "/bid", &Method::POST), Dispatch::NotFound));
    }

    #[test]
    fn test_duplicate_active_route_rejected() {
        let err = Router::builder()
            .listener(1, [Feature::Bid])
            .route(Route::get("a", "/x", tag("a")))
            .route(Route::new("b", [Method::POST, Method::GET], "/x", tag("b")))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                port: 1,
                method: Method::GET,
                path: "/x".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_dormant_route_allowed() {
        let router = Router::builder()
            .listener(1, [Feature::Bid])
            .route(Route::get("a", "/x", tag("a")).requires(Feature::Bid))
            .route(Route::get("b", "/x", tag("b")).requires(Feature::Click))
            .build()
            .unwrap();
        assert_eq!(send(&router, 1, Method::GET, "/x").response().body(), b"a");
    }

    #[test]
    fn test_duplicate_listener_rejected() {
        let result = Router::builder().listener(1, []).listener(1, []).build();
        assert!(matches!(result, Err(RouteError::DuplicateListener { port: 1 })));
    }

    #[test]
    fn test_most_specific_path_wins() {
        let router = Router::builder()
            .listener(1, [])
            .route(Route::get("all", "/*", tag("all")))
            .route(Route::get("foo", "/foo/*", tag("foo")))
            .route(Route::get("exact", "/foo/bar", tag("exact")))
            .route(Route::get("html", "*.html", tag("html")))
            .build()
            .unwrap();

        assert_eq!(send(&router, 1, Method::GET, "/foo/bar").response().body(), b"exact");
        assert_eq!(send(&router, 1, Method::GET, "/foo/baz").response().body(), b"foo");
        assert_eq!(send(&router, 1, Method::GET, "/index.html").response().body(), b"all");
        assert_eq!(send(&router, 1, Method::GET, "/").response().body(), b"all");
    }

    #[test]
    fn test_options_lists_methods() {
        let router = Router::builder()
            .listener(1, [])
            .route(Route::new("m", [Method::GET, Method::POST], "/m", tag("m")))
            .build()
            .unwrap();

        let ctx = send(&router, 1, Method::OPTIONS, "/m");
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().header(header::ALLOW.as_str()), Some("GET, POST, OPTIONS"));
        assert_eq!(router.allowed_methods(1, "/m"), vec![Method::GET, Method::POST]);
        assert!(router.allowed_methods(1, "/nope").is_empty());
    }

    #[test]
    fn test_explicit_options_route() {
        let router = Router::builder()
            .listener(1, [])
            .route(Route::new("cors", [Method::OPTIONS], "/m", tag("cors")))
            .build()
            .unwrap();
        assert_eq!(send(&router, 1, Method::OPTIONS, "/m").response().body(), b"cors");
    }

    #[test]
    fn test_custom_default_receiver() {
        let router = Router::builder()
            .listener(1, [])
            .not_found(tag("missing"))
            .build()
            .unwrap();
        assert_eq!(send(&router, 1, Method::GET, "/x").response().body(), b"missing");
    }
}
