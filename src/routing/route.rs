//! Route definitions.

use axum::http::Method;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::receiver::HttpReceiver;
use crate::routing::{Feature, PathMatcher};

/// A receiver bound to a path and a set of methods, live only when every
/// required feature is enabled on the listener.
#[derive(Clone)]
pub struct Route {
    name: String,
    methods: Vec<Method>,
    path: PathMatcher,
    receiver: Arc<dyn HttpReceiver>,
    required_features: BTreeSet<Feature>,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        receiver: Arc<dyn HttpReceiver>,
    ) -> Self {
        let mut unique: Vec<Method> = Vec::new();
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }
        Self {
            name: name.into(),
            methods: unique,
            path: PathMatcher::new(path),
            receiver,
            required_features: BTreeSet::new(),
        }
    }

    pub fn get(name: impl Into<String>, path: &str, receiver: Arc<dyn HttpReceiver>) -> Self {
        Self::new(name, [Method::GET], path, receiver)
    }

    pub fn post(name: impl Into<String>, path: &str, receiver: Arc<dyn HttpReceiver>) -> Self {
        Self::new(name, [Method::POST], path, receiver)
    }

    pub fn requires(mut self, feature: Feature) -> Self {
        self.required_features.insert(feature);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn path(&self) -> &PathMatcher {
        &self.path
    }

    pub fn receiver(&self) -> &Arc<dyn HttpReceiver> {
        &self.receiver
    }

    pub fn required_features(&self) -> &BTreeSet<Feature> {
        &self.required_features
    }

    /// A route with no required features is always live.
    pub fn is_active(&self, enabled: &BTreeSet<Feature>) -> bool {
        self.required_features.is_subset(enabled)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("path", &self.path.spec())
            .field("required_features", &self.required_features)
            .finish()
    }
}
