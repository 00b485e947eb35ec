//! Construction of interceptors by configured name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::interceptor::{BoxError, InterceptError, Interceptor, InterceptorChain, TraceInterceptor};
use crate::model::{
    BidRequest, BidResponse, ClickRequest, ClickResponse, ImpressionRequest, ImpressionResponse,
    MatchRequest, MatchResponse, UserRequest, UserResponse,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no interceptor registered as {name:?}")]
    Unknown { name: String },

    #[error("failed to construct interceptor {name:?}: {source}")]
    Construction { name: String, source: BoxError },
}

/// Reports the name an interceptor was registered under.
struct Registered<Req, Resp> {
    name: String,
    inner: Arc<dyn Interceptor<Req, Resp>>,
}

impl<Req, Resp> Interceptor<Req, Resp> for Registered<Req, Resp> {
    fn name(&self) -> &str {
        &self.name
    }

    fn compatible_exchanges(&self) -> &[&'static str] {
        self.inner.compatible_exchanges()
    }

    fn on_start(&self) -> Result<(), BoxError> {
        self.inner.on_start()
    }

    fn on_stop(&self) -> Result<(), BoxError> {
        self.inner.on_stop()
    }

    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> Result<(), InterceptError> {
        self.inner.execute(chain)
    }
}

type Factory<Req, Resp> =
    Box<dyn Fn() -> Result<Arc<dyn Interceptor<Req, Resp>>, BoxError> + Send + Sync>;

/// Interceptor constructors keyed by name.
pub struct InterceptorRegistry<Req, Resp> {
    factories: BTreeMap<String, Factory<Req, Resp>>,
}

impl<Req, Resp> Default for InterceptorRegistry<Req, Resp> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<Req: 'static, Resp: 'static> InterceptorRegistry<Req, Resp> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Interceptor<Req, Resp>>, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            tracing::warn!(interceptor = %name, "Replacing registered interceptor");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct one interceptor. It reports `name` in logs, metrics and status.
    pub fn create(&self, name: &str) -> Result<Arc<dyn Interceptor<Req, Resp>>, RegistryError> {
        let factory = self.factories.get(name).ok_or_else(|| RegistryError::Unknown {
            name: name.to_string(),
        })?;
        let inner = factory().map_err(|source| RegistryError::Construction {
            name: name.to_string(),
            source,
        })?;
        if inner.name() == name {
            return Ok(inner);
        }
        Ok(Arc::new(Registered {
            name: name.to_string(),
            inner,
        }))
    }

    /// Construct interceptors in the given order; the first failure wins.
    pub fn create_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Arc<dyn Interceptor<Req, Resp>>>, RegistryError> {
        names.iter().map(|n| self.create(n.as_ref())).collect()
    }
}

impl<Req, Resp> InterceptorRegistry<Req, Resp>
where
    Req: UserRequest + 'static,
    Resp: UserResponse + 'static,
{
    /// Registry pre-loaded with the built-in interceptors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(TraceInterceptor::NAME, || {
            Ok(Arc::new(TraceInterceptor::new()) as Arc<dyn Interceptor<Req, Resp>>)
        });
        registry
    }
}

impl<Req, Resp> fmt::Debug for InterceptorRegistry<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// One registry per request kind.
#[derive(Debug)]
pub struct Registries {
    pub bid: InterceptorRegistry<BidRequest, BidResponse>,
    pub impression: InterceptorRegistry<ImpressionRequest, ImpressionResponse>,
    pub click: InterceptorRegistry<ClickRequest, ClickResponse>,
    pub matching: InterceptorRegistry<MatchRequest, MatchResponse>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            bid: InterceptorRegistry::with_builtins(),
            impression: InterceptorRegistry::with_builtins(),
            click: InterceptorRegistry::with_builtins(),
            matching: InterceptorRegistry::with_builtins(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let registries = Registries::default();
        assert!(registries.bid.contains("trace"));
        assert!(registries.matching.contains("trace"));
        assert_eq!(registries.bid.create("trace").unwrap().name(), "trace");
    }

    #[test]
    fn test_unknown_name() {
        let registry = InterceptorRegistry::<BidRequest, BidResponse>::with_builtins();
        let err = registry.create_all(&["trace", "missing"]).err().unwrap();
        assert!(matches!(err, RegistryError::Unknown { ref name } if name == "missing"));
    }

    #[test]
    fn test_construction_failure() {
        let mut registry = InterceptorRegistry::<BidRequest, BidResponse>::new();
        registry.register("broken", || Err("no model file".into()));
        let err = registry.create("broken").err().unwrap();
        assert!(err.to_string().contains("no model file"));
    }

    struct Unnamed;

    impl Interceptor<BidRequest, BidResponse> for Unnamed {
        fn execute(
            &self,
            chain: &mut InterceptorChain<'_, BidRequest, BidResponse>,
        ) -> Result<(), InterceptError> {
            chain.proceed()
        }
    }

    #[test]
    fn test_registered_name_is_reported() {
        let mut registry = InterceptorRegistry::<BidRequest, BidResponse>::new();
        registry.register("pacing", || {
            Ok(Arc::new(Unnamed) as Arc<dyn Interceptor<BidRequest, BidResponse>>)
        });
        let interceptor = registry.create("pacing").unwrap();
        assert_eq!(interceptor.name(), "pacing");
        assert!(interceptor.compatible_exchanges().is_empty());
    }

    #[test]
    fn test_each_call_constructs_a_new_instance() {
        let registry = InterceptorRegistry::<BidRequest, BidResponse>::with_builtins();
        let a = registry.create("trace").unwrap();
        let b = registry.create("trace").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
