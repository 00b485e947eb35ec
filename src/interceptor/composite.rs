//! A group of interceptors that behaves as one.
//!
//! The components run as a nested chain. When that chain has run to its end
//! the composite proceeds with the outer chain, so the components always
//! finish before anything registered after the composite starts. Component
//! lifecycles are subordinated to the composite's own start and stop hooks.

use std::sync::Arc;

use crate::interceptor::{
    BoxError, InterceptError, Interceptor, InterceptorChain, InterceptorSet, LifecycleError,
};
use crate::model::UserRequest;

pub struct CompositeInterceptor<Req, Resp> {
    name: String,
    components: InterceptorSet<Req, Resp>,
}

impl<Req, Resp> CompositeInterceptor<Req, Resp> {
    pub fn new(name: impl Into<String>, components: Vec<Arc<dyn Interceptor<Req, Resp>>>) -> Self {
        let name = name.into();
        let components = InterceptorSet::new(&name, components);
        Self { name, components }
    }

    pub fn components(&self) -> &InterceptorSet<Req, Resp> {
        &self.components
    }
}

impl<Req, Resp> Interceptor<Req, Resp> for CompositeInterceptor<Req, Resp>
where
    Req: UserRequest + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&self) -> Result<(), BoxError> {
        self.components
            .start_all()
            .map_err(|(interceptor, source)| -> BoxError {
                Box::new(LifecycleError::StartFailed {
                    controller: self.name.clone(),
                    interceptor,
                    source,
                })
            })
    }

    fn on_stop(&self) -> Result<(), BoxError> {
        let failures = self.components.stop_all();
        for (interceptor, e) in &failures {
            tracing::error!(composite = %self.name, interceptor = %interceptor, error = %e, "Component failed to stop");
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("{} component(s) of {} failed to stop", failures.len(), self.name).into())
        }
    }

    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> Result<(), InterceptError> {
        InterceptorChain::new(&self.components, chain.request(), chain.response_mut()).proceed()?;
        chain.proceed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::NO_EXCHANGE;
    use crate::http::HttpRequest;
    use crate::interceptor::{BidChain, InterceptorController};
    use crate::model::{BidRequest, BidResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type DynBid = Arc<dyn Interceptor<BidRequest, BidResponse>>;

    #[derive(Default)]
    struct Step {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        post: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl Interceptor<BidRequest, BidResponse> for Step {
        fn on_start(&self) -> Result<(), BoxError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_stop(&self) -> Result<(), BoxError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn execute(&self, chain: &mut BidChain<'_>) -> Result<(), InterceptError> {
            if self.post {
                chain.proceed()?;
                self.log.lock().unwrap().push(self.label);
                Ok(())
            } else {
                self.log.lock().unwrap().push(self.label);
                chain.proceed()
            }
        }
    }

    #[test]
    fn test_components_finish_before_outer_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = |label, post| {
            Arc::new(Step {
                label,
                log: Arc::clone(&log),
                post,
                ..Default::default()
            })
        };
        let comp1 = step("comp1", false);
        let comp2 = step("comp2", false);
        let comp3 = step("comp3", true);
        let regular = step("regular", false);

        let composite = Arc::new(CompositeInterceptor::new(
            "group",
            vec![
                Arc::clone(&comp1) as DynBid,
                Arc::clone(&comp2) as DynBid,
                Arc::clone(&comp3) as DynBid,
            ],
        ));
        assert_eq!(composite.components().len(), 3);

        let controller =
            InterceptorController::new("bid", vec![composite as DynBid, Arc::clone(&regular) as DynBid]);
        controller.start().unwrap();

        let request = BidRequest::new(&NO_EXCHANGE, HttpRequest::get("/bid").unwrap(), json!({}));
        let mut response = BidResponse::new(&NO_EXCHANGE);
        controller.on_request(&request, &mut response).unwrap();
        controller.stop();

        assert_eq!(*log.lock().unwrap(), vec!["comp1", "comp2", "comp3", "regular"]);
        for component in [&comp1, &comp2, &comp3, &regular] {
            assert_eq!(component.starts.load(Ordering::SeqCst), 1);
            assert_eq!(component.stops.load(Ordering::SeqCst), 1);
        }
    }
}
