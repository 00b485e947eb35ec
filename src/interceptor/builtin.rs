//! Interceptors shipped with the bidder.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::interceptor::{InterceptError, Interceptor, InterceptorChain};
use crate::model::{UserRequest, UserResponse};

/// Logs every request entering the pipeline and the status leaving it.
///
/// Registered under the name `trace` for every request kind.
#[derive(Debug, Default)]
pub struct TraceInterceptor {
    seen: AtomicU64,
}

impl TraceInterceptor {
    pub const NAME: &'static str = "trace";

    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen since startup.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl<Req, Resp> Interceptor<Req, Resp> for TraceInterceptor
where
    Req: UserRequest,
    Resp: UserResponse,
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> Result<(), InterceptError> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        let http = chain.request().http_request();
        tracing::debug!(
            exchange = %chain.request().exchange(),
            method = %http.method(),
            path = http.path(),
            request_id = http.request_id(),
            "Request entering pipeline"
        );

        let result = chain.proceed();

        tracing::debug!(
            status = chain.response().http_response().status().as_u16(),
            ok = result.is_ok(),
            "Response leaving pipeline"
        );
        result
    }
}
