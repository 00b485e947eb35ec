//! Ordered interceptor sets and the per-request execution cursor.

use std::fmt;
use std::sync::Arc;

use crate::interceptor::error::run_hook;
use crate::interceptor::{BoxError, InterceptError, Interceptor};
use crate::model::UserRequest;
use crate::observability::Timer;

struct Entry<Req, Resp> {
    interceptor: Arc<dyn Interceptor<Req, Resp>>,
    timer: Arc<Timer>,
}

impl<Req, Resp> Entry<Req, Resp> {
    /// Empty compatibility set means every exchange.
    fn accepts(&self, exchange_id: &str) -> bool {
        let compatible = self.interceptor.compatible_exchanges();
        compatible.is_empty() || compatible.contains(&exchange_id)
    }
}

/// Interceptors in registration order, each with its execution timer.
pub struct InterceptorSet<Req, Resp> {
    entries: Vec<Entry<Req, Resp>>,
}

impl<Req, Resp> InterceptorSet<Req, Resp> {
    /// `owner` labels the timers, usually the controller name.
    pub fn new(owner: &str, interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>) -> Self {
        let entries = interceptors
            .into_iter()
            .map(|interceptor| {
                let timer = Arc::new(Timer::interceptor(owner, interceptor.name()));
                Entry { interceptor, timer }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Interceptor<Req, Resp>>> {
        self.entries.iter().map(|e| &e.interceptor)
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|i| i.name().to_string()).collect()
    }

    pub(crate) fn timers(&self) -> impl Iterator<Item = (&Arc<dyn Interceptor<Req, Resp>>, &Arc<Timer>)> {
        self.entries.iter().map(|e| (&e.interceptor, &e.timer))
    }

    /// Run every start hook in order.
    ///
    /// On the first failure, interceptors already started are stopped again in
    /// reverse order and the failing interceptor is reported. A panicking
    /// hook counts as a failure.
    pub fn start_all(&self) -> Result<(), (String, BoxError)> {
        for (started, entry) in self.entries.iter().enumerate() {
            if let Err(e) = run_hook(|| entry.interceptor.on_start()) {
                for previous in self.entries[..started].iter().rev() {
                    if let Err(stop_err) = run_hook(|| previous.interceptor.on_stop()) {
                        tracing::error!(
                            interceptor = previous.interceptor.name(),
                            error = %stop_err,
                            "Stop hook failed while unwinding a failed start"
                        );
                    }
                }
                return Err((entry.interceptor.name().to_string(), e));
            }
        }
        Ok(())
    }

    /// Run every stop hook in order, even after failures. Returns the failures.
    pub fn stop_all(&self) -> Vec<(String, BoxError)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                run_hook(|| entry.interceptor.on_stop())
                    .err()
                    .map(|e| (entry.interceptor.name().to_string(), e))
            })
            .collect()
    }
}

impl<Req, Resp> fmt::Debug for InterceptorSet<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.interceptor.name()))
            .finish()
    }
}

/// Live execution cursor over an interceptor set, for exactly one request.
///
/// Interceptors receive the chain in `execute` and decide whether to call
/// [`proceed`](Self::proceed). Work done before the call is pre-processing,
/// work done after it returns is post-processing. Not calling it ends the
/// chain at that interceptor.
pub struct InterceptorChain<'a, Req, Resp> {
    set: &'a InterceptorSet<Req, Resp>,
    request: &'a Req,
    response: &'a mut Resp,
    cursor: usize,
}

impl<'a, Req: UserRequest, Resp> InterceptorChain<'a, Req, Resp> {
    pub fn new(set: &'a InterceptorSet<Req, Resp>, request: &'a Req, response: &'a mut Resp) -> Self {
        Self {
            set,
            request,
            response,
            cursor: 0,
        }
    }

    pub fn request(&self) -> &'a Req {
        self.request
    }

    pub fn response(&self) -> &Resp {
        &*self.response
    }

    pub fn response_mut(&mut self) -> &mut Resp {
        &mut *self.response
    }

    /// Invoke the next interceptor compatible with the request's exchange.
    ///
    /// A no-op once the set is exhausted. Compatibility is evaluated here,
    /// per request, because the exchange varies from request to request.
    pub fn proceed(&mut self) -> Result<(), InterceptError> {
        let set = self.set;
        let exchange_id = self.request.exchange().id();

        while let Some(entry) = set.entries.get(self.cursor) {
            self.cursor += 1;
            if !entry.accepts(exchange_id) {
                continue;
            }

            let name = entry.interceptor.name();
            tracing::debug!(interceptor = name, ">> execute");
            let result = {
                let _timing = entry.timer.time();
                entry.interceptor.execute(self)
            };
            tracing::debug!(interceptor = name, ok = result.is_ok(), "<< execute");
            return result;
        }

        Ok(())
    }
}
