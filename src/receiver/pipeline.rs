//! Behaviour shared by every pipeline receiver.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::{RuntimeSettings, SharedSettings};
use crate::exchange::Exchange;
use crate::interceptor::error::panic_message;
use crate::interceptor::{InterceptError, InterceptorController};
use crate::model::UserRequest;
use crate::observability::metrics::TimerGuard;
use crate::observability::{Meter, Timer};

/// How a chain ended, as far as the receiver is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Aborted,
    Failed,
}

/// Owns the controller, the request timer and the outcome meters, and
/// contains aborts, failures and panics raised by interceptors.
pub struct RequestReceiver<Req, Resp> {
    name: &'static str,
    exchange: &'static Exchange,
    controller: Arc<InterceptorController<Req, Resp>>,
    settings: SharedSettings,
    request_timer: Timer,
    success: Meter,
    aborted: Meter,
    failed: Meter,
}

impl<Req, Resp> RequestReceiver<Req, Resp>
where
    Req: UserRequest + 'static,
    Resp: Send + 'static,
{
    pub fn new(
        name: &'static str,
        exchange: &'static Exchange,
        controller: Arc<InterceptorController<Req, Resp>>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            name,
            exchange,
            controller,
            settings,
            request_timer: Timer::receiver(name),
            success: Meter::receiver(name, "success"),
            aborted: Meter::receiver(name, "aborted"),
            failed: Meter::receiver(name, "failed"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn exchange(&self) -> &'static Exchange {
        self.exchange
    }

    pub fn controller(&self) -> &Arc<InterceptorController<Req, Resp>> {
        &self.controller
    }

    /// One settings snapshot, to be used for the whole request.
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        self.settings.load_full()
    }

    pub fn time(&self) -> TimerGuard<'_> {
        self.request_timer.time()
    }

    /// Run the pipeline. Aborts and failures are logged and counted here;
    /// success is counted by the caller once the response is serialized.
    pub fn dispatch(&self, request: &Req, response: &mut Resp) -> Outcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.controller.on_request(request, response)
        }));

        match result {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(InterceptError::Abort { reason })) => {
                tracing::warn!(receiver = self.name, reason = %reason, "Request aborted");
                self.aborted.mark();
                Outcome::Aborted
            }
            Ok(Err(e)) => {
                tracing::error!(receiver = self.name, error = %e, "Request failed");
                self.failed.mark();
                Outcome::Failed
            }
            Err(payload) => {
                tracing::error!(
                    receiver = self.name,
                    panic = panic_message(payload.as_ref()),
                    "Interceptor panicked"
                );
                self.failed.mark();
                Outcome::Failed
            }
        }
    }

    pub fn mark_success(&self) {
        self.success.mark();
    }

    /// Count a failure that happened outside the chain, e.g. while mapping.
    pub fn mark_failed(&self) {
        self.failed.mark();
    }

    pub fn success_count(&self) -> u64 {
        self.success.count()
    }

    pub fn aborted_count(&self) -> u64 {
        self.aborted.count()
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.count()
    }

    pub fn request_count(&self) -> u64 {
        self.request_timer.count()
    }
}
