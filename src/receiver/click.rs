//! Click tracking receiver.

use axum::http::StatusCode;
use std::sync::Arc;

use crate::config::SharedSettings;
use crate::exchange::Exchange;
use crate::interceptor::ClickController;
use crate::model::{ClickRequest, ClickResponse, UserResponse};
use crate::observability::metrics::CLICK_NO_REDIRECT_TOTAL;
use crate::observability::Meter;
use crate::receiver::{HttpReceiver, Outcome, ReceiverContext, RequestReceiver};

/// Redirects with `302 Found` when an interceptor chose a target, otherwise
/// answers 200 and counts the click as having no redirect.
pub struct ClickReceiver {
    core: RequestReceiver<ClickRequest, ClickResponse>,
    no_redirect: Meter,
}

impl ClickReceiver {
    pub fn new(
        exchange: &'static Exchange,
        controller: Arc<ClickController>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            core: RequestReceiver::new("click", exchange, controller, settings),
            no_redirect: Meter::named(CLICK_NO_REDIRECT_TOTAL),
        }
    }

    pub fn core(&self) -> &RequestReceiver<ClickRequest, ClickResponse> {
        &self.core
    }

    pub fn no_redirect_count(&self) -> u64 {
        self.no_redirect.count()
    }
}

impl HttpReceiver for ClickReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timer = self.core.time();
        let exchange = self.core.exchange();

        let request = ClickRequest::new(exchange, ctx.request().clone());
        let mut response = ClickResponse::new(exchange);
        let outcome = self.core.dispatch(&request, &mut response);
        ctx.set_response(std::mem::take(response.http_response_mut()));

        match outcome {
            Outcome::Success => {
                let http = ctx.response_mut();
                if http.is_redirect() {
                    tracing::debug!(location = http.redirect(), "Click redirect");
                    http.set_status(StatusCode::FOUND);
                } else {
                    tracing::debug!("No redirect location for click");
                    self.no_redirect.mark();
                    http.set_ok();
                }
                self.core.mark_success();
            }
            Outcome::Aborted => {
                ctx.set_response(Default::default());
            }
            Outcome::Failed => {
                ctx.set_response(Default::default());
                ctx.response_mut().set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}
