//! Cookie matching receiver.

use axum::http::StatusCode;
use std::sync::Arc;

use crate::config::SharedSettings;
use crate::exchange::Exchange;
use crate::interceptor::MatchController;
use crate::model::{MatchRequest, MatchResponse, UserResponse};
use crate::receiver::{HttpReceiver, Outcome, ReceiverContext, RequestReceiver};

/// Answers with whatever the interceptors built; usually a redirect back to
/// the exchange carrying the bidder's user id.
pub struct MatchReceiver {
    core: RequestReceiver<MatchRequest, MatchResponse>,
}

impl MatchReceiver {
    pub fn new(
        exchange: &'static Exchange,
        controller: Arc<MatchController>,
        settings: SharedSettings,
    ) -> Self {
        Self {
            core: RequestReceiver::new("match", exchange, controller, settings),
        }
    }

    pub fn core(&self) -> &RequestReceiver<MatchRequest, MatchResponse> {
        &self.core
    }
}

impl HttpReceiver for MatchReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timer = self.core.time();
        let exchange = self.core.exchange();

        let request = MatchRequest::new(exchange, ctx.request().clone());
        let mut response = MatchResponse::new(exchange);
        let outcome = self.core.dispatch(&request, &mut response);

        match outcome {
            Outcome::Success => {
                ctx.set_response(std::mem::take(response.http_response_mut()));
                self.core.mark_success();
            }
            Outcome::Aborted => {
                ctx.response_mut().set_ok().clear_body();
            }
            Outcome::Failed => {
                ctx.response_mut()
                    .set_status(StatusCode::INTERNAL_SERVER_ERROR)
                    .clear_body();
            }
        }
    }
}
