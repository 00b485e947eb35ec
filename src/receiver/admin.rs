//! Admin receivers: health check and status.

use axum::http::{header, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::http::MEDIA_JSON;
use crate::interceptor::InterceptorController;
use crate::lifecycle::State;
use crate::model::UserRequest;
use crate::receiver::{HttpReceiver, ReceiverContext};

/// What the admin endpoints need to know about a controller.
pub trait ControllerInfo: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> State;

    fn interceptor_names(&self) -> Vec<String>;
}

impl<Req, Resp> ControllerInfo for InterceptorController<Req, Resp>
where
    Req: UserRequest + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &str {
        InterceptorController::name(self)
    }

    fn state(&self) -> State {
        InterceptorController::state(self)
    }

    fn interceptor_names(&self) -> Vec<String> {
        InterceptorController::interceptor_names(self)
    }
}

#[derive(Serialize)]
pub struct ControllerStatus {
    pub name: String,
    pub state: String,
    pub interceptors: Vec<String>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub controllers: Vec<ControllerStatus>,
}

fn all_running(controllers: &[Arc<dyn ControllerInfo>]) -> bool {
    controllers.iter().all(|c| c.state() == State::Running)
}

fn write_json<T: Serialize>(ctx: &mut ReceiverContext, status: StatusCode, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            ctx.response_mut()
                .set_status(status)
                .set_media_type(MEDIA_JSON)
                .set_body(body);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize admin response");
            ctx.response_mut()
                .set_status(StatusCode::INTERNAL_SERVER_ERROR)
                .clear_body();
        }
    }
}

/// 200 while every controller is running, 503 otherwise.
pub struct HealthReceiver {
    controllers: Vec<Arc<dyn ControllerInfo>>,
}

impl HealthReceiver {
    pub fn new(controllers: Vec<Arc<dyn ControllerInfo>>) -> Self {
        Self { controllers }
    }
}

impl HttpReceiver for HealthReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let (status, label) = if all_running(&self.controllers) {
            (StatusCode::OK, "healthy")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        };
        write_json(ctx, status, &serde_json::json!({ "status": label }));
    }
}

/// Version and controller states. Requires `Authorization: Bearer <api_key>`
/// when an API key is configured.
pub struct StatusReceiver {
    controllers: Vec<Arc<dyn ControllerInfo>>,
    api_key: Option<String>,
}

impl StatusReceiver {
    pub fn new(controllers: Vec<Arc<dyn ControllerInfo>>, api_key: Option<String>) -> Self {
        Self {
            controllers,
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn authorized(&self, ctx: &ReceiverContext) -> bool {
        let Some(key) = &self.api_key else {
            return true;
        };
        ctx.request()
            .header(header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| bool::from(token.as_bytes().ct_eq(key.as_bytes())))
    }
}

impl HttpReceiver for StatusReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        if !self.authorized(ctx) {
            tracing::warn!(remote = ?ctx.request().remote_addr(), "Unauthorized admin request");
            ctx.response_mut()
                .set_status(StatusCode::UNAUTHORIZED)
                .set_header_str(header::WWW_AUTHENTICATE, "Bearer")
                .clear_body();
            return;
        }

        let status = SystemStatus {
            version: env!("CARGO_PKG_VERSION"),
            status: if all_running(&self.controllers) {
                "operational"
            } else {
                "degraded"
            },
            controllers: self
                .controllers
                .iter()
                .map(|c| ControllerStatus {
                    name: c.name().to_string(),
                    state: c.state().to_string(),
                    interceptors: c.interceptor_names(),
                })
                .collect(),
        };
        write_json(ctx, StatusCode::OK, &status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpRequest;
    use crate::interceptor::{BidController, Interceptor, TraceInterceptor};
    use crate::model::{BidRequest, BidResponse};
    use axum::http::HeaderValue;
    use serde_json::Value;

    fn controller() -> Arc<BidController> {
        BidController::new(
            "bid",
            vec![Arc::new(TraceInterceptor::new()) as Arc<dyn Interceptor<BidRequest, BidResponse>>],
        )
    }

    fn get(receiver: &dyn HttpReceiver, auth: Option<&'static str>) -> ReceiverContext {
        let mut request = HttpRequest::get("/admin").unwrap();
        if let Some(auth) = auth {
            request = request.with_header(header::AUTHORIZATION, HeaderValue::from_static(auth));
        }
        let mut ctx = ReceiverContext::new(request);
        receiver.receive(&mut ctx);
        ctx
    }

    #[test]
    fn test_health_follows_controller_state() {
        let bid = controller();
        let health = HealthReceiver::new(vec![Arc::clone(&bid) as Arc<dyn ControllerInfo>]);
        assert_eq!(get(&health, None).response().status(), StatusCode::SERVICE_UNAVAILABLE);

        bid.start().unwrap();
        assert_eq!(get(&health, None).response().status(), StatusCode::OK);

        bid.stop();
        assert_eq!(get(&health, None).response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_lists_controllers() {
        let bid = controller();
        bid.start().unwrap();
        let status = StatusReceiver::new(vec![bid as Arc<dyn ControllerInfo>], None);

        let ctx = get(&status, None);
        assert_eq!(ctx.response().status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(ctx.response().body()).unwrap();
        assert_eq!(body["status"], "operational");
        assert_eq!(body["controllers"][0]["name"], "bid");
        assert_eq!(body["controllers"][0]["state"], "RUNNING");
        assert_eq!(body["controllers"][0]["interceptors"][0], "trace");
    }

    #[test]
    fn test_status_requires_bearer_key() {
        let status = StatusReceiver::new(vec![], Some("s3cret".into()));
        assert_eq!(get(&status, None).response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get(&status, Some("Bearer wrong")).response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get(&status, Some("Bearer s3cret")).response().status(), StatusCode::OK);
    }
}
