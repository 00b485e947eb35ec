//! Impression callback receiver.

use axum::http::StatusCode;
use std::sync::Arc;

use crate::config::SharedSettings;
use crate::exchange::Exchange;
use crate::http::MEDIA_GIF;
use crate::interceptor::ImpressionController;
use crate::model::{ImpressionRequest, ImpressionResponse, UserResponse};
use crate::observability::metrics::record_price_decode_failure;
use crate::price::{PriceCodec, PriceError};
use crate::receiver::{HttpReceiver, Outcome, ReceiverContext, RequestReceiver};

/// 1x1 transparent GIF.
pub const PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Answers impression callbacks with a pixel, exposing the winning price
/// to interceptors through [`ImpressionRequest::price_value`].
pub struct ImpressionReceiver {
    core: RequestReceiver<ImpressionRequest, ImpressionResponse>,
    price_codec: Option<PriceCodec>,
}

impl ImpressionReceiver {
    pub fn new(
        exchange: &'static Exchange,
        controller: Arc<ImpressionController>,
        settings: SharedSettings,
        price_codec: Option<PriceCodec>,
    ) -> Self {
        Self {
            core: RequestReceiver::new("impression", exchange, controller, settings),
            price_codec,
        }
    }

    pub fn core(&self) -> &RequestReceiver<ImpressionRequest, ImpressionResponse> {
        &self.core
    }
}

impl HttpReceiver for ImpressionReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timer = self.core.time();
        let settings = self.core.settings();
        let exchange = self.core.exchange();

        let mut request = ImpressionRequest::new(exchange, ctx.request().clone())
            .with_price_name(settings.price_parameter.clone());
        if let Some(codec) = &self.price_codec {
            request = request.with_price_codec(codec.clone());
        }
        let mut response = ImpressionResponse::new(exchange);
        let outcome = self.core.dispatch(&request, &mut response);

        if let Some(Err(e)) = request.decoded_price() {
            report_decode_failure(e);
        }

        ctx.set_response(std::mem::take(response.http_response_mut()));
        match outcome {
            Outcome::Success | Outcome::Aborted => {
                ctx.response_mut()
                    .set_ok()
                    .set_media_type(MEDIA_GIF)
                    .set_body(PIXEL);
                if outcome == Outcome::Success {
                    self.core.mark_success();
                }
            }
            Outcome::Failed => {
                ctx.response_mut()
                    .set_status(StatusCode::INTERNAL_SERVER_ERROR)
                    .clear_body();
            }
        }
    }
}

fn report_decode_failure(error: &PriceError) {
    if matches!(error, PriceError::Missing(_)) {
        return;
    }
    if error.is_authentication_failure() {
        tracing::warn!(kind = error.reason(), "Winning price failed authentication");
    } else {
        tracing::warn!(kind = error.reason(), error = %error, "Winning price not decoded");
    }
    record_price_decode_failure(error.reason());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{shared_settings, RuntimeSettings};
    use crate::exchange::OPENRTB;
    use crate::http::HttpRequest;
    use crate::interceptor::{ImpressionChain, InterceptError, Interceptor};
    use crate::price::{EncryptionKey, IntegrityKey};
    use std::sync::Mutex;

    #[derive(Default)]
    struct PriceRecorder {
        seen: Mutex<Vec<Result<f64, PriceError>>>,
    }

    impl Interceptor<ImpressionRequest, ImpressionResponse> for PriceRecorder {
        fn execute(&self, chain: &mut ImpressionChain<'_>) -> Result<(), InterceptError> {
            let price = chain.request().price_value();
            self.seen.lock().unwrap().push(price);
            chain.proceed()
        }
    }

    fn codec() -> PriceCodec {
        PriceCodec::new(
            EncryptionKey::new(vec![3u8; 32]).unwrap(),
            IntegrityKey::new(vec![4u8; 32]).unwrap(),
        )
    }

    fn setup(codec: Option<PriceCodec>) -> (ImpressionReceiver, Arc<PriceRecorder>) {
        let recorder = Arc::new(PriceRecorder::default());
        let controller = ImpressionController::new(
            "impression",
            vec![Arc::clone(&recorder) as Arc<dyn Interceptor<ImpressionRequest, ImpressionResponse>>],
        );
        controller.start().unwrap();
        let receiver = ImpressionReceiver::new(
            &OPENRTB,
            controller,
            shared_settings(RuntimeSettings::default()),
            codec,
        );
        (receiver, recorder)
    }

    fn get(receiver: &ImpressionReceiver, uri: &str) -> ReceiverContext {
        let mut ctx = ReceiverContext::new(HttpRequest::get(uri).unwrap());
        receiver.receive(&mut ctx);
        ctx
    }

    #[test]
    fn test_encrypted_price_reaches_interceptor() {
        let (receiver, recorder) = setup(Some(codec()));
        let token = codec().encode(2.5).unwrap();
        let ctx = get(&receiver, &format!("/impression?price={}", token));

        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().header("content-type"), Some(MEDIA_GIF));
        assert_eq!(ctx.response().body(), PIXEL);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[Ok(2.5)]);
        assert_eq!(receiver.core().success_count(), 1);
    }

    #[test]
    fn test_forged_price_still_answers_pixel() {
        let other = PriceCodec::new(
            EncryptionKey::new(vec![3u8; 32]).unwrap(),
            IntegrityKey::new(vec![5u8; 32]).unwrap(),
        );
        let (receiver, recorder) = setup(Some(codec()));
        let token = other.encode(2.5).unwrap();
        let ctx = get(&receiver, &format!("/impression?price={}", token));

        assert_eq!(ctx.response().body(), PIXEL);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[Err(PriceError::Signature)]);
    }

    #[test]
    fn test_plain_price_without_codec() {
        let (receiver, recorder) = setup(None);
        get(&receiver, "/impression?price=1.25");
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[Ok(1.25)]);
    }

    #[test]
    fn test_unknown_price_is_zero() {
        let (receiver, recorder) = setup(Some(codec()));
        get(&receiver, "/impression?price=UNKNOWN");
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[Ok(0.0)]);
    }
}
