//! Fallback receivers used by the router.

use axum::http::{header, Method, StatusCode};

use crate::receiver::{HttpReceiver, ReceiverContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundReceiver;

impl HttpReceiver for NotFoundReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        ctx.response_mut().set_status(StatusCode::NOT_FOUND).clear_body();
    }
}

/// 405 with an `Allow` header listing the registered methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodNotAllowedReceiver;

impl HttpReceiver for MethodNotAllowedReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let allow = allow_header(ctx.allowed_methods());
        ctx.response_mut()
            .set_status(StatusCode::METHOD_NOT_ALLOWED)
            .set_header_str(header::ALLOW, &allow)
            .clear_body();
    }
}

/// Answers OPTIONS with the registered methods plus OPTIONS itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsReceiver;

impl HttpReceiver for OptionsReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let mut methods = ctx.allowed_methods().to_vec();
        if !methods.contains(&Method::OPTIONS) {
            methods.push(Method::OPTIONS);
        }
        ctx.response_mut()
            .set_ok()
            .set_header_str(header::ALLOW, &allow_header(&methods))
            .clear_body();
    }
}

fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
