//! Per-request state handed to a receiver.

use axum::http::Method;

use crate::http::{HttpRequest, HttpResponseBuilder};

/// The inbound message, the response under construction, and what the
/// router learned while selecting the receiver.
#[derive(Debug)]
pub struct ReceiverContext {
    request: HttpRequest,
    response: HttpResponseBuilder,
    allowed_methods: Vec<Method>,
}

impl ReceiverContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: HttpResponseBuilder::new(),
            allowed_methods: Vec::new(),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn response(&self) -> &HttpResponseBuilder {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponseBuilder {
        &mut self.response
    }

    /// Replace the response wholesale, e.g. with one built by a chain.
    pub fn set_response(&mut self, response: HttpResponseBuilder) {
        self.response = response;
    }

    /// Methods registered for the matched path. Empty unless the router
    /// fell back to a method-not-allowed or options receiver.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn set_allowed_methods(&mut self, methods: Vec<Method>) {
        self.allowed_methods = methods;
    }

    pub fn into_response(self) -> HttpResponseBuilder {
        self.response
    }
}
