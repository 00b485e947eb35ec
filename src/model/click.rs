//! Click tracking: record the click, then send the user on to the advertiser.

use axum::http::StatusCode;
use serde_json::{Map, Value};

use crate::exchange::Exchange;
use crate::http::{HttpRequest, HttpResponseBuilder};
use crate::model::{impl_user_request, impl_user_response};

#[derive(Debug, Clone, PartialEq)]
pub struct ClickRequest {
    exchange: &'static Exchange,
    http: HttpRequest,
}

impl_user_request!(ClickRequest);

impl ClickRequest {
    pub fn new(exchange: &'static Exchange, http: HttpRequest) -> Self {
        Self { exchange, http }
    }

    pub fn with_exchange(mut self, exchange: &'static Exchange) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_http_request(mut self, http: HttpRequest) -> Self {
        self.http = http;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickResponse {
    exchange: &'static Exchange,
    http: HttpResponseBuilder,
    metadata: Map<String, Value>,
}

impl_user_response!(ClickResponse);

impl ClickResponse {
    pub fn new(exchange: &'static Exchange) -> Self {
        Self {
            exchange,
            http: HttpResponseBuilder::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_exchange(mut self, exchange: &'static Exchange) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_http_response(mut self, http: HttpResponseBuilder) -> Self {
        self.http = http;
        self
    }

    pub fn redirect_location(&self) -> Option<&str> {
        self.http.redirect()
    }

    /// Redirect the user to `location` with a `302 Found`.
    pub fn set_redirect_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.http
            .set_status(StatusCode::FOUND)
            .set_redirect(location);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::NO_EXCHANGE;

    #[test]
    fn test_redirect_location() {
        let mut response = ClickResponse::new(&NO_EXCHANGE);
        assert!(response.redirect_location().is_none());

        response.set_redirect_location("http://advertiser.example/");
        assert_eq!(response.redirect_location(), Some("http://advertiser.example/"));
        assert!(response.http.is_redirect());
    }
}
