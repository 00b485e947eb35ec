//! Cookie matching: exchange and bidder exchange user identifiers.
//!
//! Interceptors usually answer with a redirect back to the exchange carrying
//! the bidder's user id as a query parameter.

use axum::http::StatusCode;
use serde_json::{Map, Value};
use url::Url;

use crate::exchange::Exchange;
use crate::http::{HttpRequest, HttpResponseBuilder};
use crate::model::{impl_user_request, impl_user_response};

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    exchange: &'static Exchange,
    http: HttpRequest,
}

impl_user_request!(MatchRequest);

impl MatchRequest {
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
pub struct MatchResponse {
    exchange: &'static Exchange,
    http: HttpResponseBuilder,
    metadata: Map<String, Value>,
}

impl_user_response!(MatchResponse);

impl MatchResponse {
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

    pub fn set_redirect_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.http
            .set_status(StatusCode::FOUND)
            .set_redirect(location);
        self
    }

    /// Host of the redirect target, if it is an absolute URL.
    pub fn redirect_host(&self) -> Option<String> {
        self.redirect_url()?.host_str().map(str::to_string)
    }

    /// All values of a query parameter of the redirect target.
    pub fn redirect_parameters(&self, name: &str) -> Vec<String> {
        self.redirect_url()
            .map(|url| {
                url.query_pairs()
                    .filter(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append a query parameter to the redirect target.
    ///
    /// Ignored when there is no absolute redirect target or the key is empty.
    pub fn put_redirect_parameter(&mut self, key: &str, value: &str) -> &mut Self {
        if key.is_empty() {
            tracing::warn!("Ignoring redirect parameter with empty name");
            return self;
        }
        if let Some(mut url) = self.redirect_url() {
            url.query_pairs_mut().append_pair(key, value);
            self.http.set_redirect(url.as_str());
        }
        self
    }

    /// Remove one key/value pair from the redirect target's query.
    pub fn remove_redirect_parameter(&mut self, key: &str, value: &str) -> &mut Self {
        if let Some(mut url) = self.redirect_url() {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, v)| !(k == key && v == value))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept);
            }
            self.http.set_redirect(url.as_str());
        }
        self
    }

    fn redirect_url(&self) -> Option<Url> {
        self.http.redirect().and_then(|r| Url::parse(r).ok())
    }
}
