//! Response handling and transformation.
//!
//! # Responsibilities
//! - Collect status, headers, body and redirect while interceptors run
//! - Convert the collected response into the transport's response type
//!
//! # Design Decisions
//! - The builder is mutable; typed responses own it for the length of one chain
//! - Invalid header values are dropped with a warning instead of failing the request

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

/// Media type of bid payloads.
pub const MEDIA_JSON: &str = "application/json";

/// Media type of the impression pixel.
pub const MEDIA_GIF: &str = "image/gif";

/// Outbound HTTP response under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    redirect: Option<String>,
}

impl Default for HttpResponseBuilder {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            redirect: None,
        }
    }
}

impl HttpResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn set_ok(&mut self) -> &mut Self {
        self.set_status(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a header from a string value; invalid values are dropped.
    pub fn set_header_str(&mut self, name: HeaderName, value: &str) -> &mut Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping invalid header value"),
        }
        self
    }

    pub fn set_media_type(&mut self, media_type: &'static str) -> &mut Self {
        self.set_header(header::CONTENT_TYPE, HeaderValue::from_static(media_type))
    }

    /// Append a `Set-Cookie` header.
    pub fn add_cookie(&mut self, cookie: &str) -> &mut Self {
        match HeaderValue::from_str(cookie) {
            Ok(v) => {
                self.headers.append(header::SET_COOKIE, v);
            }
            Err(_) => tracing::warn!("Dropping invalid cookie"),
        }
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn clear_body(&mut self) -> &mut Self {
        self.body.clear();
        self
    }

    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Record a redirect target; the status is left to the receiver.
    pub fn set_redirect(&mut self, location: impl Into<String>) -> &mut Self {
        self.redirect = Some(location.into());
        self
    }

    /// True when the status is a 3xx and a redirect target is known.
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection() && self.redirect.is_some()
    }

    /// Convert into the transport's response.
    pub fn into_response(self) -> Response {
        let mut headers = self.headers;
        if let Some(location) = self.redirect.as_deref() {
            match HeaderValue::from_str(location) {
                Ok(v) => {
                    headers.insert(header::LOCATION, v);
                }
                Err(_) => tracing::warn!(location, "Dropping invalid redirect location"),
            }
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}
