//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Capture the inbound transport message (method, URI, headers, body)
//! - Decode query parameters once, up front
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The captured message is immutable; receivers only read it
//! - Bodies are buffered; bid payloads are small and bounded by the body limit layer

use axum::body::Bytes;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, Method, Request, Uri};
use std::net::SocketAddr;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator backed by random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// An inbound HTTP request, as seen by receivers and interceptors.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
}

impl HttpRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        let params = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params,
            remote_addr: None,
        }
    }

    /// Shorthand for a `GET` request, mostly useful in tests and tools.
    pub fn get(uri: &str) -> Result<Self, axum::http::uri::InvalidUri> {
        Ok(Self::new(Method::GET, uri.parse()?))
    }

    /// Shorthand for a `POST` request with a body.
    pub fn post(uri: &str, body: impl Into<Bytes>) -> Result<Self, axum::http::uri::InvalidUri> {
        Ok(Self::new(Method::POST, uri.parse()?).with_body(body))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path, without query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// First value of a query parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a query parameter, in order of appearance.
    pub fn parameters<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Correlation ID assigned by the request ID layer.
    pub fn request_id(&self) -> &str {
        self.header(X_REQUEST_ID).unwrap_or("unknown")
    }
}
