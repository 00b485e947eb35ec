//! Typed request/response pairs handed to interceptors.
//!
//! # Responsibilities
//! - Carry the canonical data of one inbound call plus its transport message
//! - Give interceptors one mutable response per request
//!
//! # Design Decisions
//! - Plain records with `with_*` copy constructors; `clone()` then `with_*`
//!   reconstructs an equivalent value
//! - Requests are immutable once built; responses are mutated only through the chain
//! - The exchange is a `&'static` reference, compared by identity

pub mod bid;
pub mod click;
pub mod impression;
pub mod matching;

pub use bid::{Bid, BidRequest, BidResponse};
pub use click::{ClickRequest, ClickResponse};
pub use impression::{ImpressionRequest, ImpressionResponse};
pub use matching::{MatchRequest, MatchResponse};

use serde_json::{Map, Value};

use crate::exchange::Exchange;
use crate::http::{HttpRequest, HttpResponseBuilder};

/// Common view of every typed request.
pub trait UserRequest: Send + Sync {
    fn exchange(&self) -> &'static Exchange;

    fn http_request(&self) -> &HttpRequest;
}

/// Common view of every typed response.
pub trait UserResponse: Send {
    fn exchange(&self) -> &'static Exchange;

    fn http_response(&self) -> &HttpResponseBuilder;

    fn http_response_mut(&mut self) -> &mut HttpResponseBuilder;

    /// Free-form values interceptors leave for later interceptors or for logging.
    fn metadata(&self) -> &Map<String, Value>;

    fn metadata_mut(&mut self) -> &mut Map<String, Value>;

    fn put_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>)
    where
        Self: Sized,
    {
        self.metadata_mut().insert(key.into(), value.into());
    }
}

macro_rules! impl_user_request {
    ($ty:ty) => {
        impl $crate::model::UserRequest for $ty {
            fn exchange(&self) -> &'static $crate::exchange::Exchange {
                self.exchange
            }

            fn http_request(&self) -> &$crate::http::HttpRequest {
                &self.http
            }
        }
    };
}

macro_rules! impl_user_response {
    ($ty:ty) => {
        impl $crate::model::UserResponse for $ty {
            fn exchange(&self) -> &'static $crate::exchange::Exchange {
                self.exchange
            }

            fn http_response(&self) -> &$crate::http::HttpResponseBuilder {
                &self.http
            }

            fn http_response_mut(&mut self) -> &mut $crate::http::HttpResponseBuilder {
                &mut self.http
            }

            fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
                &mut self.metadata
            }
        }
    };
}

pub(crate) use impl_user_request;
pub(crate) use impl_user_response;
