//! Impression notification: the exchange reports a won auction.

use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::exchange::Exchange;
use crate::http::{HttpRequest, HttpResponseBuilder};
use crate::model::{impl_user_request, impl_user_response};
use crate::price::{parse_plain_price, PriceCodec, PriceError};

#[derive(Debug, Clone)]
pub struct ImpressionRequest {
    exchange: &'static Exchange,
    http: HttpRequest,
    price_name: Option<String>,
    price_codec: Option<PriceCodec>,
    price: OnceLock<Result<f64, PriceError>>,
}

impl_user_request!(ImpressionRequest);

impl PartialEq for ImpressionRequest {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.exchange, other.exchange)
            && self.http == other.http
            && self.price_name == other.price_name
            && self.price_codec.is_some() == other.price_codec.is_some()
    }
}

impl ImpressionRequest {
    pub fn new(exchange: &'static Exchange, http: HttpRequest) -> Self {
        Self {
            exchange,
            http,
            price_name: None,
            price_codec: None,
            price: OnceLock::new(),
        }
    }

    pub fn with_exchange(mut self, exchange: &'static Exchange) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_http_request(mut self, http: HttpRequest) -> Self {
        self.http = http;
        self.price = OnceLock::new();
        self
    }

    /// Parameter that carries the winning price.
    pub fn with_price_name(mut self, name: impl Into<String>) -> Self {
        self.price_name = Some(name.into());
        self.price = OnceLock::new();
        self
    }

    /// Codec for encrypted prices; without one, prices are read as plain numbers.
    pub fn with_price_codec(mut self, codec: PriceCodec) -> Self {
        self.price_codec = Some(codec);
        self.price = OnceLock::new();
        self
    }

    pub fn price_name(&self) -> Option<&str> {
        self.price_name.as_deref()
    }

    pub fn price_codec(&self) -> Option<&PriceCodec> {
        self.price_codec.as_ref()
    }

    /// True if the request carries a winning price parameter.
    pub fn has_price(&self) -> bool {
        self.price_name
            .as_deref()
            .is_some_and(|name| self.http.has_parameter(name))
    }

    /// Winning price from the configured parameter. Decoded once, then cached.
    pub fn price_value(&self) -> Result<f64, PriceError> {
        self.price
            .get_or_init(|| match self.price_name.as_deref() {
                Some(name) => self.price_value_of(name),
                None => Err(PriceError::Missing(String::new())),
            })
            .clone()
    }

    /// Cached result of `price_value`, if an interceptor asked for it.
    pub fn decoded_price(&self) -> Option<&Result<f64, PriceError>> {
        self.price.get()
    }

    /// Winning price from an arbitrary parameter. Decoded on every call.
    pub fn price_value_of(&self, name: &str) -> Result<f64, PriceError> {
        let encoded = self
            .http
            .parameter(name)
            .ok_or_else(|| PriceError::Missing(name.to_string()))?;

        match &self.price_codec {
            Some(codec) => codec.decode(encoded),
            None => parse_plain_price(encoded),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionResponse {
    exchange: &'static Exchange,
    http: HttpResponseBuilder,
    metadata: Map<String, Value>,
}

impl_user_response!(ImpressionResponse);

impl ImpressionResponse {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::DOUBLECLICK;
    use crate::model::UserRequest;
    use crate::price::{EncryptionKey, IntegrityKey, PRICE_UNKNOWN};

    fn codec() -> PriceCodec {
        PriceCodec::new(
            EncryptionKey::new(vec![1u8; 32]).unwrap(),
            IntegrityKey::new(vec![2u8; 32]).unwrap(),
        )
    }

    fn request(query: &str) -> ImpressionRequest {
        let http = HttpRequest::get(&format!("/impression{}", query)).unwrap();
        ImpressionRequest::new(&DOUBLECLICK, http).with_price_name("price")
    }

    #[test]
    fn test_encrypted_price() {
        let token = codec().encode(2.50).unwrap();
        let req = request(&format!("?price={}", token)).with_price_codec(codec());
        assert!(req.has_price());
        assert_eq!(req.price_value(), Ok(2.50));
        // cached
        assert_eq!(req.price_value(), Ok(2.50));
    }

    #[test]
    fn test_plain_price_without_codec() {
        let req = request("?price=1.25&other=oops");
        assert_eq!(req.price_value(), Ok(1.25));
        assert_eq!(
            req.price_value_of("other"),
            Err(PriceError::Plaintext("oops".into()))
        );
    }

    #[test]
    fn test_plain_price_rejects_non_prices() {
        for bad in ["NaN", "inf", "-0.5"] {
            let req = request(&format!("?price={}", bad));
            assert!(
                matches!(req.price_value(), Err(PriceError::InvalidPrice(_))),
                "{} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_plain_price_sentinels_are_zero() {
        assert_eq!(request(&format!("?price={}", PRICE_UNKNOWN)).price_value(), Ok(0.0));
        assert_eq!(request("?price=").price_value(), Ok(0.0));
    }

    #[test]
    fn test_missing_price() {
        let req = request("");
        assert!(!req.has_price());
        assert_eq!(req.price_value(), Err(PriceError::Missing("price".into())));
    }

    #[test]
    fn test_unknown_price_is_zero() {
        let req = request(&format!("?price={}", PRICE_UNKNOWN)).with_price_codec(codec());
        assert_eq!(req.price_value(), Ok(0.0));
    }

    #[test]
    fn test_forged_price_fails() {
        let req = request("?price=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").with_price_codec(codec());
        let err = req.price_value().unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_round_trip() {
        let req = request("?price=1").with_price_codec(codec());
        let rebuilt = req
            .clone()
            .with_http_request(req.http_request().clone())
            .with_price_name("price");
        assert_eq!(rebuilt, req);
    }
}
