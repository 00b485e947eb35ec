//! Bid request and response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::exchange::Exchange;
use crate::http::{HttpRequest, HttpResponseBuilder};
use crate::model::{impl_user_request, impl_user_response};

/// One bid on one impression of the auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Impression this bid is for.
    #[serde(rename = "impid")]
    pub imp_id: String,

    /// Bid price in currency units (CPM).
    pub price: f64,

    /// Ad markup; may contain snippet macros.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,

    #[serde(default, rename = "crid", skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,

    #[serde(default, rename = "w", skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, rename = "h", skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,
}

impl Bid {
    pub fn new(imp_id: impl Into<String>, price: f64) -> Self {
        Self {
            imp_id: imp_id.into(),
            price,
            adm: None,
            creative_id: None,
            width: None,
            height: None,
            adomain: Vec::new(),
        }
    }

    pub fn with_adm(mut self, adm: impl Into<String>) -> Self {
        self.adm = Some(adm.into());
        self
    }

    pub fn with_creative_id(mut self, id: impl Into<String>) -> Self {
        self.creative_id = Some(id.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// An auction opportunity, already mapped to the canonical model.
#[derive(Debug, Clone, PartialEq)]
pub struct BidRequest {
    exchange: &'static Exchange,
    http: HttpRequest,
    auction: Value,
}

impl_user_request!(BidRequest);

impl BidRequest {
    pub fn new(exchange: &'static Exchange, http: HttpRequest, auction: Value) -> Self {
        Self {
            exchange,
            http,
            auction,
        }
    }

    pub fn with_exchange(mut self, exchange: &'static Exchange) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_http_request(mut self, http: HttpRequest) -> Self {
        self.http = http;
        self
    }

    pub fn with_auction(mut self, auction: Value) -> Self {
        self.auction = auction;
        self
    }

    /// The canonical auction object.
    pub fn auction(&self) -> &Value {
        &self.auction
    }

    /// Auction ID, if the payload has one.
    pub fn id(&self) -> Option<&str> {
        self.auction.get("id").and_then(Value::as_str)
    }

    /// IDs of the impressions on offer, in payload order.
    pub fn impression_ids(&self) -> impl Iterator<Item = &str> {
        self.auction
            .get("imp")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|imp| imp.get("id").and_then(Value::as_str))
    }
}

/// Bids collected by interceptors, plus the exchange's native response.
#[derive(Debug, Clone, PartialEq)]
pub struct BidResponse {
    exchange: &'static Exchange,
    http: HttpResponseBuilder,
    native: Value,
    bids: Vec<Bid>,
    metadata: Map<String, Value>,
}

impl_user_response!(BidResponse);

impl BidResponse {
    /// Empty response whose native object is the exchange's blank response.
    pub fn new(exchange: &'static Exchange) -> Self {
        Self {
            exchange,
            http: HttpResponseBuilder::new(),
            native: exchange.new_native_response(),
            bids: Vec::new(),
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

    pub fn with_native(mut self, native: Value) -> Self {
        self.native = native;
        self
    }

    pub fn with_bids(mut self, bids: Vec<Bid>) -> Self {
        self.bids = bids;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn native(&self) -> &Value {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut Value {
        &mut self.native
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn has_bids(&self) -> bool {
        !self.bids.is_empty()
    }

    pub fn add_bid(&mut self, bid: Bid) -> &mut Self {
        self.bids.push(bid);
        self
    }

    pub fn bid_for(&self, imp_id: &str) -> Option<&Bid> {
        self.bids.iter().find(|b| b.imp_id == imp_id)
    }

    /// Apply `update` to every bid. Returns true if any call reported a change.
    pub fn update_bids(&mut self, mut update: impl FnMut(&mut Bid) -> bool) -> bool {
        self.bids.iter_mut().fold(false, |changed, bid| update(bid) || changed)
    }

    /// Keep only bids accepted by `keep`. Returns true if any bid was removed.
    pub fn filter_bids(&mut self, keep: impl FnMut(&Bid) -> bool) -> bool {
        let before = self.bids.len();
        self.bids.retain(keep);
        self.bids.len() != before
    }

    pub fn clear_bids(&mut self) {
        self.bids.clear();
    }

    /// Take the bids out, for serialization.
    pub fn take_bids(&mut self) -> Vec<Bid> {
        std::mem::take(&mut self.bids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{NO_EXCHANGE, OPENRTB};
    use crate::model::{UserRequest, UserResponse};
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let http = HttpRequest::post("/bid", "{}").unwrap();
        let request = BidRequest::new(
            &OPENRTB,
            http.clone(),
            json!({"id": "a1", "imp": [{"id": "1"}, {"id": "2"}]}),
        );

        let rebuilt = request
            .clone()
            .with_exchange(request.exchange())
            .with_http_request(http)
            .with_auction(request.auction().clone());
        assert_eq!(rebuilt, request);
        assert_eq!(request.id(), Some("a1"));
        assert_eq!(request.impression_ids().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_response_starts_from_native_blank() {
        let response = BidResponse::new(&OPENRTB);
        assert_eq!(response.native(), &OPENRTB.new_native_response());
        assert!(!response.has_bids());
        assert!(std::ptr::eq(response.exchange(), &OPENRTB));
    }

    #[test]
    fn test_update_and_filter_bids() {
        let mut response = BidResponse::new(&NO_EXCHANGE);
        response
            .add_bid(Bid::new("1", 1.0))
            .add_bid(Bid::new("2", 2.0));

        assert!(response.update_bids(|b| {
            b.price *= 2.0;
            true
        }));
        assert_eq!(response.bid_for("2").unwrap().price, 4.0);

        assert!(response.filter_bids(|b| b.price < 3.0));
        assert_eq!(response.bids().len(), 1);
        assert!(!response.filter_bids(|_| true));
    }

    #[test]
    fn test_metadata() {
        let mut response = BidResponse::new(&NO_EXCHANGE);
        response.put_metadata("model", "v2");
        assert_eq!(response.metadata().get("model"), Some(&json!("v2")));
    }

    #[test]
    fn test_bid_serialization_names() {
        let bid = Bid::new("1", 2.5).with_size(300, 250).with_creative_id("c");
        let value = serde_json::to_value(&bid).unwrap();
        assert_eq!(value, json!({"impid": "1", "price": 2.5, "crid": "c", "w": 300, "h": 250}));
    }
}
