//! Bid receiver and wire mapping.
//!
//! # Responsibilities
//! - Map the exchange payload to the canonical auction
//! - Run the bid pipeline
//! - Expand macros in bid markup and serialize the native response
//!
//! # Status Codes
//! ```text
//! malformed payload  → 400
//! bids               → 200 + payload
//! no bids            → 204
//! aborted            → 200, empty body
//! failed             → 500, empty body
//! ```

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{RuntimeSettings, SharedSettings};
use crate::exchange::Exchange;
use crate::http::{HttpRequest, MEDIA_JSON};
use crate::interceptor::BidController;
use crate::model::{Bid, BidRequest, BidResponse, UserResponse};
use crate::price::{price_to_micros, PriceCodec, PriceError};
use crate::receiver::{HttpReceiver, Outcome, ReceiverContext, RequestReceiver};
use crate::snippet::{SnippetContext, SnippetError};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("malformed bid request: {0}")]
    Malformed(String),

    #[error("cannot serialize bid response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Snippet(#[from] SnippetError),

    #[error("invalid bid price: {0}")]
    Price(#[from] PriceError),
}

/// Translates between an exchange's wire format and the canonical model.
pub trait BidMapper: Send + Sync {
    fn to_auction(&self, http: &HttpRequest) -> Result<Value, MappingError>;

    /// Fill the native response from the canonical bids.
    fn to_native(&self, request: &BidRequest, response: &BidResponse) -> Result<Vec<u8>, MappingError>;

    fn media_type(&self) -> &'static str {
        MEDIA_JSON
    }
}

/// JSON mapping for OpenRTB-style exchanges.
///
/// Responses whose native blank has a `seatbid` array get OpenRTB seat bids;
/// those with an `ad` array get one ad per bid with its price in micros.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBidMapper;

impl BidMapper for JsonBidMapper {
    fn to_auction(&self, http: &HttpRequest) -> Result<Value, MappingError> {
        let auction: Value = serde_json::from_slice(http.body())
            .map_err(|e| MappingError::Malformed(e.to_string()))?;
        if !auction.is_object() {
            return Err(MappingError::Malformed("payload is not a JSON object".into()));
        }
        Ok(auction)
    }

    fn to_native(&self, request: &BidRequest, response: &BidResponse) -> Result<Vec<u8>, MappingError> {
        let mut native = response.native().clone();
        if let Some(object) = native.as_object_mut() {
            if object.contains_key("seatbid") {
                if let Some(id) = request.id() {
                    object.insert("id".into(), Value::String(id.to_string()));
                }
                object.insert(
                    "seatbid".into(),
                    json!([{ "bid": serde_json::to_value(response.bids())? }]),
                );
            } else if object.contains_key("ad") {
                let ads = response.bids().iter().map(ad_for).collect::<Result<Vec<_>, _>>()?;
                object.insert("ad".into(), Value::Array(ads));
            } else {
                object.insert("bids".into(), serde_json::to_value(response.bids())?);
            }
        }
        Ok(serde_json::to_vec(&native)?)
    }
}

fn ad_for(bid: &Bid) -> Result<Value, MappingError> {
    let micros = price_to_micros(bid.price)?;
    let mut ad = json!({
        "adslot": [{ "id": bid.imp_id, "max_cpm_micros": micros }],
    });
    if let Some(adm) = &bid.adm {
        ad["html_snippet"] = Value::String(adm.clone());
    }
    if let (Some(w), Some(h)) = (bid.width, bid.height) {
        ad["width"] = json!([w]);
        ad["height"] = json!([h]);
    }
    Ok(ad)
}

pub struct BidReceiver {
    core: RequestReceiver<BidRequest, BidResponse>,
    mapper: Arc<dyn BidMapper>,
    price_codec: Option<PriceCodec>,
}

impl BidReceiver {
    pub fn new(
        exchange: &'static Exchange,
        controller: Arc<BidController>,
        settings: SharedSettings,
        mapper: Arc<dyn BidMapper>,
        price_codec: Option<PriceCodec>,
    ) -> Self {
        Self {
            core: RequestReceiver::new("bid", exchange, controller, settings),
            mapper,
            price_codec,
        }
    }

    pub fn core(&self) -> &RequestReceiver<BidRequest, BidResponse> {
        &self.core
    }

    fn render(
        &self,
        request: &BidRequest,
        response: &mut BidResponse,
        settings: &RuntimeSettings,
    ) -> Result<Vec<u8>, MappingError> {
        let mut bids = response.take_bids();
        for bid in &mut bids {
            if let Some(adm) = bid.adm.as_deref() {
                let ctx = SnippetContext::new(bid)
                    .with_auction(request.auction())
                    .with_price_codec(self.price_codec.as_ref());
                let expanded = settings.snippets.process(adm, &ctx)?;
                bid.adm = Some(expanded);
            }
        }
        for bid in bids {
            response.add_bid(bid);
        }
        self.mapper.to_native(request, response)
    }
}

impl HttpReceiver for BidReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timer = self.core.time();
        let settings = self.core.settings();

        let auction = match self.mapper.to_auction(ctx.request()) {
            Ok(auction) => auction,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting bid request");
                self.core.mark_failed();
                ctx.response_mut().set_status(StatusCode::BAD_REQUEST).clear_body();
                return;
            }
        };

        let exchange = self.core.exchange();
        let request = BidRequest::new(exchange, ctx.request().clone(), auction);
        let mut response = BidResponse::new(exchange);
        let outcome = self.core.dispatch(&request, &mut response);
        ctx.set_response(std::mem::take(response.http_response_mut()));

        match outcome {
            Outcome::Success if !response.has_bids() => {
                ctx.response_mut().set_status(StatusCode::NO_CONTENT).clear_body();
                self.core.mark_success();
            }
            Outcome::Success => match self.render(&request, &mut response, &settings) {
                Ok(body) => {
                    ctx.response_mut()
                        .set_ok()
                        .set_media_type(self.mapper.media_type())
                        .set_body(body);
                    self.core.mark_success();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize bid response");
                    self.core.mark_failed();
                    ctx.response_mut()
                        .set_status(StatusCode::INTERNAL_SERVER_ERROR)
                        .clear_body();
                }
            },
            Outcome::Aborted => {
                ctx.response_mut().set_ok().clear_body();
            }
            Outcome::Failed => {
                ctx.response_mut()
                    .set_status(StatusCode::INTERNAL_SERVER_ERROR)
                    .clear_body();
            }
        }
    }
}
