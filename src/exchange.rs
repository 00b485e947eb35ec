//! Ad exchange identities.
//!
//! # Responsibilities
//! - Identify the exchange a request came from
//! - Produce the blank native response a receiver starts from
//!
//! # Design Decisions
//! - Exchanges are `static` items created once per process
//! - Identity is by address: two exchanges are equal only if they are the same item
//! - Interceptors declare compatibility by exchange id, not by reference

use serde_json::{json, Value};
use std::fmt;

/// An external ad-auction marketplace integrated with the bidder.
pub struct Exchange {
    id: &'static str,
    blank_response: fn() -> Value,
}

impl Exchange {
    /// Declare an exchange. Intended for `static` items.
    pub const fn new(id: &'static str, blank_response: fn() -> Value) -> Self {
        Self { id, blank_response }
    }

    /// Exchange id used in compatibility sets and configuration.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// A fresh native response object for this exchange's wire format.
    pub fn new_native_response(&self) -> Value {
        (self.blank_response)()
    }

    /// Resolve one of the built-in exchanges by id.
    pub fn by_id(id: &str) -> Option<&'static Exchange> {
        BUILTIN.iter().copied().find(|e| e.id == id)
    }
}

impl PartialEq for Exchange {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for Exchange {}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Exchange").field(&self.id).finish()
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

fn empty_object() -> Value {
    json!({})
}

fn openrtb_response() -> Value {
    json!({ "id": "", "seatbid": [] })
}

fn doubleclick_response() -> Value {
    json!({ "ad": [], "processing_time_ms": 0 })
}

/// Placeholder for requests that are not tied to any exchange.
pub static NO_EXCHANGE: Exchange = Exchange::new("none", empty_object);

/// Generic OpenRTB JSON exchange.
pub static OPENRTB: Exchange = Exchange::new("openrtb", openrtb_response);

/// Google DoubleClick Ad Exchange.
pub static DOUBLECLICK: Exchange = Exchange::new("doubleclick", doubleclick_response);

static BUILTIN: [&Exchange; 3] = [&NO_EXCHANGE, &OPENRTB, &DOUBLECLICK];

#[cfg(test)]
mod tests {
    use super::*;

    static OTHER_OPENRTB: Exchange = Exchange::new("openrtb", openrtb_response);

    #[test]
    fn test_identity_equality() {
        assert_eq!(&OPENRTB, &OPENRTB);
        // Same id, different item.
        assert_ne!(&OPENRTB, &OTHER_OPENRTB);
    }

    #[test]
    fn test_by_id() {
        assert!(std::ptr::eq(Exchange::by_id("doubleclick").unwrap(), &DOUBLECLICK));
        assert!(Exchange::by_id("unknown").is_none());
    }

    #[test]
    fn test_blank_response_is_fresh() {
        let mut first = OPENRTB.new_native_response();
        first["id"] = json!("changed");
        assert_eq!(OPENRTB.new_native_response()["id"], json!(""));
    }
}
