//! Macro expansion for ad markup.
//!
//! Besides the macros in [`SnippetMacro`], the syntax `%{...}%` URL-encodes
//! its content. Nesting encodes repeatedly: `%{A%{B}%}%` encodes `A` once and
//! `B` twice, which is what chains of redirecting URLs need. Macros owned by
//! the exchange are left as they are.

use serde_json::Value;
use thiserror::Error;

use crate::model::Bid;
use crate::price::{PriceCodec, PriceError};
use crate::snippet::SnippetMacro;

const ENCODE_OPEN: &str = "%{";
const ENCODE_CLOSE: &str = "}%";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnippetError {
    #[error("macro {macro_key} has no value: {reason}")]
    Undefined {
        macro_key: &'static str,
        reason: &'static str,
    },

    #[error("winning price macro: {0}")]
    Price(#[from] PriceError),
}

/// What a snippet is expanded against.
#[derive(Debug, Clone, Copy)]
pub struct SnippetContext<'a> {
    pub bid: &'a Bid,
    /// The auction the bid answers, used to find slot sizes.
    pub auction: Option<&'a Value>,
    pub price_codec: Option<&'a PriceCodec>,
}

impl<'a> SnippetContext<'a> {
    pub fn new(bid: &'a Bid) -> Self {
        Self {
            bid,
            auction: None,
            price_codec: None,
        }
    }

    pub fn with_auction(mut self, auction: &'a Value) -> Self {
        self.auction = Some(auction);
        self
    }

    pub fn with_price_codec(mut self, codec: Option<&'a PriceCodec>) -> Self {
        self.price_codec = codec;
        self
    }

    /// Slot dimension (`w` or `h`) of the impression this bid is for.
    fn slot_dimension(&self, dimension: &str) -> Option<u64> {
        let imp = self
            .auction?
            .get("imp")?
            .as_array()?
            .iter()
            .find(|imp| imp.get("id").and_then(Value::as_str) == Some(self.bid.imp_id.as_str()))?;
        ["banner", "video"]
            .iter()
            .find_map(|kind| imp.get(*kind)?.get(dimension)?.as_u64())
    }
}

/// Expands bidder macros using the configured callback URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnippetProcessor {
    callback_url: Option<String>,
    impression_url: Option<String>,
    click_url: Option<String>,
}

impl SnippetProcessor {
    /// Impression and click URLs may start with `${OB_CALLBACK_URL}`.
    pub fn new(
        callback_url: Option<String>,
        impression_url: Option<String>,
        click_url: Option<String>,
    ) -> Self {
        let callback_url = callback_url.filter(|u| !u.is_empty());
        let impression_url = resolve_callback(callback_url.as_deref(), impression_url);
        let click_url = resolve_callback(callback_url.as_deref(), click_url);
        Self {
            callback_url,
            impression_url,
            click_url,
        }
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    pub fn impression_url(&self) -> Option<&str> {
        self.impression_url.as_deref()
    }

    pub fn click_url(&self) -> Option<&str> {
        self.click_url.as_deref()
    }

    pub fn process(&self, snippet: &str, ctx: &SnippetContext<'_>) -> Result<String, SnippetError> {
        let mut out = snippet.to_string();
        for m in SnippetMacro::ALL {
            if !out.contains(m.key()) {
                continue;
            }
            match self.value_of(m, ctx)? {
                Some(value) => out = out.replace(m.key(), &value),
                None => tracing::warn!(
                    imp_id = %ctx.bid.imp_id,
                    "No price codec configured, winning price macro left in place"
                ),
            }
        }
        Ok(url_encode_sections(&out))
    }

    /// `None` means "leave the macro untouched".
    fn value_of(&self, m: SnippetMacro, ctx: &SnippetContext<'_>) -> Result<Option<String>, SnippetError> {
        let undefined = |reason| SnippetError::Undefined {
            macro_key: m.key(),
            reason,
        };
        let value = match m {
            SnippetMacro::CallbackUrl => self
                .callback_url
                .clone()
                .ok_or_else(|| undefined("callback URL not configured"))?,
            SnippetMacro::ImpressionUrl => self
                .impression_url
                .clone()
                .ok_or_else(|| undefined("impression URL not configured"))?,
            SnippetMacro::ClickUrl => self
                .click_url
                .clone()
                .ok_or_else(|| undefined("click URL not configured"))?,
            SnippetMacro::AdWidth => ctx
                .bid
                .width
                .map(u64::from)
                .or_else(|| ctx.slot_dimension("w"))
                .ok_or_else(|| undefined("no width on the bid or its impression"))?
                .to_string(),
            SnippetMacro::AdHeight => ctx
                .bid
                .height
                .map(u64::from)
                .or_else(|| ctx.slot_dimension("h"))
                .ok_or_else(|| undefined("no height on the bid or its impression"))?
                .to_string(),
            SnippetMacro::WinningPrice => match ctx.price_codec {
                Some(codec) => codec.encode(ctx.bid.price)?,
                None => return Ok(None),
            },
        };
        Ok(Some(value))
    }
}

fn resolve_callback(callback_url: Option<&str>, url: Option<String>) -> Option<String> {
    let url = url.filter(|u| !u.is_empty())?;
    let key = SnippetMacro::CallbackUrl.key();
    match callback_url {
        Some(base) => Some(url.replace(key, base)),
        None if url.contains(key) => {
            tracing::warn!(url = %url, "Callback URL not set, ignoring URL that depends on it");
            None
        }
        None => Some(url),
    }
}

/// Replace every `%{...}%` section with its URL-encoded content, innermost first.
fn url_encode_sections(input: &str) -> String {
    let mut out = input.to_string();
    // everything before `from` holds no open marker
    let mut from = 0;
    while let Some(found) = out[from..].find(ENCODE_CLOSE) {
        let close = from + found;
        let Some(open) = out[from..close].rfind(ENCODE_OPEN).map(|i| from + i) else {
            // stray close marker, left as is
            from = close + ENCODE_CLOSE.len();
            continue;
        };
        let inner = &out[open + ENCODE_OPEN.len()..close];
        let encoded: String = url::form_urlencoded::byte_serialize(inner.as_bytes()).collect();
        out = format!("{}{}{}", &out[..open], encoded, &out[close + ENCODE_CLOSE.len()..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::{EncryptionKey, IntegrityKey};
    use serde_json::json;

    fn processor() -> SnippetProcessor {
        SnippetProcessor::new(
            Some("http://zone.bidder.example".into()),
            Some("${OB_CALLBACK_URL}/impression".into()),
            Some("${OB_CALLBACK_URL}/click".into()),
        )
    }

    #[test]
    fn test_callback_prefix_resolved() {
        let p = processor();
        assert_eq!(p.impression_url(), Some("http://zone.bidder.example/impression"));
        assert_eq!(p.click_url(), Some("http://zone.bidder.example/click"));
    }

    #[test]
    fn test_dependent_url_dropped_without_callback() {
        let p = SnippetProcessor::new(None, Some("${OB_CALLBACK_URL}/impression".into()), None);
        assert_eq!(p.impression_url(), None);
    }

    #[test]
    fn test_expand_urls_and_sizes() {
        let bid = Bid::new("1", 1.0).with_size(300, 250);
        let out = processor()
            .process(
                "<img src=\"${OB_IMPRESSION_URL}?w=${OB_AD_WIDTH}&h=${OB_AD_HEIGHT}\">",
                &SnippetContext::new(&bid),
            )
            .unwrap();
        assert_eq!(
            out,
            "<img src=\"http://zone.bidder.example/impression?w=300&h=250\">"
        );
    }

    #[test]
    fn test_size_from_impression() {
        let bid = Bid::new("2", 1.0);
        let auction = json!({"imp": [{"id": "1"}, {"id": "2", "banner": {"w": 728, "h": 90}}]});
        let ctx = SnippetContext::new(&bid).with_auction(&auction);
        let out = processor().process("${OB_AD_WIDTH}x${OB_AD_HEIGHT}", &ctx).unwrap();
        assert_eq!(out, "728x90");
    }

    #[test]
    fn test_undefined_macro() {
        let bid = Bid::new("1", 1.0);
        let err = SnippetProcessor::default()
            .process("${OB_CLICK_URL}", &SnippetContext::new(&bid))
            .unwrap_err();
        assert!(matches!(err, SnippetError::Undefined { macro_key: "${OB_CLICK_URL}", .. }));
    }

    #[test]
    fn test_winning_price() {
        let codec = PriceCodec::new(
            EncryptionKey::new(vec![1u8; 32]).unwrap(),
            IntegrityKey::new(vec![2u8; 32]).unwrap(),
        );
        let bid = Bid::new("1", 2.5);

        let ctx = SnippetContext::new(&bid).with_price_codec(Some(&codec));
        let out = processor().process("p=%%WINNING_PRICE%%", &ctx).unwrap();
        let token = out.strip_prefix("p=").unwrap();
        assert_eq!(codec.decode(token), Ok(2.5));

        let untouched = processor()
            .process("p=%%WINNING_PRICE%%", &SnippetContext::new(&bid))
            .unwrap();
        assert_eq!(untouched, "p=%%WINNING_PRICE%%");
    }

    #[test]
    fn test_exchange_macros_untouched() {
        let bid = Bid::new("1", 1.0);
        let out = processor()
            .process("${AUCTION_ID}", &SnippetContext::new(&bid))
            .unwrap();
        assert_eq!(out, "${AUCTION_ID}");
    }

    #[test]
    fn test_nested_url_encoding() {
        assert_eq!(url_encode_sections("a=%{x y}%"), "a=x+y");
        assert_eq!(url_encode_sections("%{a&%{b c}%}%"), "a%26b%2Bc");
        assert_eq!(url_encode_sections("no sections"), "no sections");
    }

    #[test]
    fn test_stray_close_marker_kept() {
        assert_eq!(url_encode_sections("a}%b&%{x y}%"), "a}%b&x+y");
        assert_eq!(url_encode_sections("}%{x}%"), "}%{x}%");
        assert_eq!(url_encode_sections("%{a}%}%%{b c}%"), "a}%b+c");
    }
}
