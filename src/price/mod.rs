//! Price disclosure subsystem.
//!
//! # Data Flow
//! ```text
//! Bid serialization:
//!     bid price → codec.rs (encode) → %%WINNING_PRICE%% macro in the snippet
//!
//! Impression callback:
//!     ?price=<token> → codec.rs (decode + authenticate) → price in currency units
//! ```
//!
//! # Design Decisions
//! - Decoding fails closed: no key pair, no price
//! - Malformed or forged tokens are values of `PriceError`, never panics
//! - "Price unknown" is a documented zero, not an error

pub mod codec;
pub mod keys;

pub use codec::{parse_plain_price, price_to_micros, PriceCodec, PriceError, PRICE_UNKNOWN};
pub use keys::{EncryptionKey, IntegrityKey, KeyError};
