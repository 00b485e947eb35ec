//! Winning price encoding, decoding and authentication.
//!
//! # Token layout
//! ```text
//! | iv (16) | encrypted price (8) | signature (4) |   web-safe base64, no padding
//!
//! pad       = HMAC-SHA1(encryption_key, iv)[..8]
//! encrypted = price_micros_be XOR pad
//! signature = HMAC-SHA1(integrity_key, price_micros_be || iv)[..4]
//! ```
//!
//! The layout is the one used by DoubleClick Ad Exchange, so tokens produced by
//! the exchange decode here and vice versa.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::price::keys::{EncryptionKey, IntegrityKey, KeyError};

type HmacSha1 = Hmac<Sha1>;

/// Sentinel the exchange sends when it cannot disclose the price.
pub const PRICE_UNKNOWN: &str = "UNKNOWN";

const IV_LEN: usize = 16;
const PRICE_LEN: usize = 8;
const SIGNATURE_LEN: usize = 4;
const TOKEN_LEN: usize = IV_LEN + PRICE_LEN + SIGNATURE_LEN;
const MICROS_PER_UNIT: f64 = 1_000_000.0;

const WEBSAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors from price encoding and decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceError {
    #[error("price codec has no {0} key")]
    NotConfigured(&'static str),

    #[error("price {0} cannot be encoded")]
    InvalidPrice(f64),

    #[error("price token is not valid web-safe base64")]
    Encoding,

    #[error("price token decodes to {0} bytes, expected {TOKEN_LEN}")]
    Length(usize),

    #[error("price token failed the integrity check")]
    Signature,

    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("price parameter {0} missing")]
    Missing(String),

    #[error("plain price {0:?} is not a number")]
    Plaintext(String),
}

impl PriceError {
    /// True when the token itself could not be authenticated.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, PriceError::Encoding | PriceError::Length(_) | PriceError::Signature)
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PriceError::NotConfigured(_) => "not_configured",
            PriceError::InvalidPrice(_) => "invalid_price",
            PriceError::Encoding => "encoding",
            PriceError::Length(_) => "length",
            PriceError::Signature => "signature",
            PriceError::Key(_) => "key",
            PriceError::Missing(_) => "missing",
            PriceError::Plaintext(_) => "plaintext",
        }
    }
}

/// Convert a price in currency units to rounded micros.
pub fn price_to_micros(price: f64) -> Result<u64, PriceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(PriceError::InvalidPrice(price));
    }
    let micros = (price * MICROS_PER_UNIT).round();
    if micros >= u64::MAX as f64 {
        return Err(PriceError::InvalidPrice(price));
    }
    Ok(micros as u64)
}

/// Read an unencrypted price. The empty string and [`PRICE_UNKNOWN`] are zero.
pub fn parse_plain_price(value: &str) -> Result<f64, PriceError> {
    if value.is_empty() || value == PRICE_UNKNOWN {
        return Ok(0.0);
    }
    let price: f64 = value
        .parse()
        .map_err(|_| PriceError::Plaintext(value.to_string()))?;
    if !price.is_finite() || price < 0.0 {
        return Err(PriceError::InvalidPrice(price));
    }
    Ok(price)
}

/// Encodes and decodes winning prices for one key pair.
///
/// A codec missing either key refuses to decode rather than return an
/// unauthenticated value.
#[derive(Debug, Clone, Default)]
pub struct PriceCodec {
    encryption: Option<EncryptionKey>,
    integrity: Option<IntegrityKey>,
}

impl PriceCodec {
    pub fn new(encryption: EncryptionKey, integrity: IntegrityKey) -> Self {
        Self {
            encryption: Some(encryption),
            integrity: Some(integrity),
        }
    }

    /// Codec with whatever keys are available; operations fail if one is missing.
    pub fn from_parts(encryption: Option<EncryptionKey>, integrity: Option<IntegrityKey>) -> Self {
        Self { encryption, integrity }
    }

    /// Build from base64-encoded keys, as found in configuration.
    pub fn from_base64(encryption: &str, integrity: &str) -> Result<Self, KeyError> {
        Ok(Self::new(
            EncryptionKey::from_base64(encryption)?,
            IntegrityKey::from_base64(integrity)?,
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.encryption.is_some() && self.integrity.is_some()
    }

    /// Encode a price, in currency units, with a fresh initialization vector.
    pub fn encode(&self, price: f64) -> Result<String, PriceError> {
        self.encode_micros(price_to_micros(price)?, new_iv())
    }

    /// Encode a price in micros with a caller-supplied initialization vector.
    pub fn encode_micros(&self, micros: u64, iv: [u8; IV_LEN]) -> Result<String, PriceError> {
        let (encryption, integrity) = self.keys()?;
        let plain = micros.to_be_bytes();

        let pad = hmac_sha1(encryption.as_bytes(), &[&iv])?;
        let signature = hmac_sha1(integrity.as_bytes(), &[&plain, &iv])?;

        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(&iv);
        token.extend(plain.iter().zip(pad.iter()).map(|(p, k)| p ^ k));
        token.extend_from_slice(&signature[..SIGNATURE_LEN]);

        Ok(WEBSAFE.encode(token))
    }

    /// Decode a price token into currency units.
    ///
    /// The empty token and [`PRICE_UNKNOWN`] decode to zero without touching
    /// the keys.
    pub fn decode(&self, token: &str) -> Result<f64, PriceError> {
        if token.is_empty() || token == PRICE_UNKNOWN {
            return Ok(0.0);
        }
        self.decode_micros(token).map(|micros| micros as f64 / MICROS_PER_UNIT)
    }

    /// Decode and authenticate a price token, returning micros.
    pub fn decode_micros(&self, token: &str) -> Result<u64, PriceError> {
        let (encryption, integrity) = self.keys()?;

        let bytes = WEBSAFE.decode(token).map_err(|_| PriceError::Encoding)?;
        if bytes.len() != TOKEN_LEN {
            return Err(PriceError::Length(bytes.len()));
        }

        let (iv, rest) = bytes.split_at(IV_LEN);
        let (encrypted, signature) = rest.split_at(PRICE_LEN);

        let pad = hmac_sha1(encryption.as_bytes(), &[iv])?;
        let mut plain = [0u8; PRICE_LEN];
        for (i, byte) in plain.iter_mut().enumerate() {
            *byte = encrypted[i] ^ pad[i];
        }

        let expected = hmac_sha1(integrity.as_bytes(), &[&plain, iv])?;
        if !bool::from(expected[..SIGNATURE_LEN].ct_eq(signature)) {
            return Err(PriceError::Signature);
        }

        Ok(u64::from_be_bytes(plain))
    }

    fn keys(&self) -> Result<(&EncryptionKey, &IntegrityKey), PriceError> {
        let encryption = self
            .encryption
            .as_ref()
            .ok_or(PriceError::NotConfigured("encryption"))?;
        let integrity = self
            .integrity
            .as_ref()
            .ok_or(PriceError::NotConfigured("integrity"))?;
        Ok((encryption, integrity))
    }
}

fn hmac_sha1(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 20], PriceError> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key)
        .map_err(|_| PriceError::Key(KeyError::Length(key.len())))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Timestamp (seconds, microseconds) followed by 8 random bytes.
fn new_iv() -> [u8; IV_LEN] {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut iv = [0u8; IV_LEN];
    iv[..4].copy_from_slice(&(now.as_secs() as u32).to_be_bytes());
    iv[4..8].copy_from_slice(&now.subsec_micros().to_be_bytes());
    iv[8..].copy_from_slice(&rand::random::<u64>().to_be_bytes());
    iv
}
