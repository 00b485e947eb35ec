//! Key material for price disclosure.
//!
//! Encryption and integrity keys are distinct types so one can never be
//! passed where the other is expected.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use std::fmt;
use thiserror::Error;

/// Shortest accepted key, in bytes.
pub const MIN_KEY_LEN: usize = 16;

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 32;

const KEY_WEBSAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors for malformed key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key must be {MIN_KEY_LEN}..={MAX_KEY_LEN} bytes, got {0}")]
    Length(usize),

    #[error("key is not valid base64")]
    Encoding,
}

/// Raw secret bytes. Never printed.
#[derive(Clone, PartialEq, Eq)]
struct SecretBytes(Vec<u8>);

impl SecretBytes {
    fn new(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if !(MIN_KEY_LEN..=MAX_KEY_LEN).contains(&bytes.len()) {
            return Err(KeyError::Length(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Accepts both the standard and the web-safe alphabet.
    fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        let bytes = KEY_WEBSAFE
            .decode(encoded)
            .or_else(|_| STANDARD.decode(encoded))
            .map_err(|_| KeyError::Encoding)?;
        Self::new(bytes)
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} bytes redacted>", self.0.len())
    }
}

macro_rules! secret_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(SecretBytes);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
                SecretBytes::new(bytes.into()).map(Self)
            }

            pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
                SecretBytes::from_base64(encoded).map(Self)
            }

            pub(crate) fn as_bytes(&self) -> &[u8] {
                &self.0 .0
            }
        }
    };
}

secret_key!(
    /// Confidentiality key: derives the pad that hides the price.
    EncryptionKey
);

secret_key!(
    /// Integrity key: signs the price so tampering is detected.
    IntegrityKey
);
