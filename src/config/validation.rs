//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, keys decode)
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BidderConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::BidderConfig;
use crate::exchange::Exchange;
use crate::price::{EncryptionKey, IntegrityKey, KeyError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least one listener is required")]
    NoListeners,

    #[error("listener {name:?}: invalid bind address {address:?}")]
    InvalidBindAddress { name: String, address: String },

    #[error("port {port} is used by more than one listener")]
    DuplicatePort { port: u16 },

    #[error("{endpoint} path must not be empty")]
    EmptyPath { endpoint: &'static str },

    #[error("unknown exchange {0:?}")]
    UnknownExchange(String),

    #[error("price {present} is set without {missing}")]
    PriceKeyMissing {
        present: &'static str,
        missing: &'static str,
    },

    #[error("price {which}: {source}")]
    InvalidPriceKey {
        which: &'static str,
        source: KeyError,
    },

    #[error("price parameter must not be empty")]
    EmptyPriceParameter,

    #[error("request timeout must be positive")]
    ZeroTimeout,

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &BidderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listeners.is_empty() {
        errors.push(ValidationError::NoListeners);
    }
    let mut ports = BTreeSet::new();
    for listener in &config.listeners {
        match listener.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if !ports.insert(addr.port()) {
                    errors.push(ValidationError::DuplicatePort { port: addr.port() });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidBindAddress {
                name: listener.name.clone(),
                address: listener.bind_address.clone(),
            }),
        }
    }

    let endpoints = [
        ("bid", &config.bid),
        ("impression", &config.impression),
        ("click", &config.click),
        ("match", &config.matching),
    ];
    for (endpoint, section) in endpoints {
        if section.path.as_deref() == Some("") {
            errors.push(ValidationError::EmptyPath { endpoint });
        }
        if let Some(id) = &section.exchange {
            if Exchange::by_id(id).is_none() {
                errors.push(ValidationError::UnknownExchange(id.clone()));
            }
        }
    }
    if config.admin.health_path.is_empty() {
        errors.push(ValidationError::EmptyPath { endpoint: "health" });
    }
    if config.admin.status_path.is_empty() {
        errors.push(ValidationError::EmptyPath { endpoint: "status" });
    }
    if Exchange::by_id(&config.exchange).is_none() {
        errors.push(ValidationError::UnknownExchange(config.exchange.clone()));
    }

    validate_price(config, &mut errors);

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_price(config: &BidderConfig, errors: &mut Vec<ValidationError>) {
    let price = &config.price;
    match (&price.encryption_key, &price.integrity_key) {
        (Some(e), Some(i)) => {
            if let Err(source) = EncryptionKey::from_base64(e) {
                errors.push(ValidationError::InvalidPriceKey {
                    which: "encryption_key",
                    source,
                });
            }
            if let Err(source) = IntegrityKey::from_base64(i) {
                errors.push(ValidationError::InvalidPriceKey {
                    which: "integrity_key",
                    source,
                });
            }
        }
        (Some(_), None) => errors.push(ValidationError::PriceKeyMissing {
            present: "encryption_key",
            missing: "integrity_key",
        }),
        (None, Some(_)) => errors.push(ValidationError::PriceKeyMissing {
            present: "integrity_key",
            missing: "encryption_key",
        }),
        (None, None) => {}
    }
    if price.parameter.is_empty() {
        errors.push(ValidationError::EmptyPriceParameter);
    }
}
