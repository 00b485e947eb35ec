//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bidder.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::routing::Feature;
use crate::snippet::SnippetProcessor;

pub const DEFAULT_BID_PATH: &str = "/bid";
pub const DEFAULT_IMPRESSION_PATH: &str = "/impression";
pub const DEFAULT_CLICK_PATH: &str = "/click";
pub const DEFAULT_MATCH_PATH: &str = "/match";

/// Root configuration for the bidder.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BidderConfig {
    /// Exchange the endpoints speak unless overridden (e.g. "openrtb").
    pub exchange: String,

    /// Listening ports and the features enabled on each.
    pub listeners: Vec<ListenerConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Price disclosure keys and parameter.
    pub price: PriceConfig,

    /// URLs substituted into ad markup.
    pub callbacks: CallbackConfig,

    pub bid: EndpointConfig,
    pub impression: EndpointConfig,
    pub click: EndpointConfig,
    #[serde(rename = "match")]
    pub matching: EndpointConfig,

    pub admin: AdminConfig,
}

impl Default for BidderConfig {
    fn default() -> Self {
        Self {
            exchange: "openrtb".to_string(),
            listeners: vec![
                ListenerConfig {
                    name: "bidder".to_string(),
                    bind_address: "0.0.0.0:8080".to_string(),
                    features: vec![
                        Feature::Bid,
                        Feature::Impression,
                        Feature::Click,
                        Feature::Match,
                        Feature::Other,
                    ],
                },
                ListenerConfig {
                    name: "admin".to_string(),
                    bind_address: "127.0.0.1:8081".to_string(),
                    features: vec![Feature::Admin],
                },
            ],
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            price: PriceConfig::default(),
            callbacks: CallbackConfig::default(),
            bid: EndpointConfig::default(),
            impression: EndpointConfig::default(),
            click: EndpointConfig::default(),
            matching: EndpointConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl BidderConfig {
    /// The part of the configuration that may change without a restart.
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            price_parameter: self.price.parameter.clone(),
            snippets: SnippetProcessor::new(
                self.callbacks.callback_url.clone(),
                self.callbacks.impression_url.clone(),
                self.callbacks.click_url.clone(),
            ),
        }
    }

    pub fn bid_path(&self) -> &str {
        self.bid.path_or(DEFAULT_BID_PATH)
    }

    pub fn impression_path(&self) -> &str {
        self.impression.path_or(DEFAULT_IMPRESSION_PATH)
    }

    pub fn click_path(&self) -> &str {
        self.click.path_or(DEFAULT_CLICK_PATH)
    }

    pub fn match_path(&self) -> &str {
        self.matching.path_or(DEFAULT_MATCH_PATH)
    }
}

/// One listening socket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Listener identifier for logging.
    #[serde(default)]
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Features enabled on this port; routes needing others stay dormant.
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed to answer a request, in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 1_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Price disclosure settings. Keys are base64 and must be set together.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PriceConfig {
    pub encryption_key: Option<String>,
    pub integrity_key: Option<String>,

    /// Query parameter carrying the winning price on impression callbacks.
    pub parameter: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            integrity_key: None,
            parameter: "price".to_string(),
        }
    }
}

impl std::fmt::Debug for PriceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("PriceConfig")
            .field("encryption_key", &redact(&self.encryption_key))
            .field("integrity_key", &redact(&self.integrity_key))
            .field("parameter", &self.parameter)
            .finish()
    }
}

/// Callback URLs for ad markup macros.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Public base URL of this bidder.
    pub callback_url: Option<String>,

    /// May start with `${OB_CALLBACK_URL}`.
    pub impression_url: Option<String>,

    /// May start with `${OB_CALLBACK_URL}`.
    pub click_url: Option<String>,
}

/// One request kind: where it is served and which interceptors run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Path spec; the endpoint's default when absent.
    pub path: Option<String>,

    /// Exchange override for this endpoint.
    pub exchange: Option<String>,

    /// Registered interceptor names, in execution order.
    pub interceptors: Vec<String>,
}

impl EndpointConfig {
    pub fn path_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.path.as_deref().unwrap_or(default)
    }
}

/// Admin endpoints, live on listeners with the ADMIN feature.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required by the status endpoint, if set.
    pub api_key: Option<String>,

    pub health_path: String,
    pub status_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            health_path: "/healthz".to_string(),
            status_path: "/admin/status".to_string(),
        }
    }
}

/// Settings swapped in on reload. Each request reads one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub price_parameter: String,
    pub snippets: SnippetProcessor,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        BidderConfig::default().runtime_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: BidderConfig = toml::from_str("").unwrap();
        assert_eq!(config, BidderConfig::default());
        assert_eq!(config.bid_path(), "/bid");
        assert_eq!(config.listeners.len(), 2);
    }

    #[test]
    fn test_sections() {
        let config: BidderConfig = toml::from_str(
            r#"
            exchange = "doubleclick"

            [[listeners]]
            name = "main"
            bind_address = "127.0.0.1:18080"
            features = ["BID", "IMPRESSION"]

            [price]
            parameter = "wp"

            [callbacks]
            callback_url = "http://cb.example"
            impression_url = "${OB_CALLBACK_URL}/impression"

            [bid]
            interceptors = ["trace"]

            [match]
            path = "/cm"
            "#,
        )
        .unwrap();

        assert_eq!(config.exchange, "doubleclick");
        assert_eq!(config.listeners[0].features, vec![Feature::Bid, Feature::Impression]);
        assert_eq!(config.bid.interceptors, vec!["trace"]);
        assert_eq!(config.match_path(), "/cm");
        assert_eq!(config.click_path(), "/click");

        let runtime = config.runtime_settings();
        assert_eq!(runtime.price_parameter, "wp");
        assert_eq!(runtime.snippets.impression_url(), Some("http://cb.example/impression"));
    }

    #[test]
    fn test_price_keys_redacted() {
        let mut price = PriceConfig::default();
        price.encryption_key = Some("c2VjcmV0".into());
        assert!(!format!("{:?}", price).contains("c2VjcmV0"));
    }
}
