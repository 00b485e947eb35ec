//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BidderConfig (validated, immutable)
//!     → bootstrap builds listeners, controllers and routes from it
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<RuntimeSettings>
//!     → receivers observe new settings on their next request
//! ```
//!
//! # Design Decisions
//! - Listeners, routes and interceptors are fixed at startup; only
//!   `RuntimeSettings` is reloadable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A request loads one settings snapshot and uses it throughout

use arc_swap::ArcSwap;
use std::sync::Arc;

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BidderConfig, CallbackConfig, EndpointConfig, ListenerConfig, PriceConfig,
    RuntimeSettings,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

/// Live, swappable runtime settings.
pub type SharedSettings = Arc<ArcSwap<RuntimeSettings>>;

pub fn shared_settings(settings: RuntimeSettings) -> SharedSettings {
    Arc::new(ArcSwap::from_pointee(settings))
}
