//! Real-time bidding framework: routes exchange traffic (bid requests,
//! impression and click callbacks, cookie matching) through configurable
//! chains of interceptors.

pub mod app;
pub mod config;
pub mod exchange;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod price;
pub mod receiver;
pub mod routing;
pub mod snippet;

pub use app::{BidderApp, StartupError};
pub use config::BidderConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
