//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (timers and meters)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON when configured)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request via the trace layer
//! - Interceptor timers live with their controller, not in a global table
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use metrics::{Meter, Timer};
