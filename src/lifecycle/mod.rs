//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Controllers (service.rs):
//!     NEW → STARTING (start hooks) → RUNNING → STOPPING (stop hooks) → TERMINATED
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Stop controllers
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then controllers, then listeners
//! - Ordered shutdown: stop accept, drain, stop controllers
//! - Start failures are fatal; stop failures are logged and teardown continues

pub mod service;
pub mod shutdown;
pub mod signals;

pub use service::{ServiceState, State};
pub use shutdown::Shutdown;
