//! Receiver subsystem: the boundary between HTTP and the interceptor pipelines.
//!
//! # Data Flow
//! ```text
//! Router::receive
//!     → HttpReceiver::receive(ReceiverContext)
//!     → build typed request/response (settings snapshot, price codec)
//!     → pipeline.rs (controller.on_request, abort/failure/panic containment)
//!     → serialize typed response into the context's HTTP response
//! ```
//!
//! # Design Decisions
//! - Receivers never fail: every outcome becomes a well-formed response
//! - Abort is benign (200 family), failures are 500
//! - Success is counted only after the response is serialized

pub mod admin;
pub mod bid;
pub mod click;
pub mod context;
pub mod defaults;
pub mod impression;
pub mod matching;
pub mod pipeline;

pub use admin::{ControllerInfo, HealthReceiver, StatusReceiver};
pub use bid::{BidMapper, BidReceiver, JsonBidMapper, MappingError};
pub use click::ClickReceiver;
pub use context::ReceiverContext;
pub use defaults::{MethodNotAllowedReceiver, NotFoundReceiver, OptionsReceiver};
pub use impression::ImpressionReceiver;
pub use matching::MatchReceiver;
pub use pipeline::{Outcome, RequestReceiver};

/// Handles a routed HTTP request by filling in the context's response.
pub trait HttpReceiver: Send + Sync {
    fn receive(&self, ctx: &mut ReceiverContext);
}
