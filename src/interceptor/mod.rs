//! Interceptor pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Receiver
//!     → controller.rs (on_request: state check, fresh chain)
//!     → chain.rs (proceed: next compatible interceptor, timed)
//!     → Interceptor::execute (pre-processing → chain.proceed() → post-processing)
//!     → result back out through every wrapping interceptor
//! ```
//!
//! # Design Decisions
//! - Abort is an error variant, propagated with `?` like any other failure
//! - Start/stop hooks and compatibility are plain trait methods
//! - Interceptors are shared across concurrent requests and must be `Send + Sync`
//! - Construction by name goes through an explicit registry of closures

pub mod builtin;
pub mod chain;
pub mod composite;
pub mod controller;
pub mod error;
pub mod registry;

pub use builtin::TraceInterceptor;
pub use chain::{InterceptorChain, InterceptorSet};
pub use composite::CompositeInterceptor;
pub use controller::InterceptorController;
pub use error::{BoxError, InterceptError, LifecycleError};
pub use registry::{InterceptorRegistry, Registries, RegistryError};

use crate::model::{
    BidRequest, BidResponse, ClickRequest, ClickResponse, ImpressionRequest, ImpressionResponse,
    MatchRequest, MatchResponse,
};

/// A unit of decision logic over one request/response pair.
pub trait Interceptor<Req, Resp>: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Exchange ids this interceptor runs for. Empty means all of them.
    fn compatible_exchanges(&self) -> &[&'static str] {
        &[]
    }

    /// Called once when the owning controller starts.
    fn on_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called once when the owning controller stops.
    fn on_stop(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> Result<(), InterceptError>;
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub type BidController = InterceptorController<BidRequest, BidResponse>;
pub type ImpressionController = InterceptorController<ImpressionRequest, ImpressionResponse>;
pub type ClickController = InterceptorController<ClickRequest, ClickResponse>;
pub type MatchController = InterceptorController<MatchRequest, MatchResponse>;

pub type BidChain<'a> = InterceptorChain<'a, BidRequest, BidResponse>;
pub type ImpressionChain<'a> = InterceptorChain<'a, ImpressionRequest, ImpressionResponse>;
pub type ClickChain<'a> = InterceptorChain<'a, ClickRequest, ClickResponse>;
pub type MatchChain<'a> = InterceptorChain<'a, MatchRequest, MatchResponse>;
