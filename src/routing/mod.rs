//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (port, path, method)
//!     → router.rs (per-port route table)
//!     → matcher.rs (first matching path spec, most specific first)
//!     → Dispatch: route receiver | options | method not allowed | not found
//!
//! Route Compilation (at startup):
//!     Route[] + listeners (port, enabled features)
//!     → Drop routes whose features are not all enabled
//!     → Reject duplicate method + path per port
//!     → Sort path specs, freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by path specificity)

pub mod feature;
pub mod matcher;
pub mod route;
pub mod router;

pub use feature::Feature;
pub use matcher::{PathKind, PathMatcher};
pub use route::Route;
pub use router::{Dispatch, RouteError, Router, RouterBuilder};
