//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, one service per port)
//!     → request.rs (buffered HttpRequest, request ID, decoded parameters)
//!     → [routing table picks a receiver]
//!     → response.rs (HttpResponseBuilder filled in by the receiver)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{HttpRequest, UuidRequestId, X_REQUEST_ID};
pub use response::{HttpResponseBuilder, MEDIA_GIF, MEDIA_JSON};
pub use server::HttpServer;
