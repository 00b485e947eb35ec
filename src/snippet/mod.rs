//! Snippet (ad markup) macro substitution.
//!
//! Bid payloads are expanded right before serialization, so interceptors
//! work with the raw markup and the macros see the final bid.

pub mod macros;
pub mod processor;

pub use macros::SnippetMacro;
pub use processor::{SnippetContext, SnippetError, SnippetProcessor};
