//! Interceptor error types.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::lifecycle::State;

/// Boxed error used by interceptor hooks and failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

/// Run a lifecycle hook, turning a panic into an ordinary hook error.
pub(crate) fn run_hook(hook: impl FnOnce() -> Result<(), BoxError>) -> Result<(), BoxError> {
    panic::catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|payload| {
        Err(format!("hook panicked: {}", panic_message(payload.as_ref())).into())
    })
}

/// Outcome of a chain that did not complete normally.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Deliberate short-circuit for this request only. Not a bug.
    #[error("interceptor aborted: {reason}")]
    Abort { reason: String },

    /// The controller was asked to handle a request outside `RUNNING`.
    #[error("controller {controller} is {state}, not RUNNING")]
    NotRunning { controller: String, state: State },

    /// Any other failure raised by an interceptor.
    #[error("interceptor failed: {0}")]
    Failed(BoxError),
}

impl InterceptError {
    pub fn abort(reason: impl Into<String>) -> Self {
        InterceptError::Abort {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl Into<BoxError>) -> Self {
        InterceptError::Failed(error.into())
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, InterceptError::Abort { .. })
    }
}

/// Errors raised while starting or stopping a controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("controller {controller} cannot start from state {state}")]
    InvalidState { controller: String, state: State },

    #[error("interceptor {interceptor} in controller {controller} failed to start: {source}")]
    StartFailed {
        controller: String,
        interceptor: String,
        source: BoxError,
    },

    #[error("controller {controller} failed: {cause}")]
    Failed { controller: String, cause: String },

    #[error("controller {controller} terminated before it was running")]
    Terminated { controller: String },

    #[error("controller {controller}: {source}")]
    Thread {
        controller: String,
        source: std::io::Error,
    },
}
