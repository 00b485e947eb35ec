//! Service state machine shared by everything with a start/stop lifecycle.
//!
//! ```text
//! NEW → STARTING → RUNNING → STOPPING → TERMINATED
//!          │           │         │
//!          └───────────┴─────────┴────→ FAILED
//! ```

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    New,
    Starting,
    Running,
    Stopping,
    Terminated,
    Failed,
}

impl State {
    /// No further transitions are possible.
    pub fn is_final(self) -> bool {
        matches!(self, State::Terminated | State::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::New => "NEW",
            State::Starting => "STARTING",
            State::Running => "RUNNING",
            State::Stopping => "STOPPING",
            State::Terminated => "TERMINATED",
            State::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct Inner {
    state: State,
    stop_requested: bool,
    failure: Option<String>,
}

/// Current state plus a condition variable for waiters.
#[derive(Debug)]
pub struct ServiceState {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::New,
                stop_requested: false,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> State {
        self.lock().state
    }

    /// Move to `to` if the current state is `from`. Returns the state observed.
    pub fn transition(&self, from: State, to: State) -> Result<State, State> {
        let mut inner = self.lock();
        if inner.state != from {
            return Err(inner.state);
        }
        inner.state = to;
        self.changed.notify_all();
        Ok(from)
    }

    /// Record a stop request. Returns the state at the time of the request.
    ///
    /// `NEW` goes straight to `TERMINATED`, `RUNNING` moves to `STOPPING`,
    /// `STARTING` remembers the request for when startup completes.
    pub fn request_stop(&self) -> State {
        let mut inner = self.lock();
        let observed = inner.state;
        match observed {
            State::New => inner.state = State::Terminated,
            State::Running => inner.state = State::Stopping,
            State::Starting => inner.stop_requested = true,
            State::Stopping | State::Terminated | State::Failed => {}
        }
        self.changed.notify_all();
        observed
    }

    /// Leave `STARTING`. Returns true when a stop was requested meanwhile,
    /// in which case the state is already `STOPPING`.
    pub fn finish_starting(&self) -> bool {
        let mut inner = self.lock();
        let stop = inner.stop_requested;
        inner.state = if stop { State::Stopping } else { State::Running };
        self.changed.notify_all();
        stop
    }

    pub fn fail(&self, cause: impl Into<String>) {
        let mut inner = self.lock();
        inner.state = State::Failed;
        inner.failure = Some(cause.into());
        self.changed.notify_all();
    }

    pub fn failure(&self) -> Option<String> {
        self.lock().failure.clone()
    }

    /// Block until `done` holds for the current state, or the timeout elapses.
    pub fn await_state(&self, done: impl Fn(State) -> bool, timeout: Option<Duration>) -> State {
        let guard = self.lock();
        let guard = match timeout {
            Some(timeout) => {
                self.changed
                    .wait_timeout_while(guard, timeout, |inner| !done(inner.state))
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => self
                .changed
                .wait_while(guard, |inner| !done(inner.state))
                .unwrap_or_else(PoisonError::into_inner),
        };
        guard.state
    }

    /// Block until the service has left `NEW` and `STARTING`.
    pub fn await_started(&self) -> State {
        self.await_state(|s| !matches!(s, State::New | State::Starting), None)
    }

    /// Block until the service reached a final state.
    pub fn await_final(&self) -> State {
        self.await_state(State::is_final, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_transition_guarded() {
        let state = ServiceState::new();
        assert_eq!(state.transition(State::New, State::Starting), Ok(State::New));
        assert_eq!(
            state.transition(State::New, State::Starting),
            Err(State::Starting)
        );
    }

    #[test]
    fn test_stop_from_new_terminates() {
        let state = ServiceState::new();
        assert_eq!(state.request_stop(), State::New);
        assert_eq!(state.get(), State::Terminated);
        assert_eq!(state.request_stop(), State::Terminated);
        assert_eq!(state.get(), State::Terminated);
    }

    #[test]
    fn test_stop_during_start_is_deferred() {
        let state = ServiceState::new();
        state.transition(State::New, State::Starting).unwrap();
        assert_eq!(state.request_stop(), State::Starting);
        assert_eq!(state.get(), State::Starting);
        assert!(state.finish_starting());
        assert_eq!(state.get(), State::Stopping);
    }

    #[test]
    fn test_await_wakes_on_change() {
        let state = Arc::new(ServiceState::new());
        let waiter = {
            let state = Arc::clone(&state);
            thread::spawn(move || state.await_final())
        };
        state.fail("boom");
        assert_eq!(waiter.join().unwrap(), State::Failed);
        assert_eq!(state.failure().as_deref(), Some("boom"));
    }

    #[test]
    fn test_await_timeout() {
        let state = ServiceState::new();
        let observed = state.await_state(State::is_final, Some(Duration::from_millis(10)));
        assert_eq!(observed, State::New);
    }
}
