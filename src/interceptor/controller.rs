//! Interceptor controller: owns one pipeline, its lifecycle and its metrics.
//!
//! # Responsibilities
//! - Run one chain per request through `on_request`
//! - Fire start hooks once on `start_async`, stop hooks once on `stop_async`
//! - Publish per-interceptor resources (execution timers) for introspection
//!
//! # Design Decisions
//! - Hooks run on a dedicated thread; callers block on `await_*` if they care
//! - Requests are refused outside `RUNNING`
//! - A stop requested while starting is honoured once startup completes

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::interceptor::{InterceptError, Interceptor, InterceptorChain, InterceptorSet, LifecycleError};
use crate::lifecycle::{ServiceState, State};
use crate::model::UserRequest;
use crate::observability::Timer;

type ResourceKey = (TypeId, usize);

fn identity<Req, Resp>(interceptor: &Arc<dyn Interceptor<Req, Resp>>) -> usize {
    Arc::as_ptr(interceptor) as *const () as usize
}

pub struct InterceptorController<Req, Resp> {
    name: String,
    interceptors: InterceptorSet<Req, Resp>,
    resources: HashMap<ResourceKey, Arc<dyn Any + Send + Sync>>,
    state: ServiceState,
}

impl<Req, Resp> InterceptorController<Req, Resp>
where
    Req: UserRequest + 'static,
    Resp: Send + 'static,
{
    pub fn new(name: impl Into<String>, interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>) -> Arc<Self> {
        let name = name.into();
        let interceptors = InterceptorSet::new(&name, interceptors);

        let mut resources: HashMap<ResourceKey, Arc<dyn Any + Send + Sync>> = HashMap::new();
        for (interceptor, timer) in interceptors.timers() {
            resources.insert(
                (TypeId::of::<Timer>(), identity(interceptor)),
                Arc::clone(timer) as Arc<dyn Any + Send + Sync>,
            );
        }

        Arc::new(Self {
            name,
            interceptors,
            resources,
            state: ServiceState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn interceptors(&self) -> impl Iterator<Item = &Arc<dyn Interceptor<Req, Resp>>> {
        self.interceptors.iter()
    }

    pub fn interceptor_names(&self) -> Vec<String> {
        self.interceptors.names()
    }

    /// Resource of type `T` published for `interceptor`, if any.
    pub fn get_resource<T: Any + Send + Sync>(
        &self,
        interceptor: &Arc<dyn Interceptor<Req, Resp>>,
    ) -> Option<Arc<T>> {
        self.resources
            .get(&(TypeId::of::<T>(), identity(interceptor)))
            .and_then(|r| Arc::clone(r).downcast::<T>().ok())
    }

    /// Execution timer of one interceptor.
    pub fn timer(&self, interceptor: &Arc<dyn Interceptor<Req, Resp>>) -> Option<Arc<Timer>> {
        self.get_resource::<Timer>(interceptor)
    }

    /// Run the pipeline for one request.
    pub fn on_request(&self, request: &Req, response: &mut Resp) -> Result<(), InterceptError> {
        let state = self.state.get();
        if state != State::Running {
            return Err(InterceptError::NotRunning {
                controller: self.name.clone(),
                state,
            });
        }
        InterceptorChain::new(&self.interceptors, request, response).proceed()
    }

    /// Begin startup. Fails if the controller is not `NEW`.
    pub fn start_async(self: &Arc<Self>) -> Result<(), LifecycleError> {
        if let Err(state) = self.state.transition(State::New, State::Starting) {
            return Err(LifecycleError::InvalidState {
                controller: self.name.clone(),
                state,
            });
        }
        tracing::info!(controller = %self.name, interceptors = self.interceptors.len(), "Starting controller");

        let this = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-start", self.name))
            .spawn(move || this.run_start())
            .map(drop)
            .map_err(|source| {
                self.state.fail(source.to_string());
                LifecycleError::Thread {
                    controller: self.name.clone(),
                    source,
                }
            })
    }

    /// Block until startup finished, successfully or not.
    pub fn await_running(&self) -> Result<(), LifecycleError> {
        match self.state.await_started() {
            State::Running => Ok(()),
            State::Failed => Err(LifecycleError::Failed {
                controller: self.name.clone(),
                cause: self.state.failure().unwrap_or_default(),
            }),
            _ => Err(LifecycleError::Terminated {
                controller: self.name.clone(),
            }),
        }
    }

    /// Start and wait for the outcome.
    pub fn start(self: &Arc<Self>) -> Result<(), LifecycleError> {
        self.start_async()?;
        self.await_running()
    }

    /// Begin shutdown. Idempotent.
    pub fn stop_async(self: &Arc<Self>) {
        match self.state.request_stop() {
            State::Running => {
                let this = Arc::clone(self);
                let spawned = thread::Builder::new()
                    .name(format!("{}-stop", self.name))
                    .spawn(move || this.run_stop());
                if let Err(e) = spawned {
                    tracing::error!(controller = %self.name, error = %e, "Stopping inline");
                    self.run_stop();
                }
            }
            State::New => {
                tracing::info!(controller = %self.name, "Controller terminated before start");
            }
            State::Starting => {
                tracing::info!(controller = %self.name, "Stop deferred until startup completes");
            }
            State::Stopping | State::Terminated | State::Failed => {}
        }
    }

    /// Block until the controller reached `TERMINATED` or `FAILED`.
    pub fn await_terminated(&self) -> State {
        self.state.await_final()
    }

    /// Stop and wait for the outcome.
    pub fn stop(self: &Arc<Self>) -> State {
        self.stop_async();
        self.await_terminated()
    }

    fn run_start(&self) {
        match self.interceptors.start_all() {
            Ok(()) => {
                if self.state.finish_starting() {
                    self.run_stop();
                } else {
                    tracing::info!(controller = %self.name, "Controller running");
                }
            }
            Err((interceptor, e)) => {
                tracing::error!(
                    controller = %self.name,
                    interceptor = %interceptor,
                    error = %e,
                    "Interceptor failed to start"
                );
                self.state
                    .fail(format!("interceptor {} failed to start: {}", interceptor, e));
            }
        }
    }

    fn run_stop(&self) {
        tracing::info!(controller = %self.name, "Stopping controller");
        for (interceptor, e) in self.interceptors.stop_all() {
            tracing::error!(
                controller = %self.name,
                interceptor = %interceptor,
                error = %e,
                "Interceptor failed to stop"
            );
        }
        let _ = self.state.transition(State::Stopping, State::Terminated);
        tracing::info!(controller = %self.name, "Controller terminated");
    }
}

impl<Req, Resp> fmt::Debug for InterceptorController<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorController")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}
