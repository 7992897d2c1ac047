//! Controller lifecycle shared by the node controllers.
//!
//! A controller moves `Created -> Initialized -> Started`, or straight
//! `Created -> Started` when it has no cold-start phase. The state lives in a
//! single cell behind a `std::sync::Mutex` that is never held across an
//! `.await`; cold start is serialized by a separate async lock.

use crate::error::ControllerError;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument, Span};

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Started,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Started => "started",
        };
        f.write_str(name)
    }
}

impl LifecycleState {
    /// State after a successful cold start.
    pub fn mark_initialized(self) -> Result<Self, ControllerError> {
        match self {
            LifecycleState::Created => Ok(LifecycleState::Initialized),
            other => Err(ControllerError::InvalidTransition(format!(
                "cannot initialize a controller that is already {}",
                other
            ))),
        }
    }

    /// State once the reconcile loop is launched.
    pub fn begin_start(self, requires_init: bool) -> Result<Self, ControllerError> {
        match (self, requires_init) {
            (LifecycleState::Initialized, _) | (LifecycleState::Created, false) => Ok(LifecycleState::Started),
            (LifecycleState::Created, true) => Err(ControllerError::InvalidTransition(
                "controller must be initialized before it is started".to_string(),
            )),
            (LifecycleState::Started, _) => Err(ControllerError::InvalidTransition(
                "controller is already started".to_string(),
            )),
        }
    }
}

/// A long-running reconcile loop a controller drives once started.
#[async_trait::async_trait]
pub trait ReconcileLoop: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled or the loop fails.
    async fn run(&self, shutdown: CancellationToken) -> Result<(), ControllerError>;
}

/// Called with errors nothing in this process can recover from.
pub type FatalHandler = fn(&ControllerError) -> !;

/// Default fatal handler: log and exit the process.
pub fn exit_process(err: &ControllerError) -> ! {
    error!("Unrecoverable controller error, exiting: {}", err);
    std::process::exit(1)
}

/// Lifecycle state machine wrapped around a reconcile loop.
pub struct Lifecycle<L> {
    runner: L,
    requires_init: bool,
    state: Mutex<LifecycleState>,
    init_lock: tokio::sync::Mutex<()>,
    span: Span,
    on_fatal: FatalHandler,
}

impl<L: ReconcileLoop> Lifecycle<L> {
    /// `requires_init` selects the two-phase lifecycle.
    pub fn new(runner: L, requires_init: bool, span: Span) -> Self {
        Self {
            runner,
            requires_init,
            state: Mutex::new(LifecycleState::Created),
            init_lock: tokio::sync::Mutex::new(()),
            span,
            on_fatal: exit_process,
        }
    }

    /// Replace the fatal handler.
    #[cfg(test)]
    pub fn with_fatal_handler(mut self, on_fatal: FatalHandler) -> Self {
        self.on_fatal = on_fatal;
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    #[cfg(test)]
    pub fn runner(&self) -> &L {
        &self.runner
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock_state()
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    fn fail(&self, err: ControllerError) -> ControllerError {
        if err.is_kind_undefined() {
            error!(parent: &self.span, "{} resource kind is not defined in the cluster", self.runner.name());
            (self.on_fatal)(&err);
        }
        err
    }

    /// Run `cold_start` once and move to `Initialized` if it succeeds.
    ///
    /// Concurrent callers are serialized. On failure the state stays
    /// `Created` so the caller may retry.
    pub async fn initialize<F, Fut>(&self, cold_start: F) -> Result<(), ControllerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ControllerError>>,
    {
        let _init = self.init_lock.lock().await;
        let next = self.state().mark_initialized()?;

        cold_start().instrument(self.span.clone()).await.map_err(|e| self.fail(e))?;

        *self.lock_state() = next;
        info!(parent: &self.span, "{} controller initialized", self.runner.name());
        Ok(())
    }

    /// Mark the controller started and run its loop until shutdown.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ControllerError> {
        {
            let mut state = self.lock_state();
            *state = state.begin_start(self.requires_init)?;
        }

        info!(parent: &self.span, "Starting {} reconcile loop", self.runner.name());
        self.runner
            .run(shutdown)
            .instrument(self.span.clone())
            .await
            .map_err(|e| self.fail(e))
    }
}
