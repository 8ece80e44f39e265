//! Ordered shutdown hooks.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{LifecycleError, LifecycleResult};

type Hook = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs cleanup owned by other collaborators, exactly once.
///
/// Hooks run in registration order. A failing hook is logged and the rest
/// still run; the first failure is returned once all have finished. After
/// the first [`ShutdownManager::shutdown`] the manager is permanently shut
/// down: later shutdowns and registrations are no-ops.
#[derive(Default)]
pub struct ShutdownManager {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    hooks: Vec<(String, Hook)>,
    shut_down: bool,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Returns `false` (and logs a warning) if shutdown has
    /// already begun.
    pub fn register<F, Fut>(&self, name: impl Into<String>, hook: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let mut state = self.lock();
        if state.shut_down {
            warn!(hook = %name, "Shutdown already in progress, hook not registered");
            return false;
        }
        state
            .hooks
            .push((name, Box::new(move |ctx| hook(ctx).boxed())));
        true
    }

    /// Run all hooks in registration order.
    pub async fn shutdown(&self, ctx: &CancellationToken) -> LifecycleResult<()> {
        let hooks = {
            let mut state = self.lock();
            if state.shut_down {
                return Ok(());
            }
            state.shut_down = true;
            std::mem::take(&mut state.hooks)
        };

        info!(hooks = hooks.len(), "Running shutdown hooks");
        let mut first_error = None;
        for (name, hook) in hooks {
            match hook(ctx.clone()).await {
                Ok(()) => info!(hook = %name, "Shutdown hook completed"),
                Err(source) => {
                    error!(hook = %name, error = %source, "Shutdown hook failed");
                    if first_error.is_none() {
                        first_error = Some(LifecycleError::HookFailed { name, source });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Number of hooks waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().hooks.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ShutdownManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ShutdownManager")
            .field("pending", &state.hooks.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}
