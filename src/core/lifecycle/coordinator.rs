//! Lifecycle coordinator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{InFlight, InFlightGuard, LifecycleError, LifecycleResult, ShutdownManager};
use crate::core::config::ShutdownConfig;
use crate::core::transport::TransportResult;

/// Where the process is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    ShuttingDown,
    Drained,
    Stopped,
}

/// The slice of lifecycle state a transport needs.
///
/// Cloning is cheap; all clones share the same broadcast and counter.
#[derive(Debug, Clone, Default)]
pub struct LifecycleHandle {
    shutdown: CancellationToken,
    in_flight: InFlight,
}

impl LifecycleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin shutdown. Safe to call any number of times.
    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once shutdown has begun.
    pub async fn shutting_down(&self) {
        self.shutdown.cancelled().await
    }

    /// The shutdown broadcast itself.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Context for one request: cancelled when shutdown begins, and dropped
    /// with the request otherwise.
    pub fn request_context(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Count a request as in flight until the guard drops.
    pub fn enter(&self) -> InFlightGuard {
        self.in_flight.enter()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

/// Drives a transport from start to a bounded, ordered stop.
#[derive(Debug)]
pub struct Coordinator {
    handle: LifecycleHandle,
    hooks: Arc<ShutdownManager>,
    drain_timeout: Duration,
    shutdown_timeout: Duration,
    state: watch::Sender<LifecycleState>,
}

impl Coordinator {
    /// Create a coordinator.
    ///
    /// `drain_timeout` bounds waiting for in-flight requests;
    /// `shutdown_timeout` bounds the whole stop, measured from the trigger.
    pub fn new(drain_timeout: Duration, shutdown_timeout: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            handle: LifecycleHandle::new(),
            hooks: Arc::new(ShutdownManager::new()),
            drain_timeout,
            shutdown_timeout,
            state,
        }
    }

    pub fn from_config(config: &ShutdownConfig) -> Self {
        Self::new(config.drain_timeout(), config.shutdown_timeout())
    }

    pub fn handle(&self) -> LifecycleHandle {
        self.handle.clone()
    }

    /// Hooks run after the transport has stopped.
    pub fn hooks(&self) -> &Arc<ShutdownManager> {
        &self.hooks
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Run `serve` until `ctx` is cancelled, an OS termination signal
    /// arrives, or the transport stops by itself; then shut down.
    pub async fn run<F, Fut>(&self, ctx: CancellationToken, serve: F) -> LifecycleResult<()>
    where
        F: FnOnce(LifecycleHandle) -> Fut,
        Fut: Future<Output = TransportResult<()>> + Send + 'static,
    {
        self.run_until(ctx, serve, super::shutdown_signal()).await
    }

    /// [`Coordinator::run`] with an explicit signal source.
    pub async fn run_until<F, Fut, S>(
        &self,
        ctx: CancellationToken,
        serve: F,
        signal: S,
    ) -> LifecycleResult<()>
    where
        F: FnOnce(LifecycleHandle) -> Fut,
        Fut: Future<Output = TransportResult<()>> + Send + 'static,
        S: Future<Output = ()>,
    {
        let mut task = tokio::spawn(serve(self.handle.clone()));
        self.set_state(LifecycleState::Running);

        let finished = tokio::select! {
            _ = ctx.cancelled() => {
                info!("Shutdown requested");
                None
            }
            _ = signal => None,
            res = &mut task => {
                match &res {
                    Ok(Ok(())) => info!("Transport finished"),
                    Ok(Err(e)) => error!(error = %e, "Transport failed"),
                    Err(e) => error!(error = %e, "Transport task failed"),
                }
                Some(res)
            }
        };

        let deadline = Instant::now() + self.shutdown_timeout;
        self.handle.trigger_shutdown();
        self.set_state(LifecycleState::ShuttingDown);

        self.drain().await;
        self.set_state(LifecycleState::Drained);

        let result = match finished {
            Some(res) => flatten(res),
            None => match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(res) => flatten(res),
                Err(_) => {
                    task.abort();
                    error!(timeout = ?self.shutdown_timeout, "Transport did not stop in time, forcing close");
                    Err(LifecycleError::timeout("shutdown", self.shutdown_timeout))
                }
            },
        };
        self.set_state(LifecycleState::Stopped);

        self.run_hooks(deadline).await;
        info!("Shutdown complete");
        result
    }

    /// Wait for in-flight requests, bounded by the drain timeout. Timing out
    /// is logged, not fatal.
    async fn drain(&self) {
        let in_flight = self.handle.in_flight();
        let pending = in_flight.count();
        if pending > 0 {
            info!(in_flight = pending, "Draining in-flight requests");
        }
        if tokio::time::timeout(self.drain_timeout, in_flight.wait_idle())
            .await
            .is_err()
        {
            warn!(
                in_flight = in_flight.count(),
                timeout = ?self.drain_timeout,
                "Drain timed out, continuing shutdown"
            );
        }
    }

    async fn run_hooks(&self, deadline: Instant) {
        let ctx = CancellationToken::new();
        let expiry = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                ctx.cancel();
            })
        };
        if let Err(e) = self.hooks.shutdown(&ctx).await {
            warn!(error = %e, "Shutdown hooks reported an error");
        }
        expiry.abort();
    }

    fn set_state(&self, next: LifecycleState) {
        self.state.send_replace(next);
    }
}

fn flatten(res: Result<TransportResult<()>, JoinError>) -> LifecycleResult<()> {
    match res {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(LifecycleError::TaskFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::TransportError;
    use std::sync::Mutex;

    /// A transport that serves until shutdown and then takes `linger` to close.
    fn idle_transport(
        linger: Duration,
    ) -> impl FnOnce(LifecycleHandle) -> futures::future::BoxFuture<'static, TransportResult<()>> {
        move |handle: LifecycleHandle| {
            Box::pin(async move {
                handle.shutting_down().await;
                tokio::time::sleep(linger).await;
                Ok(())
            })
        }
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_runs_full_sequence() {
        let coordinator = Coordinator::new(Duration::from_secs(20), Duration::from_secs(30));
        let mut states = coordinator.subscribe();
        assert_eq!(coordinator.state(), LifecycleState::Created);

        let hook_ran = Arc::new(Mutex::new(false));
        let flag = hook_ran.clone();
        coordinator.hooks().register("flag", move |_| async move {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        coordinator
            .run_until(ctx, idle_transport(Duration::from_millis(10)), never())
            .await
            .unwrap();

        assert_eq!(coordinator.state(), LifecycleState::Stopped);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), LifecycleState::Stopped);
        assert!(*hook_ran.lock().unwrap());
        assert!(coordinator.handle().is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_triggers_shutdown() {
        let coordinator = Coordinator::new(Duration::from_secs(1), Duration::from_secs(5));
        let signal = tokio::time::sleep(Duration::from_millis(50));

        coordinator
            .run_until(CancellationToken::new(), idle_transport(Duration::ZERO), signal)
            .await
            .unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_finishes_early_when_requests_complete() {
        let coordinator = Coordinator::new(Duration::from_secs(20), Duration::from_secs(30));
        let handle = coordinator.handle();

        for i in 0..3u64 {
            let guard = handle.enter();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200 + i * 100)).await;
                drop(guard);
            });
        }

        let ctx = CancellationToken::new();
        ctx.cancel();
        let start = Instant::now();
        coordinator
            .run_until(ctx, idle_transport(Duration::ZERO), never())
            .await
            .unwrap();

        let took = start.elapsed();
        assert!(took >= Duration::from_millis(400));
        assert!(took < Duration::from_secs(20), "drain waited the full timeout: {took:?}");
        assert_eq!(handle.in_flight().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_is_not_fatal() {
        let coordinator = Coordinator::new(Duration::from_secs(2), Duration::from_secs(30));
        let handle = coordinator.handle();
        let _stuck = handle.enter();

        let ctx = CancellationToken::new();
        ctx.cancel();
        let start = Instant::now();
        coordinator
            .run_until(ctx, idle_transport(Duration::ZERO), never())
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(handle.in_flight().count(), 1);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_exceeded() {
        let coordinator = Coordinator::new(Duration::from_secs(1), Duration::from_secs(3));
        let hook_ran = Arc::new(Mutex::new(false));
        let flag = hook_ran.clone();
        coordinator.hooks().register("flag", move |_| async move {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = coordinator
            .run_until(ctx, idle_transport(Duration::from_secs(60)), never())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // Teardown still happens.
        assert!(*hook_ran.lock().unwrap());
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_triggers_shutdown() {
        let coordinator = Coordinator::new(Duration::from_secs(1), Duration::from_secs(3));
        let handle = coordinator.handle();

        let err = coordinator
            .run_until(
                CancellationToken::new(),
                |_| async { Err(TransportError::http("listener closed")) },
                never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Transport(_)));
        assert!(handle.is_shutting_down());
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let handle = LifecycleHandle::new();
        handle.trigger_shutdown();
        handle.trigger_shutdown();
        assert!(handle.is_shutting_down());
        assert!(handle.request_context().is_cancelled());
    }
}
