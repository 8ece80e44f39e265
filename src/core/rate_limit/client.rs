//! Per-client rate gate with idle eviction.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RateGate, RateLimitError};

/// Paths that are never rate limited.
const DEFAULT_BYPASS_PATHS: &[&str] = &["/health", "/metrics"];

/// Rate gate keyed by resolved caller address.
///
/// Entries idle for longer than `ttl` are removed by a background sweeper
/// started with [`ClientRateGate::start_sweeper`] and stopped with
/// [`ClientRateGate::stop_sweeper`].
#[derive(Debug)]
pub struct ClientRateGate {
    gate: RateGate,
    ttl: Duration,
    sweep_interval: Duration,
    bypass_paths: Vec<String>,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl ClientRateGate {
    /// Create a gate with a server-wide `rate` (requests/second) and `burst`.
    pub fn new(
        rate: f64,
        burst: u32,
        ttl: Duration,
        sweep_interval: Duration,
    ) -> Result<Self, RateLimitError> {
        if sweep_interval.is_zero() {
            return Err(RateLimitError::invalid_config("sweep interval must be non-zero"));
        }
        Ok(Self {
            gate: RateGate::new(rate, burst)?,
            ttl,
            sweep_interval,
            bypass_paths: DEFAULT_BYPASS_PATHS.iter().map(|p| p.to_string()).collect(),
            sweeper: Mutex::new(None),
        })
    }

    /// Whether requests to `path` skip the gate.
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }

    /// Take a token for `client`.
    pub fn allow(&self, client: &str) -> bool {
        self.gate.allow(client)
    }

    /// Take a token for `client`, reporting the retry delay on rejection.
    pub fn check(&self, client: &str) -> Result<(), RateLimitError> {
        self.gate.try_acquire(client)
    }

    /// Evict clients idle beyond the TTL.
    pub fn sweep(&self) -> usize {
        self.gate.sweep(self.ttl)
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.gate.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Spawn the periodic eviction task. Calling it again while a sweeper is
    /// running has no effect.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        drop(slot);

        let gate = Arc::downgrade(self);
        let period = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(gate) = gate.upgrade() else { break };
                        let removed = gate.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = gate.tracked_clients(), "Evicted idle rate limit entries");
                        }
                    }
                }
            }
            info!("Rate limit sweeper stopped");
        });
    }

    /// Stop the eviction task if it is running.
    pub fn stop_sweeper(&self) {
        if let Some(token) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for ClientRateGate {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

/// Resolve the rate-limit key for a caller.
///
/// Prefers the first hop of `X-Forwarded-For`, then `X-Real-IP`, then the
/// connection address without its port.
pub fn resolve_client_key(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    remote: Option<SocketAddr>,
) -> String {
    if let Some(first) = forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }

    if let Some(ip) = real_ip.map(str::trim).filter(|s| !s.is_empty()) {
        return ip.to_string();
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
