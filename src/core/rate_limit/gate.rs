//! Keyed rate gate: one token bucket per key, created on first sight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{RateLimitError, TokenBucket, bucket};

/// Per-key bucket plus the last time the key was seen.
#[derive(Debug)]
struct Visitor {
    bucket: TokenBucket,
    /// Milliseconds since the owning gate's epoch.
    last_seen_ms: AtomicU64,
}

/// Token-bucket limiter keyed by an arbitrary string.
///
/// Known keys resolve under the shared lock and then rely on the bucket's own
/// lock for token accounting. Only the first observation of a key and the
/// eviction sweep take the exclusive lock.
#[derive(Debug)]
pub struct RateGate {
    rate: f64,
    burst: u32,
    epoch: Instant,
    visitors: RwLock<HashMap<String, Arc<Visitor>>>,
}

impl RateGate {
    /// Create a gate granting `rate` tokens/second with `burst` capacity per key.
    pub fn new(rate: f64, burst: u32) -> Result<Self, RateLimitError> {
        bucket::validate(rate, burst)?;
        Ok(Self {
            rate,
            burst,
            epoch: Instant::now(),
            visitors: RwLock::new(HashMap::new()),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Take a token for `key` if one is available.
    pub fn allow(&self, key: &str) -> bool {
        self.visitor(key).bucket.allow()
    }

    /// Take a token for `key`, or report how long until one frees up.
    pub fn try_acquire(&self, key: &str) -> Result<(), RateLimitError> {
        self.visitor(key).bucket.try_acquire()
    }

    /// Wait for a token for `key` until `ctx` is cancelled.
    pub async fn wait(&self, key: &str, ctx: &CancellationToken) -> Result<(), RateLimitError> {
        let visitor = self.visitor(key);
        visitor.bucket.wait(ctx).await
    }

    /// Remove keys idle for longer than `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let now_ms = self.now_ms();
        let ttl_ms = ttl.as_millis() as u64;

        let mut visitors = self.visitors.write().unwrap_or_else(PoisonError::into_inner);
        let before = visitors.len();
        visitors.retain(|_, v| {
            now_ms.saturating_sub(v.last_seen_ms.load(Ordering::Relaxed)) <= ttl_ms
        });
        before - visitors.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.visitors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.visitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn visitor(&self, key: &str) -> Arc<Visitor> {
        let now_ms = self.now_ms();

        let existing = self
            .visitors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if let Some(visitor) = existing {
            visitor.last_seen_ms.store(now_ms, Ordering::Relaxed);
            return visitor;
        }

        let mut visitors = self.visitors.write().unwrap_or_else(PoisonError::into_inner);
        let visitor = visitors
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Visitor {
                    bucket: TokenBucket::with_validated(self.rate, self.burst),
                    last_seen_ms: AtomicU64::new(now_ms),
                })
            })
            .clone();
        visitor.last_seen_ms.store(now_ms, Ordering::Relaxed);
        visitor
    }

    fn now_ms(&self) -> u64 {
        Instant::now().saturating_duration_since(self.epoch).as_millis() as u64
    }
}
