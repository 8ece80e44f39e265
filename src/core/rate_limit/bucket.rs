//! Token bucket with non-blocking and blocking acquisition.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::RateLimitError;

/// A bucket holding at most `burst` tokens, refilled at `rate` tokens/second.
///
/// Starts full. Safe to share between threads; each acquisition locks the
/// bucket only long enough to refill and take a token.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// A zero burst or a non-positive rate can never admit traffic
    /// sensibly and is rejected.
    pub fn new(rate: f64, burst: u32) -> Result<Self, RateLimitError> {
        validate(rate, burst)?;
        Ok(Self::with_validated(rate, burst))
    }

    /// Construct from parameters that already passed [`validate`].
    pub(super) fn with_validated(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Take a token if one is available.
    pub fn allow(&self) -> bool {
        self.try_acquire().is_ok()
    }

    /// Take a token, or report how long until one frees up.
    pub fn try_acquire(&self) -> Result<(), RateLimitError> {
        self.reserve()
            .map_err(|retry_after| RateLimitError::Exhausted { retry_after })
    }

    /// Wait until a token is available or `ctx` is cancelled.
    pub async fn wait(&self, ctx: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            if ctx.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }
            let delay = match self.reserve() {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(RateLimitError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Time until the next token frees up; zero if one is available now.
    pub fn retry_after(&self) -> Duration {
        let mut state = self.lock();
        self.refill(&mut state);
        self.delay_for(state.tokens)
    }

    /// Tokens currently available (fractional).
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn reserve(&self) -> Result<(), Duration> {
        let mut state = self.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.delay_for(state.tokens))
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
    }

    fn delay_for(&self, tokens: f64) -> Duration {
        if tokens >= 1.0 {
            Duration::ZERO
        } else {
            // A vanishingly small rate can push the wait past what
            // `Duration` represents.
            Duration::try_from_secs_f64((1.0 - tokens) / self.rate).unwrap_or(Duration::MAX)
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(super) fn validate(rate: f64, burst: u32) -> Result<(), RateLimitError> {
    if burst == 0 {
        return Err(RateLimitError::invalid_config("burst must be at least 1"));
    }
    if !rate.is_finite() || rate <= 0.0 {
        return Err(RateLimitError::invalid_config(format!(
            "rate must be a positive number of tokens per second, got {rate}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test(start_paused = true)]
    async fn test_exactly_burst_immediate_allows() {
        let bucket = TokenBucket::new(1.0, 3).unwrap();
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let bucket = TokenBucket::new(2.0, 2).unwrap();
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bucket.allow());
        assert!(!bucket.allow());

        // Refill never exceeds burst.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!((bucket.available() - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_reports_wait() {
        let bucket = TokenBucket::new(0.5, 1).unwrap();
        assert_eq!(bucket.retry_after(), Duration::ZERO);
        assert!(bucket.allow());
        assert_eq!(bucket.retry_after(), Duration::from_secs(2));
        assert!(matches!(
            bucket.try_acquire(),
            Err(RateLimitError::Exhausted { retry_after }) if retry_after == Duration::from_secs(2)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_rate_saturates_retry_after() {
        let bucket = TokenBucket::new(1e-20, 1).unwrap();
        assert!(bucket.try_acquire().is_ok());
        assert!(matches!(
            bucket.try_acquire(),
            Err(RateLimitError::Exhausted { retry_after }) if retry_after == Duration::MAX
        ));
        assert_eq!(bucket.retry_after(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_rate_wait_still_cancellable() {
        let bucket = TokenBucket::new(1e-20, 1).unwrap();
        assert!(bucket.allow());

        let ctx = CancellationToken::new();
        let mut waiter = tokio_test::task::spawn({
            let ctx = ctx.clone();
            async move { bucket.wait(&ctx).await }
        });
        assert_pending!(waiter.poll());

        ctx.cancel();
        assert_eq!(assert_ready!(waiter.poll()), Err(RateLimitError::Cancelled));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(TokenBucket::new(1.0, 0), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(0.0, 1), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(-1.0, 1), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(f64::NAN, 1), Err(RateLimitError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_token_frees() {
        let bucket = Arc::new(TokenBucket::new(1.0, 1).unwrap());
        assert!(bucket.allow());

        let ctx = CancellationToken::new();
        let mut waiter = tokio_test::task::spawn({
            let bucket = bucket.clone();
            let ctx = ctx.clone();
            async move { bucket.wait(&ctx).await }
        });
        assert_pending!(waiter.poll());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(assert_ready!(waiter.poll()), Ok(()));
        assert!(!bucket.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_cancellation() {
        let bucket = TokenBucket::new(0.001, 1).unwrap();
        assert!(bucket.allow());

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert_eq!(bucket.wait(&ctx).await, Err(RateLimitError::Cancelled));
    }

    #[tokio::test]
    async fn test_wait_on_cancelled_context_fails_fast() {
        let bucket = TokenBucket::new(1.0, 1).unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(bucket.wait(&ctx).await, Err(RateLimitError::Cancelled));
        // The token was not consumed.
        assert!(bucket.allow());
    }
}
