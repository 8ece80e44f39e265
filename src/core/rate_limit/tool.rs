//! Per-tool rate gate.

use tokio_util::sync::CancellationToken;

use super::{RateGate, RateLimitError};

/// Default burst for tool gates.
pub const DEFAULT_TOOL_BURST: u32 = 5;

/// Rate gate keyed by tool name, configured in executions per minute.
#[derive(Debug)]
pub struct ToolRateGate {
    gate: RateGate,
}

impl ToolRateGate {
    /// Create a gate allowing `per_minute` executions per tool with `burst`.
    pub fn new(per_minute: u32, burst: u32) -> Result<Self, RateLimitError> {
        if per_minute == 0 {
            return Err(RateLimitError::invalid_config(
                "tool rate must be at least one execution per minute",
            ));
        }
        Ok(Self {
            gate: RateGate::new(f64::from(per_minute) / 60.0, burst)?,
        })
    }

    /// Create a gate with the default burst.
    pub fn per_minute(per_minute: u32) -> Result<Self, RateLimitError> {
        Self::new(per_minute, DEFAULT_TOOL_BURST)
    }

    /// Take a token for `tool` without waiting.
    pub fn allow(&self, tool: &str) -> bool {
        self.gate.allow(tool)
    }

    /// Wait until `tool` may run, or `ctx` is cancelled.
    pub async fn wait(&self, tool: &str, ctx: &CancellationToken) -> Result<(), RateLimitError> {
        self.gate.wait(tool, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_per_minute_conversion() {
        let gate = ToolRateGate::new(60, 1).unwrap();
        assert!(gate.allow("search"));
        assert!(!gate.allow("search"));

        // 60/min is one token per second.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(gate.allow("search"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_burst() {
        let gate = ToolRateGate::per_minute(1).unwrap();
        for _ in 0..DEFAULT_TOOL_BURST {
            assert!(gate.allow("slow"));
        }
        assert!(!gate.allow("slow"));
        assert!(gate.allow("other"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_token() {
        let gate = ToolRateGate::new(30, 1).unwrap();
        assert!(gate.allow("t"));

        let start = tokio::time::Instant::now();
        gate.wait("t", &CancellationToken::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancelled() {
        let gate = ToolRateGate::new(1, 1).unwrap();
        assert!(gate.allow("t"));

        let ctx = CancellationToken::new();
        let child = ctx.clone();
        let handle = tokio::spawn(async move { gate.wait("t", &child).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctx.cancel();
        assert_eq!(handle.await.unwrap(), Err(RateLimitError::Cancelled));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(ToolRateGate::new(0, 5).is_err());
        assert!(ToolRateGate::new(10, 0).is_err());
    }
}
