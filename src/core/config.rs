//! Configuration management for the bridge server.
//!
//! All settings have defaults and can be overridden through `MCP_`-prefixed
//! environment variables (a `.env` file is honoured). Sections are plain
//! serde structs so they can also be built in code or deserialized.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{Error, Result};
use super::transport::TransportConfig;
use crate::core::rate_limit::DEFAULT_TOOL_BURST;

/// Main configuration structure for the bridge server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Client and tool rate gates.
    pub rate_limit: RateLimitConfig,

    /// Drain and shutdown deadlines.
    pub shutdown: ShutdownConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-bridge-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the per-client HTTP gate is active.
    pub enabled: bool,

    /// Sustained requests per second per client.
    pub client_rate: f64,

    /// Maximum requests a client may burst.
    pub client_burst: u32,

    /// Idle time after which a client's bucket is evicted.
    pub client_ttl_secs: u64,

    /// How often idle client buckets are swept.
    pub sweep_interval_secs: u64,

    /// Executions per minute per tool. `None` disables the tool gate.
    pub tool_per_minute: Option<u32>,

    /// Burst for the tool gate.
    pub tool_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_rate: 10.0,
            client_burst: 20,
            client_ttl_secs: 600,
            sweep_interval_secs: 60,
            tool_per_minute: None,
            tool_burst: DEFAULT_TOOL_BURST,
        }
    }
}

impl RateLimitConfig {
    pub fn client_ttl(&self) -> Duration {
        Duration::from_secs(self.client_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Shutdown deadlines, shared by every transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to finish.
    pub drain_timeout_secs: u64,

    /// Outer bound on the whole shutdown sequence.
    pub shutdown_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 20,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_LOG_LEVEL`. Unparseable numeric
    /// values are ignored with a warning and the default is kept.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();

        let rate_limit = &mut config.rate_limit;
        if let Ok(enabled) = std::env::var("MCP_RATE_LIMIT_ENABLED") {
            rate_limit.enabled = enabled.to_lowercase() != "false" && enabled != "0";
        }
        if let Some(rate) = env_parse("MCP_RATE_LIMIT_RPS") {
            rate_limit.client_rate = rate;
        }
        if let Some(burst) = env_parse("MCP_RATE_LIMIT_BURST") {
            rate_limit.client_burst = burst;
        }
        if let Some(ttl) = env_parse("MCP_RATE_LIMIT_TTL_SECS") {
            rate_limit.client_ttl_secs = ttl;
        }
        if let Some(interval) = env_parse("MCP_RATE_LIMIT_SWEEP_SECS") {
            rate_limit.sweep_interval_secs = interval;
        }
        if let Some(per_minute) = env_parse("MCP_TOOL_RATE_PER_MINUTE") {
            rate_limit.tool_per_minute = Some(per_minute);
            info!("Tool rate gate enabled: {} executions/min per tool", per_minute);
        }
        if let Some(burst) = env_parse("MCP_TOOL_RATE_BURST") {
            rate_limit.tool_burst = burst;
        }

        if let Some(drain) = env_parse("MCP_DRAIN_TIMEOUT_SECS") {
            config.shutdown.drain_timeout_secs = drain;
        }
        if let Some(shutdown) = env_parse("MCP_SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown.shutdown_timeout_secs = shutdown;
        }

        config
    }

    /// Reject settings no component could run with.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limit;
        if rl.enabled {
            if !rl.client_rate.is_finite() || rl.client_rate <= 0.0 {
                return Err(Error::config(format!(
                    "client rate must be positive, got {}",
                    rl.client_rate
                )));
            }
            if rl.client_burst == 0 {
                return Err(Error::config("client burst must be at least 1"));
            }
            if rl.sweep_interval_secs == 0 {
                return Err(Error::config("sweep interval must be at least 1 second"));
            }
        }
        if rl.tool_per_minute == Some(0) {
            return Err(Error::config("tool rate must be at least 1 per minute"));
        }
        if rl.tool_per_minute.is_some() && rl.tool_burst == 0 {
            return Err(Error::config("tool burst must be at least 1"));
        }

        let sd = &self.shutdown;
        if sd.drain_timeout_secs > sd.shutdown_timeout_secs {
            return Err(Error::config(format!(
                "drain timeout ({}s) exceeds shutdown timeout ({}s)",
                sd.drain_timeout_secs, sd.shutdown_timeout_secs
            )));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests run serially
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.client_rate, 10.0);
        assert_eq!(config.rate_limit.client_burst, 20);
        assert_eq!(config.rate_limit.client_ttl(), Duration::from_secs(600));
        assert_eq!(config.rate_limit.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.tool_per_minute, None);
        assert_eq!(config.shutdown.drain_timeout(), Duration::from_secs(20));
        assert_eq!(config.shutdown.shutdown_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("MCP_RATE_LIMIT_RPS", "2.5");
            std::env::set_var("MCP_RATE_LIMIT_BURST", "4");
            std::env::set_var("MCP_TOOL_RATE_PER_MINUTE", "30");
        }
        let config = Config::from_env();
        assert_eq!(config.rate_limit.client_rate, 2.5);
        assert_eq!(config.rate_limit.client_burst, 4);
        assert_eq!(config.rate_limit.tool_per_minute, Some(30));
        unsafe {
            std::env::remove_var("MCP_RATE_LIMIT_RPS");
            std::env::remove_var("MCP_RATE_LIMIT_BURST");
            std::env::remove_var("MCP_TOOL_RATE_PER_MINUTE");
        }
    }

    #[test]
    fn test_unparseable_value_keeps_default() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("MCP_DRAIN_TIMEOUT_SECS", "soon");
        }
        let config = Config::from_env();
        assert_eq!(config.shutdown.drain_timeout_secs, 20);
        unsafe {
            std::env::remove_var("MCP_DRAIN_TIMEOUT_SECS");
        }
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.rate_limit.client_burst = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.client_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.tool_per_minute = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.shutdown.drain_timeout_secs = 45;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_client_gate_skips_its_checks() {
        let mut config = Config::default();
        config.rate_limit.enabled = false;
        config.rate_limit.client_burst = 0;
        assert!(config.validate().is_ok());
    }
}
