//! Token-bucket admission control.
//!
//! One algorithm, two specializations:
//! - [`ClientRateGate`]: keyed by caller address, idle entries evicted by a
//!   background sweeper.
//! - [`ToolRateGate`]: keyed by tool name, configured in executions per
//!   minute, with blocking acquisition.
//!
//! Both are thin wrappers around [`RateGate`], which lazily creates one
//! [`TokenBucket`] per key.

mod bucket;
mod client;
mod error;
mod gate;
mod tool;

pub use bucket::TokenBucket;
pub use client::{ClientRateGate, resolve_client_key};
pub use error::RateLimitError;
pub use gate::RateGate;
pub use tool::{DEFAULT_TOOL_BURST, ToolRateGate};
