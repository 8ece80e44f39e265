//! Process lifecycle: start, signal-driven or requested shutdown, drain,
//! ordered teardown.
//!
//! ```text
//! Created -> Running -> ShuttingDown -> Drained -> Stopped
//! ```
//!
//! - [`Coordinator`] runs a transport as its own task and waits for the
//!   first of: caller cancellation, an OS termination signal, or the
//!   transport ending on its own (e.g. a listener error).
//! - [`LifecycleHandle`] is what transports hold: the shutdown broadcast and
//!   the in-flight counter.
//! - [`ShutdownManager`] runs cleanup hooks owned by other collaborators,
//!   once, in registration order.

mod coordinator;
mod error;
mod in_flight;
mod shutdown;
mod signal;

pub use coordinator::{Coordinator, LifecycleHandle, LifecycleState};
pub use error::{LifecycleError, LifecycleResult};
pub use in_flight::{InFlight, InFlightGuard};
pub use shutdown::ShutdownManager;
pub use signal::shutdown_signal;
