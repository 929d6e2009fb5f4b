//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from wall-clock time. The runtime asks the
//! environment for the current instant and for sleeps; simulation swaps in a
//! virtual clock so reconnection schedules can be asserted exactly.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `sleep(d)` completes no earlier than `now() + d`
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production uses `tokio::time::Instant`, simulation uses a virtual
    /// instant advanced by its own `sleep`.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the only async method in the trait and it is only used by the
    /// runtime, never by the state machines.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
