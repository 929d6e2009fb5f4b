//! Deterministic test harness for the Nutler session manager.
//!
//! In-memory implementations of the backend, persistence and environment
//! ports so a `SessionController` and its `Runtime` can be driven without
//! sockets or wall-clock time.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the session
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod memory_store;
pub mod sim_backend;
pub mod sim_env;

pub use invariants::{
    ActiveRoomMatchesView, AttemptWithinBudget, Invariant, InvariantRegistry, InvariantResult,
    LogHasNoDuplicates, LogScopedToActiveRoom, MessageSnapshot, SessionSnapshot, Violation,
};
pub use memory_store::MemorySessionStore;
pub use sim_backend::SimBackend;
pub use sim_env::{SimEnv, SimInstant};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init();
}
