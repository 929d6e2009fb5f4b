//! Core state machines for the Nutler chat client.
//!
//! Pure, I/O-free logic: the [`ConnectionManager`] that owns the link
//! lifecycle, the [`BackoffPolicy`] it schedules retries with, and the
//! [`Environment`] abstraction drivers use to supply time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod connection;
pub mod env;
pub mod error;

pub use backoff::BackoffPolicy;
pub use connection::{
    ConnectTarget, ConnectionAction, ConnectionEvent, ConnectionManager, ConnectionState,
};
pub use env::Environment;
pub use error::ConnectionError;
