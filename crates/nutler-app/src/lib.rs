//! Session management for the Nutler chat client.
//!
//! Keeps a live link to a chat server, ingests pushed messages without
//! duplication, reconnects with bounded backoff and drives the
//! login → rooms → chat view flow. The backend (transport, server, store)
//! is reached only through the [`Backend`] command and push boundaries, and
//! the cached session id only through the [`SessionStore`] port.
//!
//! # Architecture
//!
//! - [`SessionController`]: orchestrator, owns all session state
//! - [`Runtime`]: the event loop feeding intents, push events and timer
//!   expiries into the controller
//! - [`MessageIngestor`] and [`MessageLog`]: room-scoped, deduplicated
//!   message intake
//! - [`RoomCatalog`]: cached departments and rooms
//! - [`View`]: the screen state machine

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ingest;
pub mod log;
pub mod runtime;
pub mod session;
pub mod store;
pub mod system_env;
pub mod view;

pub use backend::{Backend, Command, CommandError, OutgoingMessage};
pub use catalog::RoomCatalog;
pub use config::{DEFAULT_PORT, Mode, SessionConfig};
pub use error::{SessionError, ValidationError};
pub use ingest::{FilterReason, IngestOutcome, IngestStats, MessageIngestor};
pub use log::{ChatMessage, MessageLog};
pub use runtime::{Intent, PendingRetry, Runtime};
pub use session::{JoinForm, ResumeOutcome, SessionController, TimerCommand};
pub use store::{FileSessionStore, SESSION_KEY, SessionStore, StoreError};
pub use system_env::SystemEnv;
pub use view::{View, ViewEffect, ViewError, ViewIntent};
