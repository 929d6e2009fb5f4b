//! Wire records and push-event schema for the Nutler chat client.
//!
//! Everything that crosses the command or push boundary is defined here:
//! the catalog records returned by commands, the `message` push payload, and
//! the canonical [`Timestamp`] both of them are normalized to.
//!
//! Decoding is strict. A payload either matches the schema and becomes a
//! typed value, or it is rejected with a [`ProtocolError`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod event;
pub mod model;
pub mod timestamp;

pub use errors::{ProtocolError, Result};
pub use event::{CONNECTION_LOST_EVENT, ChatEvent, MESSAGE_EVENT, MessageKind, PushEvent};
pub use model::{ChatRoom, Department, DepartmentId, HistoryMessage, RoomId, User, UserId};
pub use timestamp::Timestamp;
