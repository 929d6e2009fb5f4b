//! Push events delivered by the backend.
//!
//! The push boundary carries two named events: `message`, whose payload is a
//! serialized [`ChatEvent`], and `connection_lost`, which has no payload.
//! [`ChatEvent::parse`] validates a payload against the canonical schema and
//! rejects anything else.
//!
//! # Canonical `message` payload
//!
//! ```text
//! {
//!   "message_type": "Chat",          required, PascalCase kind
//!   "username":     "Bob",           required, non-empty
//!   "message":      "hi",            required
//!   "room":         "IT General",    required, non-empty
//!   "created_at":   1700000000,      required, seconds | millis | string
//!   "user_id":      8,               optional
//!   "room_id":      1,               optional
//!   "message_id":   "…",             optional
//!   "is_emoji":     false            optional, defaults to false
//! }
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    model::{RoomId, UserId},
    timestamp::Timestamp,
};

/// Name of the push event carrying a chat record.
pub const MESSAGE_EVENT: &str = "message";

/// Name of the push event signalling link loss.
pub const CONNECTION_LOST_EVENT: &str = "connection_lost";

/// Kind of a chat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A client announced itself
    Connect,
    /// A client left the server
    Disconnect,
    /// User-authored text
    Chat,
    /// A client joined a room
    RoomJoin,
    /// A client left a room
    RoomLeave,
    /// Presence list update
    UserList,
    /// Server acknowledgement
    ServerAck,
}

impl MessageKind {
    const ALL: [Self; 7] = [
        Self::Connect,
        Self::Disconnect,
        Self::Chat,
        Self::RoomJoin,
        Self::RoomLeave,
        Self::UserList,
        Self::ServerAck,
    ];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::Disconnect => "Disconnect",
            Self::Chat => "Chat",
            Self::RoomJoin => "RoomJoin",
            Self::RoomLeave => "RoomLeave",
            Self::UserList => "UserList",
            Self::ServerAck => "ServerAck",
        }
    }

    /// Whether this kind is user-authored text.
    pub fn is_chat(self) -> bool {
        self == Self::Chat
    }

    /// Match a stored kind ignoring case.
    ///
    /// History rows are written with lowercase kinds; live events are not.
    pub fn parse_loose(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnknownKind(s.to_owned()))
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownKind(s.to_owned()))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated chat record from a `message` push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Record kind
    pub message_type: MessageKind,
    /// Sender display name
    pub username: String,
    /// Sender id, when the server forwards it
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Message text
    pub message: String,
    /// Server-assigned id, when present
    #[serde(default)]
    pub message_id: Option<String>,
    /// Target room name
    pub room: String,
    /// Target room id, when the server forwards it
    #[serde(default)]
    pub room_id: Option<RoomId>,
    /// Creation instant
    pub created_at: Timestamp,
    /// Text is a single emoji
    #[serde(default)]
    pub is_emoji: bool,
}

impl ChatEvent {
    /// Decode and validate a `message` payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let event: Self = serde_json::from_slice(payload)?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(ProtocolError::MissingField("username"));
        }
        if self.room.trim().is_empty() {
            return Err(ProtocolError::MissingField("room"));
        }
        Ok(())
    }
}

/// An event received on the push boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Raw `message` payload, parsed by the ingestor
    Message(Vec<u8>),
    /// The link to the server dropped
    ConnectionLost,
}

impl PushEvent {
    /// Build from an event name and its payload.
    pub fn from_named(name: &str, payload: impl Into<Vec<u8>>) -> Result<Self> {
        match name {
            MESSAGE_EVENT => Ok(Self::Message(payload.into())),
            CONNECTION_LOST_EVENT => Ok(Self::ConnectionLost),
            other => Err(ProtocolError::UnknownEvent(other.to_owned())),
        }
    }

    /// Event name on the push boundary.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => MESSAGE_EVENT,
            Self::ConnectionLost => CONNECTION_LOST_EVENT,
        }
    }
}
