//! Messages of the active room.
//!
//! [`MessageLog`] keeps arrival order and refuses a second entry with the
//! same sender, text, room and second. Entries only come from two places:
//! a history load, which replaces the log wholesale, and the ingestor, which
//! appends server echoes.

use std::collections::HashSet;

use nutler_proto::{
    ChatEvent, HistoryMessage, MessageKind, ProtocolError, RoomId, Timestamp, UserId,
};

/// A message as shown in the active room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Room id when known
    pub room_id: Option<RoomId>,
    /// Room name
    pub room: String,
    /// Sender id when known
    pub user_id: Option<UserId>,
    /// Sender display name
    pub username: String,
    /// Message text
    pub text: String,
    /// Record kind
    pub kind: MessageKind,
    /// Text is a single emoji
    pub is_emoji: bool,
    /// Normalized creation instant
    pub created_at: Timestamp,
}

impl ChatMessage {
    /// Build from a stored history row. History rows carry no room name, so
    /// the caller supplies the room the rows were fetched for.
    pub fn from_history(row: HistoryMessage, room: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            room_id: Some(row.room_id),
            room: room.to_string(),
            user_id: Some(row.user_id),
            username: row.username,
            text: row.message,
            kind: MessageKind::parse_loose(&row.message_type)?,
            is_emoji: row.is_emoji,
            created_at: row.created_at,
        })
    }

    fn dedup_key(&self) -> DedupKey {
        DedupKey {
            username: self.username.clone(),
            text: self.text.clone(),
            room: self.room.clone(),
            created_at: self.created_at,
        }
    }
}

impl From<ChatEvent> for ChatMessage {
    fn from(event: ChatEvent) -> Self {
        Self {
            room_id: event.room_id,
            room: event.room,
            user_id: event.user_id,
            username: event.username,
            text: event.message,
            kind: event.message_type,
            is_emoji: event.is_emoji,
            created_at: event.created_at,
        }
    }
}

/// Identity of a message for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    username: String,
    text: String,
    room: String,
    created_at: Timestamp,
}

/// Ordered, deduplicated message list.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    seen: HashSet<DedupKey>,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless an identical message is already present.
    ///
    /// Returns `true` when the message was appended.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.dedup_key()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the whole log, dropping duplicates within `messages`.
    ///
    /// Returns the number of messages kept.
    pub fn replace(&mut self, messages: impl IntoIterator<Item = ChatMessage>) -> usize {
        self.clear();
        for message in messages {
            self.push(message);
        }
        self.messages.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
    }

    /// Whether an identical message is present.
    pub fn contains(&self, message: &ChatMessage) -> bool {
        self.seen.contains(&message.dedup_key())
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
