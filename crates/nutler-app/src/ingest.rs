//! Inbound message filtering.
//!
//! Every `message` push payload goes through [`MessageIngestor::ingest`]:
//! parse, keep only `Chat` records addressed to the active room, then hand
//! them to the [`MessageLog`] which drops duplicates. Nothing is buffered:
//! a message for a room that is not active is gone, the history load on
//! entering that room is how it comes back.
//!
//! A malformed payload is logged and dropped. It never ends the
//! subscription.

use nutler_proto::{ChatEvent, MessageKind, ProtocolError, RoomId};

use crate::log::{ChatMessage, MessageLog};

/// Why an otherwise valid record was not appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    /// No room is active
    NoActiveRoom,
    /// Not user-authored text
    NotChat(MessageKind),
    /// Addressed to another room
    OtherRoom {
        /// Room the record was for
        room: String,
    },
}

/// What happened to one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Appended to the log
    Appended,
    /// Already in the log
    Duplicate,
    /// Valid but not for the active room
    Filtered(FilterReason),
    /// Did not parse
    Rejected(ProtocolError),
}

impl IngestOutcome {
    /// Whether the log changed.
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended)
    }
}

/// Per-outcome counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Payloads appended
    pub appended: u64,
    /// Payloads dropped as duplicates
    pub duplicates: u64,
    /// Payloads filtered out
    pub filtered: u64,
    /// Payloads that failed to parse
    pub rejected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveRoom {
    id: RoomId,
    name: String,
}

/// Room-scoped filter in front of the [`MessageLog`].
#[derive(Debug, Clone, Default)]
pub struct MessageIngestor {
    active: Option<ActiveRoom>,
    stats: IngestStats,
}

impl MessageIngestor {
    /// Create an ingestor with no active room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the filter to a room. Takes effect for the next payload.
    pub fn focus(&mut self, id: RoomId, name: impl Into<String>) {
        self.active = Some(ActiveRoom { id, name: name.into() });
    }

    /// Drop the room scope; everything is filtered until the next focus.
    pub fn unfocus(&mut self) {
        self.active = None;
    }

    /// Name of the room the filter is scoped to.
    pub fn active_room(&self) -> Option<&str> {
        self.active.as_ref().map(|room| room.name.as_str())
    }

    /// Id of the room the filter is scoped to.
    pub fn active_room_id(&self) -> Option<RoomId> {
        self.active.as_ref().map(|room| room.id)
    }

    /// Counters since creation.
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Parse one raw payload and apply it to `log`.
    pub fn ingest(&mut self, payload: &[u8], log: &mut MessageLog) -> IngestOutcome {
        match ChatEvent::parse(payload) {
            Ok(event) => self.accept(event, log),
            Err(err) => {
                tracing::warn!(error = %err, len = payload.len(), "dropping malformed message");
                self.stats.rejected += 1;
                IngestOutcome::Rejected(err)
            },
        }
    }

    /// Apply an already parsed record to `log`.
    pub fn accept(&mut self, event: ChatEvent, log: &mut MessageLog) -> IngestOutcome {
        if let Some(reason) = self.filter(&event) {
            tracing::trace!(?reason, "message filtered");
            self.stats.filtered += 1;
            return IngestOutcome::Filtered(reason);
        }

        if log.push(ChatMessage::from(event)) {
            self.stats.appended += 1;
            IngestOutcome::Appended
        } else {
            tracing::debug!("duplicate message dropped");
            self.stats.duplicates += 1;
            IngestOutcome::Duplicate
        }
    }

    fn filter(&self, event: &ChatEvent) -> Option<FilterReason> {
        let Some(active) = &self.active else {
            return Some(FilterReason::NoActiveRoom);
        };
        if !event.message_type.is_chat() {
            return Some(FilterReason::NotChat(event.message_type));
        }
        if event.room != active.name {
            return Some(FilterReason::OtherRoom { room: event.room.clone() });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(kind: &str, room: &str, username: &str, text: &str, created_at: i64) -> Vec<u8> {
        format!(
            r#"{{"message_type":"{kind}","username":"{username}","message":"{text}","room":"{room}","created_at":{created_at}}}"#
        )
        .into_bytes()
    }

    fn focused() -> MessageIngestor {
        let mut ingestor = MessageIngestor::new();
        ingestor.focus(1, "IT General");
        ingestor
    }

    #[test]
    fn chat_for_active_room_is_appended() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();

        let outcome =
            ingestor.ingest(&payload("Chat", "IT General", "Bob", "hi", 1_700_000_000), &mut log);
        assert_eq!(outcome, IngestOutcome::Appended);
        assert_eq!(log.messages()[0].username, "Bob");
    }

    #[test]
    fn second_copy_is_duplicate() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();
        let bytes = payload("Chat", "IT General", "Bob", "hi", 1_700_000_000);

        ingestor.ingest(&bytes, &mut log);
        assert_eq!(ingestor.ingest(&bytes, &mut log), IngestOutcome::Duplicate);
        assert_eq!(log.len(), 1);
        assert_eq!(ingestor.stats().duplicates, 1);
    }

    #[test]
    fn other_room_is_filtered() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();

        let outcome = ingestor.ingest(&payload("Chat", "Sales", "Bob", "hi", 1), &mut log);
        assert_eq!(
            outcome,
            IngestOutcome::Filtered(FilterReason::OtherRoom { room: "Sales".into() })
        );
        assert!(log.is_empty());
    }

    #[test]
    fn system_kinds_are_filtered() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();

        let outcome = ingestor.ingest(&payload("RoomJoin", "IT General", "Bob", "", 1), &mut log);
        assert_eq!(
            outcome,
            IngestOutcome::Filtered(FilterReason::NotChat(MessageKind::RoomJoin))
        );
    }

    #[test]
    fn nothing_passes_without_active_room() {
        let mut ingestor = MessageIngestor::new();
        let mut log = MessageLog::new();

        let outcome = ingestor.ingest(&payload("Chat", "IT General", "Bob", "hi", 1), &mut log);
        assert_eq!(outcome, IngestOutcome::Filtered(FilterReason::NoActiveRoom));
    }

    #[test]
    fn malformed_payload_is_rejected_and_counted() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();

        let outcome = ingestor.ingest(b"{\"message_type\":", &mut log);
        assert!(matches!(outcome, IngestOutcome::Rejected(ProtocolError::Malformed(_))));
        assert_eq!(ingestor.stats().rejected, 1);

        // Next payload still flows
        let outcome = ingestor.ingest(&payload("Chat", "IT General", "Bob", "hi", 1), &mut log);
        assert!(outcome.is_appended());
    }

    #[test]
    fn refocus_applies_to_next_payload() {
        let mut ingestor = focused();
        let mut log = MessageLog::new();

        ingestor.focus(2, "Sales");
        let outcome = ingestor.ingest(&payload("Chat", "IT General", "Bob", "hi", 1), &mut log);
        assert!(matches!(outcome, IngestOutcome::Filtered(FilterReason::OtherRoom { .. })));
        assert_eq!(ingestor.active_room_id(), Some(2));
    }
}
