//! Property tests for message ingestion.
//!
//! Arbitrary interleavings of chat records, replays, foreign-room records and
//! garbage payloads are fed through a focused ingestor. Whatever the order,
//! the log holds each distinct active-room chat record exactly once.

use std::collections::HashSet;

use nutler_app::{IngestOutcome, MessageIngestor, MessageLog};
use proptest::prelude::*;

const ACTIVE: &str = "IT General";
const BASE_SECS: i64 = 1_700_000_000;

#[derive(Debug, Clone)]
enum Delivery {
    /// Chat record for `room`, stamped in seconds or milliseconds
    Chat { room: &'static str, sender: u8, text: u8, offset: i64, millis: bool },
    /// Non-chat record for the active room
    Presence { sender: u8 },
    /// Undecodable payload
    Garbage,
}

impl Delivery {
    fn payload(&self) -> Vec<u8> {
        match self {
            Self::Chat { room, sender, text, offset, millis } => {
                let secs = BASE_SECS + offset;
                let created_at = if *millis { secs * 1000 + 999 } else { secs };
                serde_json::json!({
                    "message_type": "Chat",
                    "username": format!("user{sender}"),
                    "message": format!("text{text}"),
                    "room": room,
                    "created_at": created_at,
                })
                .to_string()
                .into_bytes()
            },
            Self::Presence { sender } => serde_json::json!({
                "message_type": "UserList",
                "username": format!("user{sender}"),
                "message": "",
                "room": ACTIVE,
                "created_at": BASE_SECS,
            })
            .to_string()
            .into_bytes(),
            Self::Garbage => b"{\"message_type\":".to_vec(),
        }
    }

    /// Dedup identity of an active-room chat record.
    fn key(&self) -> Option<(u8, u8, i64)> {
        match self {
            Self::Chat { room, sender, text, offset, .. } if *room == ACTIVE => {
                Some((*sender, *text, *offset))
            },
            _ => None,
        }
    }
}

fn delivery_strategy() -> impl Strategy<Value = Delivery> {
    let room = prop_oneof![Just(ACTIVE), Just("Sales Floor")];
    prop_oneof![
        6 => (room, 0u8..3, 0u8..3, 0i64..4, any::<bool>())
            .prop_map(|(room, sender, text, offset, millis)| Delivery::Chat {
                room,
                sender,
                text,
                offset,
                millis,
            }),
        1 => (0u8..3).prop_map(|sender| Delivery::Presence { sender }),
        1 => Just(Delivery::Garbage),
    ]
}

proptest! {
    /// INVARIANT: every distinct active-room chat record lands exactly once.
    #[test]
    fn prop_log_holds_each_record_once(
        deliveries in prop::collection::vec(delivery_strategy(), 0..60),
    ) {
        let mut ingestor = MessageIngestor::new();
        ingestor.focus(1, ACTIVE);
        let mut log = MessageLog::new();
        let mut expected = HashSet::new();

        for delivery in &deliveries {
            let outcome = ingestor.ingest(&delivery.payload(), &mut log);
            match delivery.key() {
                Some(key) => {
                    let fresh = expected.insert(key);
                    prop_assert_eq!(outcome.is_appended(), fresh);
                },
                None => prop_assert!(!outcome.is_appended()),
            }
        }

        prop_assert_eq!(log.len(), expected.len());
        prop_assert!(log.messages().iter().all(|message| message.room == ACTIVE));
    }

    /// INVARIANT: replaying the whole stream changes nothing.
    #[test]
    fn prop_replay_is_idempotent(
        deliveries in prop::collection::vec(delivery_strategy(), 0..40),
    ) {
        let mut ingestor = MessageIngestor::new();
        ingestor.focus(1, ACTIVE);
        let mut log = MessageLog::new();

        for delivery in &deliveries {
            ingestor.ingest(&delivery.payload(), &mut log);
        }
        let before = log.messages().to_vec();

        for delivery in &deliveries {
            let outcome = ingestor.ingest(&delivery.payload(), &mut log);
            prop_assert!(!matches!(outcome, IngestOutcome::Appended));
        }

        prop_assert_eq!(log.messages(), before.as_slice());
    }

    /// INVARIANT: an unfocused ingestor accepts nothing.
    #[test]
    fn prop_unfocused_accepts_nothing(
        deliveries in prop::collection::vec(delivery_strategy(), 0..30),
    ) {
        let mut ingestor = MessageIngestor::new();
        let mut log = MessageLog::new();

        for delivery in &deliveries {
            ingestor.ingest(&delivery.payload(), &mut log);
        }

        prop_assert!(log.is_empty());
        prop_assert_eq!(ingestor.stats().appended, 0);
    }
}
