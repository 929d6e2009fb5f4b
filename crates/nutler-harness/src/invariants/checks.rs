//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// The chat view carries exactly one room and the ingestor is scoped to it.
/// Outside the chat view no room is active and nothing passes the filter.
pub struct ActiveRoomMatchesView;

impl Invariant for ActiveRoomMatchesView {
    fn name(&self) -> &'static str {
        "ActiveRoomMatchesView"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let consistent = match state.view {
            "chat" => state.active_room.is_some() && state.filter_room == state.active_room,
            _ => state.active_room.is_none() && state.filter_room.is_none(),
        };
        if consistent {
            return Ok(());
        }
        Err(Violation {
            invariant: self.name(),
            message: format!(
                "view {} has active room {:?} but filter {:?}",
                state.view, state.active_room, state.filter_room
            ),
        })
    }
}

/// No two log entries share sender, text, room and second.
pub struct LogHasNoDuplicates;

impl Invariant for LogHasNoDuplicates {
    fn name(&self) -> &'static str {
        "LogHasNoDuplicates"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for message in &state.messages {
            if !seen.insert(message) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("duplicate entry {message:?}"),
                });
            }
        }
        Ok(())
    }
}

/// Every logged message belongs to the active room.
pub struct LogScopedToActiveRoom;

impl Invariant for LogScopedToActiveRoom {
    fn name(&self) -> &'static str {
        "LogScopedToActiveRoom"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let stray = state
            .messages
            .iter()
            .find(|message| state.active_room.as_deref() != Some(message.room.as_str()));

        match stray {
            None => Ok(()),
            Some(message) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "message from room {:?} logged while active room is {:?}",
                    message.room, state.active_room
                ),
            }),
        }
    }
}

/// The reconnection counter never exceeds the budget.
pub struct AttemptWithinBudget;

impl Invariant for AttemptWithinBudget {
    fn name(&self) -> &'static str {
        "AttemptWithinBudget"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.attempt <= state.max_attempts {
            return Ok(());
        }
        Err(Violation {
            invariant: self.name(),
            message: format!("attempt {} exceeds budget {}", state.attempt, state.max_attempts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::MessageSnapshot;

    fn message(room: &str) -> MessageSnapshot {
        MessageSnapshot {
            username: "Bob".into(),
            text: "hi".into(),
            room: room.into(),
            created_at: 1_700_000_000,
        }
    }

    fn chat(room: &str) -> SessionSnapshot {
        SessionSnapshot {
            view: "chat",
            active_room: Some(room.into()),
            filter_room: Some(room.into()),
            max_attempts: 5,
            ..SessionSnapshot::empty()
        }
    }

    #[test]
    fn filter_must_follow_active_room() {
        let mut state = chat("IT General");
        assert!(ActiveRoomMatchesView.check(&state).is_ok());

        state.filter_room = Some("Sales Floor".into());
        assert!(ActiveRoomMatchesView.check(&state).is_err());
    }

    #[test]
    fn duplicates_are_detected() {
        let mut state = chat("IT General");
        state.messages = vec![message("IT General"), message("IT General")];
        assert!(LogHasNoDuplicates.check(&state).is_err());
    }

    #[test]
    fn stray_room_is_detected() {
        let mut state = chat("IT General");
        state.messages = vec![message("Sales Floor")];
        assert!(LogScopedToActiveRoom.check(&state).is_err());
    }

    #[test]
    fn attempt_over_budget_is_detected() {
        let mut state = chat("IT General");
        state.attempt = 6;
        assert!(AttemptWithinBudget.check(&state).is_err());
    }
}
