//! Records returned by the command boundary.
//!
//! These mirror the rows the backend keeps in its store. Ids are optional
//! where the backend may hand out a record before it has been persisted.

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Backend user identifier.
pub type UserId = i64;

/// Backend chat room identifier.
pub type RoomId = i64;

/// Backend department identifier.
pub type DepartmentId = i64;

/// A chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Assigned by the backend on first upsert
    pub id: Option<UserId>,
    /// Display name, used as the sender name on the wire
    pub name: String,
    /// Unique key for upserts
    pub email: String,
    /// Department the user belongs to
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    /// Denormalized department name
    #[serde(default)]
    pub department_name: Option<String>,
    /// Presence flag as last reported by the backend
    #[serde(default)]
    pub is_online: bool,
    /// Last presence change, as the backend formats it
    #[serde(default)]
    pub last_seen: Option<String>,
}

/// Organizational unit offered on the join form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// Backend id
    pub id: Option<DepartmentId>,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

/// A chat room listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Backend id; a room without one cannot be entered
    pub id: Option<RoomId>,
    /// Room name, also the routing key for live events
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Owning department, if any
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    /// Denormalized department name
    #[serde(default)]
    pub department_name: Option<String>,
    /// Hidden from users outside the department
    #[serde(default)]
    pub is_private: bool,
    /// Live member count
    #[serde(default)]
    pub user_count: Option<i64>,
}

/// A stored message as returned by `get_room_messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Row id
    #[serde(default)]
    pub id: Option<i64>,
    /// Room the message was posted to
    pub room_id: RoomId,
    /// Sender id
    pub user_id: UserId,
    /// Sender display name
    pub username: String,
    /// Message text
    pub message: String,
    /// Kind as stored; matched case-insensitively
    pub message_type: String,
    /// Text is a single emoji
    #[serde(default)]
    pub is_emoji: bool,
    /// Creation instant
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_row_from_sqlite() {
        let row = r#"{
            "id": 12,
            "room_id": 3,
            "user_id": 7,
            "username": "Jane",
            "message": "morning",
            "message_type": "chat",
            "is_emoji": false,
            "created_at": "2023-11-14 22:13:20"
        }"#;

        let msg: HistoryMessage = serde_json::from_str(row).unwrap();
        assert_eq!(msg.created_at.unix_seconds(), 1_700_000_000);
        assert_eq!(msg.username, "Jane");
    }

    #[test]
    fn room_defaults_missing_flags() {
        let room: ChatRoom = serde_json::from_str(r#"{"id": 1, "name": "IT General"}"#).unwrap();
        assert!(!room.is_private);
        assert_eq!(room.user_count, None);
    }
}
