//! Screen state machine.
//!
//! ```text
//!            Joined / Resumed         EnterRoom
//! ┌───────┐ ───────────────> ┌───────┐ ────────> ┌────────────┐
//! │ Login │                  │ Rooms │           │ Chat(room) │
//! └───────┘ <─────────────── └───────┘ <──────── └────────────┘
//!     ^           Leave                  Back          │
//!     └────────────────────────────────────────────────┘
//!                           Leave
//! ```
//!
//! The active room lives inside [`View::Chat`], so "exactly one active room
//! in the chat view and none elsewhere" holds by construction. Entering a
//! view yields the effects the session must run: departments on `Login`,
//! rooms on `Rooms`, history on `Chat`.

use nutler_proto::{ChatRoom, RoomId};
use thiserror::Error;

/// Current screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    /// Join form
    #[default]
    Login,
    /// Room list
    Rooms,
    /// Inside a room
    Chat(ChatRoom),
}

impl View {
    /// Room shown in the chat view.
    pub fn active_room(&self) -> Option<&ChatRoom> {
        match self {
            Self::Chat(room) => Some(room),
            Self::Login | Self::Rooms => None,
        }
    }

    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Rooms => "rooms",
            Self::Chat(_) => "chat",
        }
    }
}

/// Navigation requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewIntent {
    /// Join form completed
    Joined,
    /// Cached session restored
    Resumed,
    /// Open a room
    EnterRoom(ChatRoom),
    /// Back to the room list
    Back,
    /// Return to the join form
    Leave,
}

/// Work to run after entering a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEffect {
    /// Reload departments for the join form
    RefreshDepartments,
    /// Reload the room list
    RefreshRooms,
    /// Load the room's recent messages
    LoadHistory {
        /// Room to load
        room_id: RoomId,
    },
}

/// Rejected navigation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// Intent not allowed from the current view
    #[error("cannot {intent} from the {view} view")]
    InvalidTransition {
        /// View the intent was issued in
        view: &'static str,
        /// Intent that was refused
        intent: &'static str,
    },

    /// Room has no backend id
    #[error("room {name:?} has no id")]
    RoomWithoutId {
        /// Name of the room
        name: String,
    },
}

impl ViewIntent {
    fn name(&self) -> &'static str {
        match self {
            Self::Joined => "join",
            Self::Resumed => "resume",
            Self::EnterRoom(_) => "enter a room",
            Self::Back => "go back",
            Self::Leave => "leave",
        }
    }
}

impl View {
    /// Compute the next view and its entry effects.
    ///
    /// Pure: the caller commits the returned view once the intent's side
    /// effects have succeeded.
    pub fn transition(&self, intent: ViewIntent) -> Result<(View, Vec<ViewEffect>), ViewError> {
        match (self, intent) {
            (Self::Login, ViewIntent::Joined | ViewIntent::Resumed)
            | (Self::Chat(_), ViewIntent::Back) => {
                Ok((Self::Rooms, vec![ViewEffect::RefreshRooms]))
            },
            (Self::Rooms, ViewIntent::EnterRoom(room)) => {
                let room_id =
                    room.id.ok_or_else(|| ViewError::RoomWithoutId { name: room.name.clone() })?;
                Ok((Self::Chat(room), vec![ViewEffect::LoadHistory { room_id }]))
            },
            (Self::Rooms | Self::Chat(_), ViewIntent::Leave) => {
                Ok((Self::Login, vec![ViewEffect::RefreshDepartments]))
            },
            (view, intent) => {
                Err(ViewError::InvalidTransition { view: view.name(), intent: intent.name() })
            },
        }
    }
}
