//! Session configuration.

use nutler_core::BackoffPolicy;
use nutler_proto::RoomId;

/// Port the chat server listens on when hosting.
pub const DEFAULT_PORT: u16 = 3625;

/// Messages loaded when entering a room.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Room the link is opened against before any room is entered.
pub const DEFAULT_LOBBY_ROOM: &str = "Company Wide";

/// Id of [`DEFAULT_LOBBY_ROOM`].
pub const DEFAULT_LOBBY_ROOM_ID: RoomId = 1;

/// How this client reaches a chat server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Start a server on this machine and connect to it
    Host {
        /// Listen port
        port: u16,
    },
    /// Connect to a server somebody else runs
    Join {
        /// `host:port` of the server
        address: String,
    },
}

impl Default for Mode {
    fn default() -> Self {
        Self::Host { port: DEFAULT_PORT }
    }
}

impl Mode {
    /// Address the client link dials in this mode.
    pub fn dial_address(&self) -> String {
        match self {
            Self::Host { port } => format!("127.0.0.1:{port}"),
            Self::Join { address } => address.clone(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages loaded when entering a room
    pub history_limit: usize,
    /// Room the link is opened against after joining
    pub lobby_room: String,
    /// Id of the lobby room
    pub lobby_room_id: RoomId,
    /// Reconnection schedule
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            lobby_room: DEFAULT_LOBBY_ROOM.to_string(),
            lobby_room_id: DEFAULT_LOBBY_ROOM_ID,
            backoff: BackoffPolicy::default(),
        }
    }
}
