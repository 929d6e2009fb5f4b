//! Observable session state for invariant checking.
//!
//! Invariants operate on snapshots rather than the live controller so a
//! check sees one consistent moment.

use nutler_app::{Backend, SessionController, SessionStore};

/// One message as the invariants see it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageSnapshot {
    /// Sender display name
    pub username: String,
    /// Message text
    pub text: String,
    /// Room name
    pub room: String,
    /// Normalized creation instant, unix seconds
    pub created_at: i64,
}

/// Snapshot of a session's observable state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Current view name (`login`, `rooms` or `chat`)
    pub view: &'static str,
    /// Room carried by the chat view
    pub active_room: Option<String>,
    /// Room the ingestor is scoped to
    pub filter_room: Option<String>,
    /// Message log contents, in order
    pub messages: Vec<MessageSnapshot>,
    /// Current reconnection attempt
    pub attempt: u32,
    /// Reconnection budget
    pub max_attempts: u32,
}

impl SessionSnapshot {
    /// Snapshot of a fresh session on the login view.
    pub fn empty() -> Self {
        Self { view: "login", ..Self::default() }
    }

    /// Capture a controller's state.
    pub fn from_session<B: Backend, S: SessionStore>(session: &SessionController<B, S>) -> Self {
        let messages = session
            .log()
            .messages()
            .iter()
            .map(|message| MessageSnapshot {
                username: message.username.clone(),
                text: message.text.clone(),
                room: message.room.clone(),
                created_at: message.created_at.unix_seconds(),
            })
            .collect();

        Self {
            view: session.view().name(),
            active_room: session.active_room().map(|room| room.name.clone()),
            filter_room: session.ingestor().active_room().map(str::to_string),
            messages,
            attempt: session.reconnect_attempt(),
            max_attempts: session.config().backoff.max_attempts,
        }
    }
}
