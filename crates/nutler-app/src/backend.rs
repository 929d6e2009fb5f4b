//! Command and push boundaries.
//!
//! The [`Backend`] trait is everything the session manager knows about the
//! outside world. Commands are request/response calls that either succeed
//! or fail with a [`CommandError`]; push events arrive on a channel handed
//! out by [`Backend::subscribe`]. The transport, the server and the store
//! behind it are somebody else's concern.

use std::{fmt, future::Future};

use nutler_core::ConnectTarget;
use nutler_proto::{
    ChatRoom, Department, DepartmentId, HistoryMessage, PushEvent, RoomId, User, UserId,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Names of the commands on the boundary, for error reporting and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `get_departments`
    GetDepartments,
    /// `get_chat_rooms`
    GetChatRooms,
    /// `get_room_messages`
    GetRoomMessages,
    /// `upsert_user`
    UpsertUser,
    /// `get_user_by_id`
    GetUserById,
    /// `server_listen`
    ServerListen,
    /// `get_server_info`
    GetServerInfo,
    /// `client_connect`
    ClientConnect,
    /// `join_room`
    JoinRoom,
    /// `leave_room`
    LeaveRoom,
    /// `send`
    Send,
}

impl Command {
    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetDepartments => "get_departments",
            Self::GetChatRooms => "get_chat_rooms",
            Self::GetRoomMessages => "get_room_messages",
            Self::UpsertUser => "upsert_user",
            Self::GetUserById => "get_user_by_id",
            Self::ServerListen => "server_listen",
            Self::GetServerInfo => "get_server_info",
            Self::ClientConnect => "client_connect",
            Self::JoinRoom => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::Send => "send",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command the backend refused or could not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{command} failed: {reason}")]
pub struct CommandError {
    /// Command that failed
    pub command: Command,
    /// Backend-provided description
    pub reason: String,
}

impl CommandError {
    /// Create a command error.
    pub fn new(command: Command, reason: impl Into<String>) -> Self {
        Self { command, reason: reason.into() }
    }
}

/// A chat message handed to `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message text
    pub text: String,
    /// Sender id
    pub user_id: UserId,
    /// Target room name
    pub room_name: String,
    /// Target room id
    pub room_id: RoomId,
    /// Text is a single emoji
    pub is_emoji: bool,
}

/// The command and push boundaries.
///
/// # Implementations
///
/// - **Desktop shell**: forwards to the host application's command bridge
/// - **Simulation**: `nutler_harness::SimBackend`, an in-memory fake
pub trait Backend: Send + Sync {
    /// List all departments.
    fn get_departments(&self) -> impl Future<Output = Result<Vec<Department>, CommandError>> + Send;

    /// List all chat rooms.
    fn get_chat_rooms(&self) -> impl Future<Output = Result<Vec<ChatRoom>, CommandError>> + Send;

    /// Most recent `limit` messages of a room, oldest first.
    fn get_room_messages(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, CommandError>> + Send;

    /// Create the user if `email` is unseen, update name and department
    /// otherwise. Returns the stored record with its id.
    fn upsert_user(
        &self,
        name: &str,
        email: &str,
        department_id: DepartmentId,
    ) -> impl Future<Output = Result<User, CommandError>> + Send;

    /// Fetch a user, `None` when the id is unknown.
    fn get_user_by_id(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<User>, CommandError>> + Send;

    /// Start the chat server on this machine.
    fn server_listen(
        &self,
        username: &str,
        user_id: UserId,
        port: u16,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Address the local server is reachable at, `None` when not hosting.
    fn get_server_info(&self) -> impl Future<Output = Result<Option<String>, CommandError>> + Send;

    /// Open the client link.
    fn client_connect(
        &self,
        target: &ConnectTarget,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Record room membership.
    fn join_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Drop room membership.
    fn leave_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Send a chat message. Delivery is confirmed by the server echo.
    fn send(&self, message: &OutgoingMessage)
    -> impl Future<Output = Result<(), CommandError>> + Send;

    /// Open a push subscription.
    ///
    /// The channel closes when the backend goes away. Dropping the receiver
    /// ends the subscription.
    fn subscribe(&self) -> mpsc::Receiver<PushEvent>;
}
