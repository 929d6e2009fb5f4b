//! In-memory backend implementing the command and push boundaries.
//!
//! `SimBackend` behaves like the real backend as far as the session manager
//! can tell: users are upserted by email, rooms and departments come from a
//! seeded catalog, history is newest-bounded and returned oldest first, and
//! `send` is confirmed by an echo on the push channel. Tests script failures
//! per command and inject push events directly.
//!
//! Clones share state, so a test keeps one handle while the controller owns
//! another.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use nutler_app::{Backend, Command, CommandError, OutgoingMessage};
use nutler_core::ConnectTarget;
use nutler_proto::{
    ChatRoom, Department, DepartmentId, HistoryMessage, PushEvent, RoomId, User, UserId,
};
use tokio::sync::mpsc;

/// Capacity of each push subscription channel.
const PUSH_CAPACITY: usize = 256;

/// Address `get_server_info` reports while listening.
const ADVERTISED_HOST: &str = "192.168.1.10";

/// Unix seconds stamped on the first echoed message.
const START_SECS: i64 = 1_700_000_000;

#[derive(Debug)]
struct SimState {
    departments: Vec<Department>,
    rooms: Vec<ChatRoom>,
    users: Vec<User>,
    next_user_id: UserId,
    history: HashMap<RoomId, Vec<HistoryMessage>>,
    memberships: HashSet<(UserId, RoomId)>,
    listening: Option<u16>,
    failures: HashMap<Command, VecDeque<String>>,
    calls: Vec<Command>,
    connects: Vec<ConnectTarget>,
    sent: Vec<OutgoingMessage>,
    subscribers: Vec<mpsc::Sender<PushEvent>>,
    echo_sends: bool,
    clock_secs: i64,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            departments: Vec::new(),
            rooms: Vec::new(),
            users: Vec::new(),
            next_user_id: 1,
            history: HashMap::new(),
            memberships: HashSet::new(),
            listening: None,
            failures: HashMap::new(),
            calls: Vec::new(),
            connects: Vec::new(),
            sent: Vec::new(),
            subscribers: Vec::new(),
            echo_sends: true,
            clock_secs: START_SECS,
        }
    }
}

impl SimState {
    /// Log the call and pop a scripted failure, if any.
    fn enter(&mut self, command: Command) -> Result<(), CommandError> {
        self.calls.push(command);
        match self.failures.get_mut(&command).and_then(VecDeque::pop_front) {
            Some(reason) => Err(CommandError::new(command, reason)),
            None => Ok(()),
        }
    }

    fn department_name(&self, id: DepartmentId) -> Option<String> {
        self.departments.iter().find(|d| d.id == Some(id)).map(|d| d.name.clone())
    }

    fn broadcast(&mut self, event: &PushEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("push channel full, dropping event");
                true
            },
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

/// In-memory [`Backend`].
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with two departments and three rooms.
    ///
    /// - departments: 1 "IT", 2 "Sales"
    /// - rooms: 1 "Company Wide" (the lobby), 2 "IT General" (IT), 3 "Sales Floor" (Sales)
    pub fn seeded() -> Self {
        let backend = Self::new();
        backend.add_department(1, "IT");
        backend.add_department(2, "Sales");
        backend.add_room(1, "Company Wide", None);
        backend.add_room(2, "IT General", Some(1));
        backend.add_room(3, "Sales Floor", Some(2));
        backend
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a department.
    pub fn add_department(&self, id: DepartmentId, name: &str) {
        self.lock().departments.push(Department {
            id: Some(id),
            name: name.to_string(),
            description: None,
        });
    }

    /// Add a room.
    pub fn add_room(&self, id: RoomId, name: &str, department_id: Option<DepartmentId>) {
        let mut state = self.lock();
        let department_name = department_id.and_then(|id| state.department_name(id));
        state.rooms.push(ChatRoom {
            id: Some(id),
            name: name.to_string(),
            description: None,
            department_id,
            department_name,
            is_private: false,
            user_count: Some(0),
        });
    }

    /// Room record by id.
    pub fn room(&self, id: RoomId) -> Option<ChatRoom> {
        self.lock().rooms.iter().find(|room| room.id == Some(id)).cloned()
    }

    /// Insert a user directly, bypassing `upsert_user`.
    pub fn add_user(&self, user: User) {
        self.lock().users.push(user);
    }

    /// Remove a user, as if deleted by an administrator.
    pub fn remove_user(&self, user_id: UserId) {
        self.lock().users.retain(|user| user.id != Some(user_id));
    }

    /// Id handed to the next newly created user.
    pub fn set_next_user_id(&self, user_id: UserId) {
        self.lock().next_user_id = user_id;
    }

    /// Store a history row.
    pub fn add_history(&self, row: HistoryMessage) {
        self.lock().history.entry(row.room_id).or_default().push(row);
    }

    /// Fail the next call of `command` with `reason`. Calls queue up.
    pub fn fail_next(&self, command: Command, reason: &str) {
        self.lock().failures.entry(command).or_default().push_back(reason.to_string());
    }

    /// Fail the next `count` dials.
    pub fn fail_connects(&self, count: usize) {
        for _ in 0..count {
            self.fail_next(Command::ClientConnect, "connection refused");
        }
    }

    /// Turn the `send` echo on or off.
    pub fn set_echo(&self, enabled: bool) {
        self.lock().echo_sends = enabled;
    }

    /// Commands called so far, in order.
    pub fn calls(&self) -> Vec<Command> {
        self.lock().calls.clone()
    }

    /// Number of calls of `command`.
    pub fn call_count(&self, command: Command) -> usize {
        self.lock().calls.iter().filter(|c| **c == command).count()
    }

    /// Every dial, successful or not.
    pub fn connect_attempts(&self) -> Vec<ConnectTarget> {
        self.lock().connects.clone()
    }

    /// Messages accepted by `send`.
    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.lock().sent.clone()
    }

    /// Port `server_listen` was called with.
    pub fn listening_port(&self) -> Option<u16> {
        self.lock().listening
    }

    /// Whether `user_id` is a member of `room_id`.
    pub fn is_member(&self, user_id: UserId, room_id: RoomId) -> bool {
        self.lock().memberships.contains(&(user_id, room_id))
    }

    /// Open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Deliver a push event to every subscriber.
    pub fn emit(&self, event: PushEvent) {
        self.lock().broadcast(&event);
    }

    /// Deliver a `message` event with a raw payload.
    pub fn emit_raw(&self, payload: impl Into<Vec<u8>>) {
        self.emit(PushEvent::Message(payload.into()));
    }

    /// Deliver a `Chat` record.
    pub fn emit_chat(&self, username: &str, room: &str, text: &str, created_at: i64) {
        let payload = serde_json::json!({
            "message_type": "Chat",
            "username": username,
            "message": text,
            "room": room,
            "created_at": created_at,
            "is_emoji": false,
        });
        self.emit_raw(payload.to_string());
    }

    /// Deliver `connection_lost`.
    pub fn emit_connection_lost(&self) {
        self.emit(PushEvent::ConnectionLost);
    }

    /// Drop every subscription sender, as if the backend went away.
    pub fn close_subscriptions(&self) {
        self.lock().subscribers.clear();
    }
}

impl Backend for SimBackend {
    async fn get_departments(&self) -> Result<Vec<Department>, CommandError> {
        let mut state = self.lock();
        state.enter(Command::GetDepartments)?;
        Ok(state.departments.clone())
    }

    async fn get_chat_rooms(&self) -> Result<Vec<ChatRoom>, CommandError> {
        let mut state = self.lock();
        state.enter(Command::GetChatRooms)?;
        Ok(state.rooms.clone())
    }

    async fn get_room_messages(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, CommandError> {
        let mut state = self.lock();
        state.enter(Command::GetRoomMessages)?;

        let mut rows = state.history.get(&room_id).cloned().unwrap_or_default();
        rows.sort_by_key(|row| row.created_at);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.split_off(skip))
    }

    async fn upsert_user(
        &self,
        name: &str,
        email: &str,
        department_id: DepartmentId,
    ) -> Result<User, CommandError> {
        let mut state = self.lock();
        state.enter(Command::UpsertUser)?;

        let department_name = state.department_name(department_id);
        if let Some(user) = state.users.iter_mut().find(|user| user.email == email) {
            user.name = name.to_string();
            user.department_id = Some(department_id);
            user.department_name = department_name;
            return Ok(user.clone());
        }

        let user = User {
            id: Some(state.next_user_id),
            name: name.to_string(),
            email: email.to_string(),
            department_id: Some(department_id),
            department_name,
            is_online: false,
            last_seen: None,
        };
        state.next_user_id += 1;
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>, CommandError> {
        let mut state = self.lock();
        state.enter(Command::GetUserById)?;
        Ok(state.users.iter().find(|user| user.id == Some(user_id)).cloned())
    }

    async fn server_listen(
        &self,
        _username: &str,
        _user_id: UserId,
        port: u16,
    ) -> Result<(), CommandError> {
        let mut state = self.lock();
        state.enter(Command::ServerListen)?;
        if state.listening.is_some() {
            return Err(CommandError::new(Command::ServerListen, "address already in use"));
        }
        state.listening = Some(port);
        Ok(())
    }

    async fn get_server_info(&self) -> Result<Option<String>, CommandError> {
        let mut state = self.lock();
        state.enter(Command::GetServerInfo)?;
        Ok(state.listening.map(|port| format!("{ADVERTISED_HOST}:{port}")))
    }

    async fn client_connect(&self, target: &ConnectTarget) -> Result<(), CommandError> {
        let mut state = self.lock();
        state.connects.push(target.clone());
        state.enter(Command::ClientConnect)
    }

    async fn join_room(&self, user_id: UserId, room_id: RoomId) -> Result<(), CommandError> {
        let mut state = self.lock();
        state.enter(Command::JoinRoom)?;
        if !state.rooms.iter().any(|room| room.id == Some(room_id)) {
            return Err(CommandError::new(Command::JoinRoom, format!("no room {room_id}")));
        }
        state.memberships.insert((user_id, room_id));
        Ok(())
    }

    async fn leave_room(&self, user_id: UserId, room_id: RoomId) -> Result<(), CommandError> {
        let mut state = self.lock();
        state.enter(Command::LeaveRoom)?;
        state.memberships.remove(&(user_id, room_id));
        Ok(())
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), CommandError> {
        let mut state = self.lock();
        state.enter(Command::Send)?;
        state.sent.push(message.clone());

        if state.echo_sends {
            let username = state
                .users
                .iter()
                .find(|user| user.id == Some(message.user_id))
                .map(|user| user.name.clone())
                .unwrap_or_default();
            let created_at = state.clock_secs;
            state.clock_secs += 1;

            let payload = serde_json::json!({
                "message_type": "Chat",
                "username": username,
                "user_id": message.user_id,
                "message": message.text,
                "room": message.room_name,
                "room_id": message.room_id,
                "created_at": created_at,
                "is_emoji": message.is_emoji,
            });
            state.broadcast(&PushEvent::Message(payload.to_string().into_bytes()));
        }
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<PushEvent> {
        let (tx, rx) = mpsc::channel(PUSH_CAPACITY);
        self.lock().subscribers.push(tx);
        rx
    }
}
