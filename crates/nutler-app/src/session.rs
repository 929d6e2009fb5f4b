//! Session orchestration.
//!
//! [`SessionController`] owns everything a running client knows: the signed
//! in user, the host/join mode, the current [`View`], the room catalog, the
//! message log and the connection state machine. UI intents come in as
//! method calls, push events through [`SessionController::handle_push`].
//!
//! # Commit discipline
//!
//! Every operation validates first, then performs its backend calls, and
//! only commits state once those calls succeed. A failed join leaves the
//! view on `Login` with no user; a failed room join leaves the room list
//! untouched. Failures are logged and mirrored into the status message.
//!
//! # Timers
//!
//! The controller never sleeps. When the connection state machine wants a
//! retry armed or disarmed it queues a [`TimerCommand`]; the runtime drains
//! them with [`SessionController::take_timer_commands`] and calls
//! [`SessionController::retry_due`] when the timer fires.

use std::{collections::VecDeque, time::Duration};

use nutler_core::{
    ConnectTarget, ConnectionAction, ConnectionEvent, ConnectionManager, ConnectionState,
};
use nutler_proto::{ChatRoom, DepartmentId, PushEvent, RoomId, User, UserId};

use crate::{
    backend::{Backend, OutgoingMessage},
    catalog::RoomCatalog,
    config::{Mode, SessionConfig},
    error::{SessionError, ValidationError},
    ingest::{IngestOutcome, MessageIngestor},
    log::{ChatMessage, MessageLog},
    store::SessionStore,
    view::{View, ViewEffect, ViewError, ViewIntent},
};

/// Join form contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinForm {
    /// Display name
    pub name: String,
    /// Email, the user's unique key
    pub email: String,
    /// Selected department
    pub department_id: Option<DepartmentId>,
}

impl JoinForm {
    /// Create a filled-in form.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        department_id: DepartmentId,
    ) -> Self {
        Self { name: name.into(), email: email.into(), department_id: Some(department_id) }
    }

    fn validate(&self) -> Result<(&str, &str, DepartmentId), ValidationError> {
        let name = self.name.trim();
        let email = self.email.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if email.is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        let department_id =
            self.department_id.ok_or(ValidationError::MissingField("department"))?;
        Ok((name, email, department_id))
    }
}

/// Retry timer instruction for the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Arm the timer, replacing any armed one
    Schedule {
        /// Retry the timer is for
        attempt: u32,
        /// Delay until it fires
        delay: Duration,
    },
    /// Disarm the timer
    Cancel,
}

/// Result of [`SessionController::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Cached user restored, view is `Rooms`
    Resumed {
        /// Restored user
        user_id: UserId,
    },
    /// Nothing cached, view stays `Login`
    NoSession,
    /// Cached id was unusable and has been cleared, view stays `Login`
    Stale,
}

/// The session orchestrator.
pub struct SessionController<B, S> {
    backend: B,
    store: S,
    config: SessionConfig,
    mode: Mode,
    view: View,
    user: Option<User>,
    catalog: RoomCatalog,
    log: MessageLog,
    ingestor: MessageIngestor,
    connection: ConnectionManager,
    /// `server_listen` succeeded at some point
    hosting: bool,
    /// Address reported by `get_server_info`
    server_address: Option<String>,
    timer_commands: Vec<TimerCommand>,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
}

impl<B: Backend, S: SessionStore> SessionController<B, S> {
    /// Create a controller on the `Login` view in host mode.
    pub fn new(backend: B, store: S, config: SessionConfig) -> Self {
        let connection = ConnectionManager::new(config.backoff);
        Self {
            backend,
            store,
            config,
            mode: Mode::default(),
            view: View::Login,
            user: None,
            catalog: RoomCatalog::new(),
            log: MessageLog::new(),
            ingestor: MessageIngestor::new(),
            connection,
            hosting: false,
            server_address: None,
            timer_commands: Vec::new(),
            status_message: None,
        }
    }

    /// Sign in and open the link.
    ///
    /// Upserts the user, starts the local server in host mode, and connects
    /// to the lobby room. Only when all of that succeeded is the user kept,
    /// the id cached and the view moved to `Rooms`.
    pub async fn join(&mut self, form: JoinForm) -> Result<(), SessionError> {
        let (name, email, department_id) = match form.validate() {
            Ok(fields) => fields,
            Err(err) => return Err(self.report(err.into())),
        };
        let (next, effects) = match self.view.transition(ViewIntent::Joined) {
            Ok(transition) => transition,
            Err(err) => return Err(self.report(err.into())),
        };

        let (user, user_id) = match self.establish(name, email, department_id).await {
            Ok(established) => established,
            Err(err) => return Err(self.report(err)),
        };

        tracing::info!(user_id, name = %user.name, "joined");
        if let Err(err) = self.store.save_session_id(user_id) {
            tracing::warn!(error = %err, "failed to cache session id");
        }
        self.user = Some(user);
        self.view = next;
        self.status_message = None;
        self.run_effects(effects).await;
        Ok(())
    }

    async fn establish(
        &mut self,
        name: &str,
        email: &str,
        department_id: DepartmentId,
    ) -> Result<(User, UserId), SessionError> {
        let user = self.backend.upsert_user(name, email, department_id).await?;
        let user_id = user.id.ok_or(SessionError::MissingUserId)?;

        let address = self.prepare_server(&user.name, user_id).await?;
        let target = ConnectTarget {
            address,
            username: user.name.clone(),
            user_id,
            room_name: self.config.lobby_room.clone(),
            room_id: self.config.lobby_room_id,
        };
        self.dial(target).await?;
        Ok((user, user_id))
    }

    /// Start the local server when hosting; returns the address to dial.
    async fn prepare_server(
        &mut self,
        username: &str,
        user_id: UserId,
    ) -> Result<String, SessionError> {
        let port = match &self.mode {
            Mode::Host { port } => *port,
            Mode::Join { address } => return Ok(address.clone()),
        };

        if !self.hosting {
            self.backend.server_listen(username, user_id, port).await?;
            self.hosting = true;
            tracing::info!(port, "server listening");
        }

        let advertised = self.backend.get_server_info().await?;
        self.server_address = Some(advertised.ok_or(SessionError::NoServerAddress)?);
        Ok(self.mode.dial_address())
    }

    /// Open a room from the room list.
    ///
    /// Issues `join_room` first; on success the ingestor is scoped to the
    /// room, the log is emptied and the recent history loaded into it. If
    /// the link is down (after a resume or an exhausted reconnection) it is
    /// reopened against the new room.
    pub async fn enter_room(&mut self, room: ChatRoom) -> Result<(), SessionError> {
        let Some(user_id) = self.user_id() else {
            return Err(self.report(SessionError::NoUser));
        };
        let Some(room_id) = room.id else {
            return Err(self.report(ViewError::RoomWithoutId { name: room.name }.into()));
        };
        let room_name = room.name.clone();
        let (next, effects) = match self.view.transition(ViewIntent::EnterRoom(room)) {
            Ok(transition) => transition,
            Err(err) => return Err(self.report(err.into())),
        };

        let joined = self.backend.join_room(user_id, room_id).await;
        if let Err(err) = joined {
            return Err(self.report(err.into()));
        }

        tracing::info!(room_id, room = %room_name, "entered room");
        self.ingestor.focus(room_id, room_name);
        self.log.clear();
        self.view = next;
        self.status_message = None;

        if matches!(self.connection.state(), ConnectionState::Idle | ConnectionState::Disconnected)
        {
            if let Err(err) = self.restore_link().await {
                self.report(err);
            }
        }

        self.run_effects(effects).await;
        Ok(())
    }

    /// Leave the active room for the room list.
    pub async fn back_to_rooms(&mut self) -> Result<(), SessionError> {
        let (next, effects) = match self.view.transition(ViewIntent::Back) {
            Ok(transition) => transition,
            Err(err) => return Err(self.report(err.into())),
        };

        self.leave_active_room().await;
        self.ingestor.unfocus();
        self.log.clear();
        self.view = next;
        self.run_effects(effects).await;
        Ok(())
    }

    /// Return to the join form.
    ///
    /// Cancels any pending reconnection. The cached id is kept so the next
    /// start resumes.
    pub async fn leave(&mut self) -> Result<(), SessionError> {
        let (next, effects) = match self.view.transition(ViewIntent::Leave) {
            Ok(transition) => transition,
            Err(err) => return Err(self.report(err.into())),
        };

        self.leave_active_room().await;
        self.ingestor.unfocus();
        self.log.clear();
        self.cancel_connection();
        self.user = None;
        self.view = next;
        self.status_message = None;
        tracing::info!("left session");
        self.run_effects(effects).await;
        Ok(())
    }

    async fn leave_active_room(&mut self) {
        let (Some(user_id), Some(room_id)) = (self.user_id(), self.ingestor.active_room_id()) else {
            return;
        };
        let left = self.backend.leave_room(user_id, room_id).await;
        if let Err(err) = left {
            tracing::warn!(error = %err, room_id, "leave_room failed, continuing");
        }
    }

    /// Restore the cached session, if any.
    ///
    /// A cached id that cannot be read or no longer resolves to a user is
    /// cleared and the view stays on `Login`.
    pub async fn resume(&mut self) -> Result<ResumeOutcome, SessionError> {
        let (next, effects) = self.view.transition(ViewIntent::Resumed)?;

        let outcome = match self.store.load_session_id() {
            Ok(None) => ResumeOutcome::NoSession,
            Ok(Some(user_id)) => self.restore_user(user_id).await,
            Err(err) => {
                tracing::warn!(error = %err, "unreadable session id");
                ResumeOutcome::Stale
            },
        };

        match outcome {
            ResumeOutcome::Resumed { user_id } => {
                tracing::info!(user_id, "session resumed");
                self.view = next;
                self.run_effects(effects).await;
            },
            ResumeOutcome::Stale => {
                self.forget_session();
                self.run_effects(vec![ViewEffect::RefreshDepartments]).await;
            },
            ResumeOutcome::NoSession => {
                self.run_effects(vec![ViewEffect::RefreshDepartments]).await;
            },
        }
        Ok(outcome)
    }

    async fn restore_user(&mut self, user_id: UserId) -> ResumeOutcome {
        match self.backend.get_user_by_id(user_id).await {
            Ok(Some(user)) => {
                self.user = Some(user);
                ResumeOutcome::Resumed { user_id }
            },
            Ok(None) => {
                tracing::warn!(user_id, "cached user no longer exists");
                ResumeOutcome::Stale
            },
            Err(err) => {
                tracing::warn!(error = %err, user_id, "failed to fetch cached user");
                ResumeOutcome::Stale
            },
        }
    }

    fn forget_session(&mut self) {
        if let Err(err) = self.store.clear_session_id() {
            tracing::warn!(error = %err, "failed to clear cached session id");
        }
    }

    /// Send a chat message to the active room.
    ///
    /// Nothing is added to the log here. The message shows up when the
    /// server echoes it back.
    pub async fn send_message(&mut self, text: &str, is_emoji: bool) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(self.report(ValidationError::EmptyMessage.into()));
        }
        let Some(user_id) = self.user_id() else {
            return Err(self.report(SessionError::NoUser));
        };
        let Some((room_name, room_id)) =
            self.view.active_room().and_then(|room| Some((room.name.clone(), room.id?)))
        else {
            return Err(self.report(SessionError::NoActiveRoom));
        };

        let message =
            OutgoingMessage { text: text.to_string(), user_id, room_name, room_id, is_emoji };
        let sent = self.backend.send(&message).await;
        sent.map_err(|err| self.report(err.into()))
    }

    /// Manually reopen the link with the current user, room and address.
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        match self.restore_link().await {
            Ok(()) => {
                self.status_message = None;
                Ok(())
            },
            Err(err) => Err(self.report(err)),
        }
    }

    async fn restore_link(&mut self) -> Result<(), SessionError> {
        let user = self.user.as_ref().ok_or(SessionError::NoUser)?;
        let (username, user_id) = (user.name.clone(), user.id.ok_or(SessionError::MissingUserId)?);
        let address = self.prepare_server(&username, user_id).await?;
        let target = self.target(address).ok_or(SessionError::NoUser)?;
        self.dial(target).await
    }

    /// The retry timer fired.
    ///
    /// The target is resolved now, so the attempt uses whatever user, room
    /// and address are current.
    pub async fn retry_due(&mut self) {
        let Some(target) = self.target(self.mode.dial_address()) else {
            tracing::debug!("retry fired without a user, cancelling");
            self.cancel_connection();
            return;
        };

        let actions = match self.connection.handle(ConnectionEvent::RetryDue(target)) {
            Ok(actions) => actions,
            Err(err) => {
                tracing::warn!(error = %err, "retry refused");
                return;
            },
        };
        if let Err(err) = self.run_connection(actions).await {
            tracing::debug!(error = %err, "retry attempt failed");
        }
    }

    /// Apply one push event.
    ///
    /// Returns the ingest outcome for `message` events.
    pub async fn handle_push(&mut self, event: PushEvent) -> Option<IngestOutcome> {
        match event {
            PushEvent::Message(payload) => Some(self.ingestor.ingest(&payload, &mut self.log)),
            PushEvent::ConnectionLost => {
                match self.connection.handle(ConnectionEvent::Lost) {
                    Ok(actions) => {
                        if let Err(err) = self.run_connection(actions).await {
                            tracing::debug!(error = %err, "loss handling failed");
                        }
                    },
                    Err(err) => tracing::warn!(error = %err, "loss signal refused"),
                }
                None
            },
        }
    }

    /// Switch between hosting and joining. Applies to the next dial.
    pub fn set_mode(&mut self, mode: Mode) {
        tracing::debug!(?mode, "mode changed");
        self.mode = mode;
    }

    /// Reload the room list.
    pub async fn refresh_rooms(&mut self) -> Result<(), SessionError> {
        self.catalog.refresh_rooms(&self.backend).await.map_err(Into::into)
    }

    /// Reload departments.
    pub async fn refresh_departments(&mut self) -> Result<(), SessionError> {
        self.catalog.refresh_departments(&self.backend).await.map_err(Into::into)
    }

    /// Drain queued timer instructions, oldest first.
    pub fn take_timer_commands(&mut self) -> Vec<TimerCommand> {
        std::mem::take(&mut self.timer_commands)
    }

    /// Teardown: stop reconnecting and drop the room scope.
    pub fn shutdown(&mut self) {
        self.cancel_connection();
        self.ingestor.unfocus();
        tracing::debug!("session shut down");
    }

    fn cancel_connection(&mut self) {
        match self.connection.handle(ConnectionEvent::Cancel) {
            Ok(actions) => {
                for action in actions {
                    if action == ConnectionAction::CancelRetry {
                        self.timer_commands.push(TimerCommand::Cancel);
                    }
                }
            },
            Err(err) => tracing::warn!(error = %err, "cancel refused"),
        }
    }

    /// Target for a dial right now. Active room when in a room, lobby
    /// otherwise.
    fn target(&self, address: String) -> Option<ConnectTarget> {
        let user = self.user.as_ref()?;
        let (room_name, room_id) = match self.view.active_room() {
            Some(ChatRoom { name, id: Some(id), .. }) => (name.clone(), *id),
            _ => (self.config.lobby_room.clone(), self.config.lobby_room_id),
        };
        Some(ConnectTarget {
            address,
            username: user.name.clone(),
            user_id: user.id?,
            room_name,
            room_id,
        })
    }

    async fn dial(&mut self, target: ConnectTarget) -> Result<(), SessionError> {
        let actions = self.connection.handle(ConnectionEvent::Connect(target))?;
        self.run_connection(actions).await
    }

    /// Execute connection actions until the state machine settles.
    ///
    /// Returns the first dial failure, after the state machine has seen it.
    async fn run_connection(
        &mut self,
        actions: Vec<ConnectionAction>,
    ) -> Result<(), SessionError> {
        let mut pending: VecDeque<ConnectionAction> = actions.into();
        let mut outcome = Ok(());

        while let Some(action) = pending.pop_front() {
            match action {
                ConnectionAction::Connect(target) => {
                    let dialed = self.backend.client_connect(&target).await;
                    let event = match dialed {
                        Ok(()) => {
                            tracing::info!(
                                address = %target.address,
                                room = %target.room_name,
                                "connected"
                            );
                            self.status_message = None;
                            ConnectionEvent::Succeeded
                        },
                        Err(err) => {
                            let reason = err.reason.clone();
                            if outcome.is_ok() {
                                outcome = Err(SessionError::from(err));
                            }
                            ConnectionEvent::Failed { reason }
                        },
                    };
                    pending.extend(self.connection.handle(event)?);
                },
                ConnectionAction::ScheduleRetry { attempt, delay } => {
                    self.status_message = Some(format!(
                        "Connection lost, retrying in {}s (attempt {attempt}/{})",
                        delay.as_secs(),
                        self.config.backoff.max_attempts
                    ));
                    self.timer_commands.push(TimerCommand::Schedule { attempt, delay });
                },
                ConnectionAction::CancelRetry => {
                    self.timer_commands.push(TimerCommand::Cancel);
                },
                ConnectionAction::Exhausted { attempts } => {
                    self.status_message =
                        Some(format!("Disconnected after {attempts} reconnection attempts"));
                },
            }
        }

        outcome
    }

    fn report(&mut self, err: SessionError) -> SessionError {
        tracing::warn!(error = %err, view = self.view.name(), "operation failed");
        self.status_message = Some(format!("Error: {err}"));
        err
    }

    async fn run_effects(&mut self, effects: Vec<ViewEffect>) {
        for effect in effects {
            match effect {
                ViewEffect::RefreshDepartments => {
                    let _ = self.catalog.refresh_departments(&self.backend).await;
                },
                ViewEffect::RefreshRooms => {
                    let _ = self.catalog.refresh_rooms(&self.backend).await;
                },
                ViewEffect::LoadHistory { room_id } => self.load_history(room_id).await,
            }
        }
    }

    async fn load_history(&mut self, room_id: RoomId) {
        let Some(room_name) = self.view.active_room().map(|room| room.name.clone()) else {
            return;
        };

        let rows = match self.backend.get_room_messages(room_id, self.config.history_limit).await {
            Ok(rows) => rows,
            Err(err) => {
                self.report(err.into());
                return;
            },
        };

        let messages = rows.into_iter().filter_map(|row| {
            ChatMessage::from_history(row, &room_name)
                .inspect_err(|err| tracing::warn!(error = %err, "dropping history row"))
                .ok()
        });
        let kept = self.log.replace(messages);
        tracing::debug!(room_id, kept, "history loaded");
    }

    /// Current view.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Signed-in user.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().and_then(|user| user.id)
    }

    /// Room shown in the chat view.
    pub fn active_room(&self) -> Option<&ChatRoom> {
        self.view.active_room()
    }

    /// Host or join mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Whether this client started the local server.
    pub fn is_hosting(&self) -> bool {
        self.hosting
    }

    /// Address the local server advertised.
    pub fn server_address(&self) -> Option<&str> {
        self.server_address.as_deref()
    }

    /// Departments and rooms.
    pub fn catalog(&self) -> &RoomCatalog {
        &self.catalog
    }

    /// Messages of the active room.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Inbound filter.
    pub fn ingestor(&self) -> &MessageIngestor {
        &self.ingestor
    }

    /// Link state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Current reconnection attempt, 0 outside of reconnection.
    pub fn reconnect_attempt(&self) -> u32 {
        self.connection.attempt()
    }

    /// Last status line for the UI.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Persistence port.
    pub fn store(&self) -> &S {
        &self.store
    }
}
