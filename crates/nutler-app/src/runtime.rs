//! Event loop for a running session.
//!
//! The [`Runtime`] is the only place that waits. It multiplexes three
//! sources into the [`SessionController`], one at a time and in this
//! priority order:
//!
//! 1. Push events from the backend subscription
//! 2. UI intents from an `mpsc` channel
//! 3. The single reconnection timer
//!
//! Push events already received are ingested under the filter that was
//! active when they arrived, before any queued room change is applied. An
//! event for room B that arrived while room A was active is therefore dropped,
//! never attributed to B after the switch.
//!
//! Processing is strictly sequential: an intent that awaits backend calls
//! holds the loop, and push events queue in their channel until it is done.

use std::future::pending;

use nutler_core::Environment;
use nutler_proto::{ChatRoom, PushEvent};
use tokio::sync::mpsc;

use crate::{
    backend::Backend,
    config::Mode,
    session::{JoinForm, SessionController, TimerCommand},
    store::SessionStore,
};

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Submit the join form
    Join(JoinForm),
    /// Open a room
    EnterRoom(ChatRoom),
    /// Back to the room list
    Back,
    /// Return to the join form
    Leave,
    /// Send a chat message
    Send {
        /// Message text
        text: String,
        /// Text is a single emoji
        is_emoji: bool,
    },
    /// Reopen the link now
    Reconnect,
    /// Reload the room list
    RefreshRooms,
    /// Reload departments
    RefreshDepartments,
    /// Switch host/join mode
    SetMode(Mode),
    /// Stop the loop
    Shutdown,
}

/// The armed reconnection timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRetry<I> {
    /// Retry the timer is for
    pub attempt: u32,
    /// When it fires
    pub due: I,
}

enum Wake {
    Intent(Option<Intent>),
    Push(Option<PushEvent>),
    RetryDue,
}

/// Session event loop.
///
/// # Type Parameters
///
/// - `B`: Command and push boundary
/// - `S`: Persistence port
/// - `E`: Time source
pub struct Runtime<B, S, E>
where
    E: Environment,
{
    session: SessionController<B, S>,
    env: E,
    intents: mpsc::Receiver<Intent>,
    subscription: Option<mpsc::Receiver<PushEvent>>,
    retry: Option<PendingRetry<E::Instant>>,
}

impl<B, S, E> Runtime<B, S, E>
where
    B: Backend,
    S: SessionStore,
    E: Environment,
{
    /// Create a runtime and open the push subscription.
    pub fn new(session: SessionController<B, S>, env: E, intents: mpsc::Receiver<Intent>) -> Self {
        let subscription = Some(session.backend().subscribe());
        Self { session, env, intents, subscription, retry: None }
    }

    /// Run until a [`Intent::Shutdown`] arrives or every intent sender is
    /// dropped.
    ///
    /// Resumes the cached session first. Returns the controller after
    /// teardown so callers can inspect the final state.
    pub async fn run(mut self) -> SessionController<B, S> {
        self.start().await;
        while self.step().await {}
        self.teardown()
    }

    /// Resume the cached session, if any.
    pub async fn start(&mut self) {
        match self.session.resume().await {
            Ok(outcome) => tracing::info!(?outcome, "startup"),
            Err(err) => tracing::warn!(error = %err, "resume failed"),
        }
        self.apply_timer_commands();
    }

    /// Wait for and process one input.
    ///
    /// Returns `false` when the loop should stop.
    pub async fn step(&mut self) -> bool {
        let due = self.retry.map(|retry| retry.due);
        let wake = tokio::select! {
            biased;

            event = next_event(&mut self.subscription) => Wake::Push(event),
            intent = self.intents.recv() => Wake::Intent(intent),
            () = wait_until(&self.env, due) => Wake::RetryDue,
        };

        let keep_running = match wake {
            Wake::Intent(None | Some(Intent::Shutdown)) => false,
            Wake::Intent(Some(intent)) => {
                self.dispatch(intent).await;
                true
            },
            Wake::Push(Some(event)) => {
                if let Some(outcome) = self.session.handle_push(event).await {
                    tracing::trace!(?outcome, "push event ingested");
                }
                true
            },
            Wake::Push(None) => {
                tracing::warn!("push subscription closed by backend");
                self.subscription = None;
                true
            },
            Wake::RetryDue => {
                if let Some(retry) = self.retry.take() {
                    tracing::debug!(attempt = retry.attempt, "retry timer fired");
                }
                self.session.retry_due().await;
                true
            },
        };

        self.apply_timer_commands();
        keep_running
    }

    async fn dispatch(&mut self, intent: Intent) {
        let result = match intent {
            Intent::Join(form) => self.session.join(form).await,
            Intent::EnterRoom(room) => self.session.enter_room(room).await,
            Intent::Back => self.session.back_to_rooms().await,
            Intent::Leave => self.session.leave().await,
            Intent::Send { text, is_emoji } => self.session.send_message(&text, is_emoji).await,
            Intent::Reconnect => self.session.reconnect().await,
            Intent::RefreshRooms => self.session.refresh_rooms().await,
            Intent::RefreshDepartments => self.session.refresh_departments().await,
            Intent::SetMode(mode) => {
                self.session.set_mode(mode);
                Ok(())
            },
            Intent::Shutdown => Ok(()),
        };

        if let Err(err) = result {
            tracing::debug!(error = %err, "intent failed");
        }
    }

    fn apply_timer_commands(&mut self) {
        for command in self.session.take_timer_commands() {
            match command {
                TimerCommand::Schedule { attempt, delay } => {
                    let due = self.env.now() + delay;
                    self.retry = Some(PendingRetry { attempt, due });
                },
                TimerCommand::Cancel => self.retry = None,
            }
        }
    }

    /// Stop reconnecting, drop the subscription and the timer, and hand the
    /// controller back.
    pub fn teardown(mut self) -> SessionController<B, S> {
        self.session.shutdown();
        self.retry = None;
        self.subscription = None;
        self.intents.close();
        self.session
    }

    /// The armed reconnection timer.
    pub fn pending_retry(&self) -> Option<PendingRetry<E::Instant>> {
        self.retry
    }

    /// Whether the push subscription is still open.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// The controller.
    pub fn session(&self) -> &SessionController<B, S> {
        &self.session
    }
}

async fn next_event(subscription: &mut Option<mpsc::Receiver<PushEvent>>) -> Option<PushEvent> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn wait_until<E: Environment>(env: &E, due: Option<E::Instant>) {
    let Some(due) = due else {
        return pending().await;
    };
    let now = env.now();
    if due > now {
        env.sleep(due - now).await;
    }
}
