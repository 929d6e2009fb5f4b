//! Connection lifecycle state machine.
//!
//! Tracks the single link between the client and the chat server: the
//! initial connect, loss detection, bounded reconnection and teardown. Uses
//! the action pattern: [`ConnectionManager::handle`] takes an event and
//! returns the actions the runtime must perform (dial, arm or disarm the
//! retry timer). The manager itself never touches I/O or time.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ Connect ┌────────────┐ Succeeded ┌───────────┐
//! │ Idle │────────>│ Connecting │──────────>│ Connected │<──────────┐
//! └──────┘         └────────────┘           └───────────┘           │
//!    ^                   │ Failed                 │ Lost            │ Succeeded
//!    │ Cancel            ↓                        ↓                 │
//!    │            ┌──────────────┐  Failed  ┌──────────────────┐    │
//!    └────────────│ Disconnected │<─────────│ Reconnecting{n}  │────┘
//!                 └──────────────┘ (n > 5)  └──────────────────┘
//!                                             │ Failed (n <= 5) ^
//!                                             └─────────────────┘
//! ```
//!
//! At most one dial is outstanding at a time. `Connect` while a dial is in
//! flight is rejected; `Connect` while a retry timer is armed disarms it
//! first.

use nutler_proto::{RoomId, UserId};

use crate::{backoff::BackoffPolicy, error::ConnectionError};

/// Everything the backend needs to open the link.
///
/// Resolved by the caller at the moment a dial is issued, so a retry always
/// uses the current user, room and server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// `host:port` of the chat server
    pub address: String,
    /// Sender name announced on connect
    pub username: String,
    /// Sender id announced on connect
    pub user_id: UserId,
    /// Room the link is opened against
    pub room_name: String,
    /// Id of that room
    pub room_id: RoomId,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link and nothing scheduled
    Idle,
    /// Initial dial in flight
    Connecting,
    /// Link established
    Connected,
    /// Link lost; `attempt` is the retry being waited on or dialed
    Reconnecting {
        /// 1-based retry number
        attempt: u32,
        /// The retry dial has been issued and not yet resolved
        in_flight: bool,
    },
    /// Gave up; waits for a manual reconnect or a room change
    Disconnected,
}

/// Inputs to the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Open the link (initial connect, manual reconnect or room change)
    Connect(ConnectTarget),
    /// The outstanding dial succeeded
    Succeeded,
    /// The outstanding dial failed
    Failed {
        /// Backend failure description
        reason: String,
    },
    /// The backend reported the established link dropped
    Lost,
    /// The retry timer fired; the target is resolved at fire time
    RetryDue(ConnectTarget),
    /// Teardown: stop everything and return to idle
    Cancel,
}

/// Actions returned by the connection state machine.
///
/// The runtime executes these:
/// - `Connect`: issue `client_connect` and feed back `Succeeded`/`Failed`
/// - `ScheduleRetry`: arm the single retry timer
/// - `CancelRetry`: disarm it
/// - `Exhausted`: surface the terminal disconnected status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Dial this target
    Connect(ConnectTarget),
    /// Arm the retry timer
    ScheduleRetry {
        /// Retry number the timer is for
        attempt: u32,
        /// Delay until it fires
        delay: std::time::Duration,
    },
    /// Disarm the retry timer
    CancelRetry,
    /// Reconnection budget spent
    Exhausted {
        /// Retries made before giving up
        attempts: u32,
    },
}

/// Connection lifecycle manager.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    policy: BackoffPolicy,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl ConnectionManager {
    /// Create a manager in [`ConnectionState::Idle`].
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { state: ConnectionState::Idle, policy }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Backoff policy in use.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Current retry number, 0 outside of reconnection.
    pub fn attempt(&self) -> u32 {
        match self.state {
            ConnectionState::Reconnecting { attempt, .. } => attempt,
            _ => 0,
        }
    }

    /// Whether the link is up.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether a dial is outstanding.
    pub fn is_dialing(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Reconnecting { in_flight: true, .. }
        )
    }

    /// Process an event.
    pub fn handle(
        &mut self,
        event: ConnectionEvent,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match event {
            ConnectionEvent::Connect(target) => self.handle_connect(target),
            ConnectionEvent::Succeeded => self.handle_succeeded(),
            ConnectionEvent::Failed { reason } => self.handle_failed(&reason),
            ConnectionEvent::Lost => Ok(self.handle_lost()),
            ConnectionEvent::RetryDue(target) => Ok(self.handle_retry_due(target)),
            ConnectionEvent::Cancel => Ok(self.handle_cancel()),
        }
    }

    fn handle_connect(
        &mut self,
        target: ConnectTarget,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.is_dialing() {
            return Err(ConnectionError::ConnectInFlight { state: self.state });
        }

        let mut actions = Vec::with_capacity(2);
        if matches!(self.state, ConnectionState::Reconnecting { in_flight: false, .. }) {
            actions.push(ConnectionAction::CancelRetry);
        }

        tracing::debug!(address = %target.address, room = %target.room_name, "dialing");
        self.state = ConnectionState::Connecting;
        actions.push(ConnectionAction::Connect(target));
        Ok(actions)
    }

    fn handle_succeeded(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.is_dialing() {
            return Err(self.invalid("complete a dial"));
        }

        if let ConnectionState::Reconnecting { attempt, .. } = self.state {
            tracing::info!(attempt, "reconnected");
        }
        self.state = ConnectionState::Connected;
        Ok(Vec::new())
    }

    fn handle_failed(&mut self, reason: &str) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Connecting => {
                tracing::warn!(%reason, "connect failed");
                self.state = ConnectionState::Disconnected;
                Ok(Vec::new())
            },
            ConnectionState::Reconnecting { attempt, in_flight: true } => {
                tracing::warn!(attempt, %reason, "reconnect attempt failed");
                Ok(self.schedule(attempt + 1))
            },
            _ => Err(self.invalid("fail a dial")),
        }
    }

    fn handle_lost(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = ?self.state, "ignoring loss signal");
            return Vec::new();
        }

        tracing::warn!("connection lost");
        self.schedule(1)
    }

    fn handle_retry_due(&mut self, target: ConnectTarget) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Reconnecting { attempt, in_flight: false } => {
                tracing::debug!(attempt, address = %target.address, "retrying");
                self.state = ConnectionState::Reconnecting { attempt, in_flight: true };
                vec![ConnectionAction::Connect(target)]
            },
            _ => {
                tracing::debug!(state = ?self.state, "ignoring stale retry");
                Vec::new()
            },
        }
    }

    fn handle_cancel(&mut self) -> Vec<ConnectionAction> {
        let armed = matches!(self.state, ConnectionState::Reconnecting { in_flight: false, .. });
        self.state = ConnectionState::Idle;
        if armed { vec![ConnectionAction::CancelRetry] } else { Vec::new() }
    }

    fn schedule(&mut self, attempt: u32) -> Vec<ConnectionAction> {
        match self.policy.next_delay(attempt) {
            Some(delay) => {
                self.state = ConnectionState::Reconnecting { attempt, in_flight: false };
                vec![ConnectionAction::ScheduleRetry { attempt, delay }]
            },
            None => {
                let attempts = attempt.saturating_sub(1);
                tracing::warn!(attempts, "reconnection budget spent");
                self.state = ConnectionState::Disconnected;
                vec![ConnectionAction::Exhausted { attempts }]
            },
        }
    }

    fn invalid(&self, operation: &str) -> ConnectionError {
        ConnectionError::InvalidState { state: self.state, operation: operation.to_string() }
    }
}
