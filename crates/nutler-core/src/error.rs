//! Error types for the connection state machine.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// A dial is already outstanding
    #[error("connect rejected: a connection attempt is already in flight ({state:?})")]
    ConnectInFlight {
        /// State holding the outstanding dial
        state: ConnectionState,
    },
}

impl ConnectionError {
    /// Returns true if retrying the same operation later may succeed.
    ///
    /// An overlapping connect clears once the outstanding dial resolves. An
    /// invalid transition is a caller bug and never clears by itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectInFlight { .. })
    }
}
