//! Error types for session operations.
//!
//! Every failure a UI intent can hit maps to one [`SessionError`]. None of
//! them leave the session half-updated: validation happens before any call,
//! and state is only committed after the calls it depends on succeed.

use nutler_core::ConnectionError;
use thiserror::Error;

use crate::{backend::CommandError, view::ViewError};

/// Input rejected before any backend call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required form field is blank
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Message text is blank
    #[error("message is empty")]
    EmptyMessage,
}

/// Errors surfaced by [`SessionController`](crate::SessionController).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Navigation not allowed
    #[error(transparent)]
    View(#[from] ViewError),

    /// Connection state machine refused the request
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Operation needs a signed-in user
    #[error("no user is signed in")]
    NoUser,

    /// Operation needs an active room
    #[error("no room is active")]
    NoActiveRoom,

    /// Backend returned a user without an id
    #[error("backend returned a user without an id")]
    MissingUserId,

    /// Hosting started but the server reported no address
    #[error("server started but reported no address")]
    NoServerAddress,
}
