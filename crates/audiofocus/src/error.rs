//! Error types for the focus engine.

use crate::app_focus::ClientId;
use crate::session::SessionId;
use crate::state::SessionState;
use thiserror::Error;

/// Argument shape, type or arity was wrong.
pub const ERR_INVALID_ARGUMENT: i32 = 401;
/// Argument had the right type but an unsupported value.
pub const ERR_INVALID_VALUE: i32 = 6_800_101;
/// Operation not allowed in the session's current state.
pub const ERR_ILLEGAL_STATE: i32 = 6_800_103;
/// Internal failure.
pub const ERR_SYSTEM: i32 = 6_800_301;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FocusError {
    #[error("cannot {op} session {session} while it is {state}")]
    IllegalState {
        session: SessionId,
        state: SessionState,
        op: &'static str,
    },

    #[error("session {0} is not registered")]
    UnknownSession(SessionId),

    #[error("focus lock busy while handling session {0}")]
    ConcurrentModification(SessionId),

    #[error("invalid argument: {0}")]
    IllegalArgument(String),

    #[error("invalid value: {0}")]
    IllegalValue(String),

    #[error("session {session} was denied focus by session {by}")]
    FocusDenied { session: SessionId, by: SessionId },

    #[error("client {0} already has an active audio session")]
    AudioSessionActive(ClientId),

    #[error("client {0} has no active audio session")]
    NoAudioSession(ClientId),
}

impl FocusError {
    /// Numeric code surfaced through the client API.
    pub fn code(&self) -> i32 {
        match self {
            FocusError::IllegalArgument(_) => ERR_INVALID_ARGUMENT,
            FocusError::IllegalValue(_) => ERR_INVALID_VALUE,
            FocusError::IllegalState { .. }
            | FocusError::AudioSessionActive(_)
            | FocusError::NoAudioSession(_) => ERR_ILLEGAL_STATE,
            FocusError::UnknownSession(_)
            | FocusError::ConcurrentModification(_)
            | FocusError::FocusDenied { .. } => ERR_SYSTEM,
        }
    }
}

pub type Result<T> = std::result::Result<T, FocusError>;
