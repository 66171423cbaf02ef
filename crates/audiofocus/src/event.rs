//! Events delivered to session listeners.

use crate::session::SessionId;
use crate::state::{SessionState, TransitionCause};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptType {
    Begin,
    End,
}

/// `Force` means the engine already applied the hint; `Share` means the
/// receiver is expected to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptForceType {
    Force,
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptHint {
    None,
    Resume,
    Pause,
    Stop,
    Duck,
    Unduck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterruptEvent {
    pub event_type: InterruptType,
    pub force_type: InterruptForceType,
    pub hint_type: InterruptHint,
}

impl InterruptEvent {
    /// A verdict the engine applied to the receiver.
    pub fn begin(hint_type: InterruptHint) -> Self {
        Self {
            event_type: InterruptType::Begin,
            force_type: InterruptForceType::Force,
            hint_type,
        }
    }

    /// The inverse of an earlier `begin`, sent when the hold is dropped.
    pub fn end(hint_type: InterruptHint) -> Self {
        Self {
            event_type: InterruptType::End,
            force_type: InterruptForceType::Force,
            hint_type,
        }
    }
}

/// A lifecycle transition that happened to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub session: SessionId,
    pub from: SessionState,
    pub to: SessionState,
    pub cause: TransitionCause,
}

/// Anything queued in a session's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Interrupt(InterruptEvent),
    State(StateChange),
}

/// Listener categories, one typed listener trait each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Interrupt,
    StateChange,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Interrupt(_) => EventKind::Interrupt,
            SessionEvent::State(_) => EventKind::StateChange,
        }
    }
}
