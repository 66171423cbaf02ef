//! Session lifecycle states and the two transition tables.
//!
//! Clients drive sessions through [`ClientOp`]; the arbitrator forces
//! [`SystemOp`]s that skip the client checks but never release a session.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    New,
    Prepared,
    Running,
    Stopped,
    Released,
    Paused,
    Invalid,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::New => "new",
            SessionState::Prepared => "prepared",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
            SessionState::Released => "released",
            SessionState::Paused => "paused",
            SessionState::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations a client may request on its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientOp {
    Prepare,
    Start,
    Pause,
    Stop,
    Release,
}

impl ClientOp {
    pub fn name(self) -> &'static str {
        match self {
            ClientOp::Prepare => "prepare",
            ClientOp::Start => "start",
            ClientOp::Pause => "pause",
            ClientOp::Stop => "stop",
            ClientOp::Release => "release",
        }
    }
}

/// Transitions forced by the arbitrator or by an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemOp {
    Pause,
    Resume,
    Stop,
    Invalidate,
}

impl SystemOp {
    pub fn name(self) -> &'static str {
        match self {
            SystemOp::Pause => "force pause",
            SystemOp::Resume => "force resume",
            SystemOp::Stop => "force stop",
            SystemOp::Invalidate => "mark invalid",
        }
    }
}

/// Who caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Client,
    System,
}

/// Target state of a client operation, or `None` when `op` is illegal in `from`.
///
/// Releasing an already released session returns `None`; callers treat that
/// as a successful no-op.
pub fn client_transition(from: SessionState, op: ClientOp) -> Option<SessionState> {
    use SessionState::*;

    match (from, op) {
        (New, ClientOp::Prepare) => Some(Prepared),
        (New | Prepared | Paused | Stopped, ClientOp::Start) => Some(Running),
        (Running, ClientOp::Pause) => Some(Paused),
        (Running | Paused, ClientOp::Stop) => Some(Stopped),
        (Released, ClientOp::Release) => None,
        (_, ClientOp::Release) => Some(Released),
        _ => None,
    }
}

/// Target state of a system operation, or `None` when it does not apply.
pub fn system_transition(from: SessionState, op: SystemOp) -> Option<SessionState> {
    use SessionState::*;

    match (from, op) {
        (Running, SystemOp::Pause) => Some(Paused),
        (Paused, SystemOp::Resume) => Some(Running),
        (Running | Paused, SystemOp::Stop) => Some(Stopped),
        (Released | Invalid, SystemOp::Invalidate) => None,
        (_, SystemOp::Invalidate) => Some(Invalid),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [SessionState; 7] = [
        SessionState::New,
        SessionState::Prepared,
        SessionState::Running,
        SessionState::Stopped,
        SessionState::Released,
        SessionState::Paused,
        SessionState::Invalid,
    ];

    #[test]
    fn test_start_legal_states() {
        let legal: Vec<_> = ALL_STATES
            .into_iter()
            .filter(|s| client_transition(*s, ClientOp::Start).is_some())
            .collect();
        assert_eq!(
            legal,
            vec![
                SessionState::New,
                SessionState::Prepared,
                SessionState::Stopped,
                SessionState::Paused
            ]
        );
    }

    #[test]
    fn test_pause_only_from_running() {
        for state in ALL_STATES {
            let target = client_transition(state, ClientOp::Pause);
            if state == SessionState::Running {
                assert_eq!(target, Some(SessionState::Paused));
            } else {
                assert_eq!(target, None, "pause from {state}");
            }
        }
    }

    #[test]
    fn test_stop_from_running_or_paused() {
        assert_eq!(
            client_transition(SessionState::Running, ClientOp::Stop),
            Some(SessionState::Stopped)
        );
        assert_eq!(
            client_transition(SessionState::Paused, ClientOp::Stop),
            Some(SessionState::Stopped)
        );
        assert_eq!(client_transition(SessionState::Stopped, ClientOp::Stop), None);
        assert_eq!(client_transition(SessionState::Prepared, ClientOp::Stop), None);
    }

    #[test]
    fn test_release_from_everything_but_released() {
        for state in ALL_STATES {
            let target = client_transition(state, ClientOp::Release);
            if state == SessionState::Released {
                assert_eq!(target, None);
            } else {
                assert_eq!(target, Some(SessionState::Released));
            }
        }
    }

    #[test]
    fn test_system_never_releases() {
        for state in ALL_STATES {
            for op in [SystemOp::Pause, SystemOp::Resume, SystemOp::Stop, SystemOp::Invalidate] {
                assert_ne!(system_transition(state, op), Some(SessionState::Released));
            }
        }
    }

    #[test]
    fn test_system_resume_only_from_paused() {
        assert_eq!(
            system_transition(SessionState::Paused, SystemOp::Resume),
            Some(SessionState::Running)
        );
        assert_eq!(system_transition(SessionState::Stopped, SystemOp::Resume), None);
    }

    #[test]
    fn test_invalid_leaves_only_by_release() {
        assert_eq!(client_transition(SessionState::Invalid, ClientOp::Start), None);
        assert_eq!(
            system_transition(SessionState::Running, SystemOp::Invalidate),
            Some(SessionState::Invalid)
        );
    }
}
