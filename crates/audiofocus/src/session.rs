//! One renderer or capturer as the engine sees it.

use crate::error::{FocusError, Result};
use crate::event::StateChange;
use crate::state::{self, ClientOp, SessionState, SystemOp, TransitionCause};
use crate::types::{Direction, InterruptMode, SessionIntent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Process-unique session identifier, allocated monotonically by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to register a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSpec {
    pub direction: Direction,
    pub intent: SessionIntent,
    /// `None` takes the arbitrator's configured default.
    pub interrupt_mode: Option<InterruptMode>,
    pub pause_when_ducked: bool,
    /// Play alongside everything else, outside arbitration.
    pub parallel_play: bool,
}

impl SessionSpec {
    pub fn renderer(intent: SessionIntent) -> Self {
        Self {
            direction: Direction::Renderer,
            intent,
            interrupt_mode: None,
            pause_when_ducked: false,
            parallel_play: false,
        }
    }

    pub fn capturer(intent: SessionIntent) -> Self {
        Self {
            direction: Direction::Capturer,
            intent,
            interrupt_mode: None,
            pause_when_ducked: false,
            parallel_play: false,
        }
    }

    pub fn with_mode(mut self, mode: InterruptMode) -> Self {
        self.interrupt_mode = Some(mode);
        self
    }

    pub fn with_pause_when_ducked(mut self, pause: bool) -> Self {
        self.pause_when_ducked = pause;
        self
    }

    pub fn with_parallel_play(mut self, parallel: bool) -> Self {
        self.parallel_play = parallel;
        self
    }
}

/// A registered stream session.
///
/// State and duck level change only through the transition methods, which
/// the arbitrator calls while it holds the focus lock.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: SessionId,
    pub direction: Direction,
    pub intent: SessionIntent,
    pub interrupt_mode: InterruptMode,
    /// Turn a duck verdict into a pause for this session.
    pub pause_when_ducked: bool,
    /// Neither interrupts nor gets interrupted.
    pub parallel_play: bool,
    pub created_at: Instant,
    state: SessionState,
    ducked: bool,
    volume_scale: f32,
}

impl StreamSession {
    pub fn new(id: SessionId, spec: SessionSpec, default_mode: InterruptMode) -> Self {
        Self {
            id,
            direction: spec.direction,
            intent: spec.intent,
            interrupt_mode: spec.interrupt_mode.unwrap_or(default_mode),
            pause_when_ducked: spec.pause_when_ducked,
            parallel_play: spec.parallel_play,
            created_at: Instant::now(),
            state: SessionState::New,
            ducked: false,
            volume_scale: 1.0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    pub fn volume_scale(&self) -> f32 {
        self.volume_scale
    }

    pub fn is_independent(&self) -> bool {
        self.interrupt_mode == InterruptMode::Independent
    }

    /// Whether this session takes part in arbitration at all.
    pub fn competes(&self) -> bool {
        self.is_independent() && !self.parallel_play
    }

    /// Apply a client operation. Releasing twice yields `Ok(None)`.
    pub(crate) fn apply_client(&mut self, op: ClientOp) -> Result<Option<StateChange>> {
        match state::client_transition(self.state, op) {
            Some(to) => Ok(Some(self.move_to(to, TransitionCause::Client))),
            None if op == ClientOp::Release => Ok(None),
            None => Err(FocusError::IllegalState {
                session: self.id,
                state: self.state,
                op: op.name(),
            }),
        }
    }

    /// Check a client operation without applying it.
    pub(crate) fn check_client(&self, op: ClientOp) -> Result<()> {
        match state::client_transition(self.state, op) {
            Some(_) => Ok(()),
            None if op == ClientOp::Release => Ok(()),
            None => Err(FocusError::IllegalState {
                session: self.id,
                state: self.state,
                op: op.name(),
            }),
        }
    }

    /// Apply a system operation; `None` when it does not apply in the current state.
    pub(crate) fn apply_system(&mut self, op: SystemOp) -> Option<StateChange> {
        state::system_transition(self.state, op).map(|to| self.move_to(to, TransitionCause::System))
    }

    pub(crate) fn duck(&mut self, volume: f32) {
        self.ducked = true;
        self.volume_scale = volume;
    }

    pub(crate) fn unduck(&mut self) {
        self.ducked = false;
        self.volume_scale = 1.0;
    }

    fn move_to(&mut self, to: SessionState, cause: TransitionCause) -> StateChange {
        let from = self.state;
        self.state = to;
        StateChange {
            session: self.id,
            from,
            to,
            cause,
        }
    }
}
