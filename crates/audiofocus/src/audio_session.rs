//! Per-client audio sessions.
//!
//! A client may activate one audio session to declare how its streams should
//! coexist with others. The strategy is recorded for the client; the session
//! ends when the client deactivates it or the system revokes it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::app_focus::ClientId;
use crate::error::{FocusError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    #[default]
    Default,
    MixWithOthers,
    DuckOthers,
    PauseOthers,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSessionStrategy {
    pub concurrency_mode: ConcurrencyMode,
}

impl AudioSessionStrategy {
    pub fn new(concurrency_mode: ConcurrencyMode) -> Self {
        Self { concurrency_mode }
    }
}

/// Why the system ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactiveReason {
    LowPriority,
    Timeout,
}

/// Told when the system deactivates a client's session. A client that
/// deactivates its own session is not called back.
pub trait AudioSessionListener: Send + Sync {
    fn on_deactivated(&self, client: ClientId, reason: DeactiveReason);
}

impl<F> AudioSessionListener for F
where
    F: Fn(ClientId, DeactiveReason) + Send + Sync,
{
    fn on_deactivated(&self, client: ClientId, reason: DeactiveReason) {
        self(client, reason)
    }
}

#[derive(Default)]
pub struct AudioSessionService {
    sessions: DashMap<ClientId, AudioSessionStrategy>,
    listeners: DashMap<ClientId, Arc<dyn AudioSessionListener>>,
}

impl AudioSessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `AudioSessionActive` if `client` already has a session.
    pub fn activate(&self, client: ClientId, strategy: AudioSessionStrategy) -> Result<()> {
        match self.sessions.entry(client) {
            Entry::Occupied(_) => Err(FocusError::AudioSessionActive(client)),
            Entry::Vacant(slot) => {
                slot.insert(strategy);
                info!(client, mode = ?strategy.concurrency_mode, "Audio session activated");
                Ok(())
            }
        }
    }

    /// Fails with `NoAudioSession` if `client` has nothing to deactivate.
    pub fn deactivate(&self, client: ClientId) -> Result<()> {
        self.sessions
            .remove(&client)
            .ok_or(FocusError::NoAudioSession(client))?;
        info!(client, "Audio session deactivated");
        Ok(())
    }

    pub fn is_active(&self, client: ClientId) -> bool {
        self.sessions.contains_key(&client)
    }

    pub fn strategy(&self, client: ClientId) -> Option<AudioSessionStrategy> {
        self.sessions.get(&client).map(|s| *s.value())
    }

    /// System-side deactivation. The client's listener learns the reason.
    pub fn revoke(&self, client: ClientId, reason: DeactiveReason) -> Result<()> {
        self.sessions
            .remove(&client)
            .ok_or(FocusError::NoAudioSession(client))?;
        info!(client, ?reason, "Audio session revoked");

        // Clone out of the map so the listener can call back into the service.
        let listener = self.listeners.get(&client).map(|l| Arc::clone(l.value()));
        match listener {
            Some(listener) => listener.on_deactivated(client, reason),
            None => debug!(client, "No audio session listener"),
        }
        Ok(())
    }

    /// The client's session ran past its idle limit.
    pub fn time_out(&self, client: ClientId) -> Result<()> {
        self.revoke(client, DeactiveReason::Timeout)
    }

    /// Install the callback for `client`, replacing any earlier one.
    pub fn set_callback<L>(&self, client: ClientId, listener: L)
    where
        L: AudioSessionListener + 'static,
    {
        self.listeners.insert(client, Arc::new(listener));
    }

    pub fn unset_callback(&self, client: ClientId) {
        self.listeners.remove(&client);
    }
}

impl std::fmt::Debug for AudioSessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSessionService")
            .field("sessions", &self.sessions.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
