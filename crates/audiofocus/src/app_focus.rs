//! App-level focus: at most one client holds it at a time.
//!
//! This sits beside per-session arbitration. A client that requests focus
//! takes it from the current holder, who is told to stop.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::event::{InterruptEvent, InterruptForceType, InterruptHint, InterruptType};
use crate::types::SessionIntent;

/// Identifies a client process.
pub type ClientId = u32;

/// Receives app focus changes for one client.
pub trait FocusListener: Send + Sync {
    fn on_focus_change(&self, client: ClientId, event: &InterruptEvent);
}

impl<F> FocusListener for F
where
    F: Fn(ClientId, &InterruptEvent) + Send + Sync,
{
    fn on_focus_change(&self, client: ClientId, event: &InterruptEvent) {
        self(client, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusHolder {
    pub client: ClientId,
    pub intent: SessionIntent,
}

/// Tells the previous holder to stop.
pub fn focus_lost() -> InterruptEvent {
    InterruptEvent {
        event_type: InterruptType::Begin,
        force_type: InterruptForceType::Share,
        hint_type: InterruptHint::Stop,
    }
}

/// Tells the requester it now holds focus.
pub fn focus_granted() -> InterruptEvent {
    InterruptEvent {
        event_type: InterruptType::End,
        force_type: InterruptForceType::Share,
        hint_type: InterruptHint::None,
    }
}

#[derive(Default)]
pub struct AppFocus {
    holder: Mutex<Option<FocusHolder>>,
    listeners: DashMap<ClientId, Arc<dyn FocusListener>>,
}

impl AppFocus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback for `client`, replacing any earlier one.
    pub fn set_callback<L>(&self, client: ClientId, listener: L)
    where
        L: FocusListener + 'static,
    {
        self.listeners.insert(client, Arc::new(listener));
    }

    pub fn unset_callback(&self, client: ClientId) {
        self.listeners.remove(&client);
    }

    pub fn holder(&self) -> Option<FocusHolder> {
        *self.holder.lock()
    }

    /// Take app focus for `client`. Requesting again while holding re-grants.
    pub fn request(&self, client: ClientId, intent: SessionIntent) {
        let previous = {
            let mut holder = self.holder.lock();
            holder.replace(FocusHolder { client, intent })
        };

        if let Some(prev) = previous.filter(|p| p.client != client) {
            info!(client, previous = prev.client, intent = %intent, "App focus taken");
            self.notify(prev.client, focus_lost());
        } else {
            debug!(client, intent = %intent, "App focus granted");
        }
        self.notify(client, focus_granted());
    }

    /// Give up app focus. No-op unless `client` holds it.
    pub fn abandon(&self, client: ClientId) {
        let mut holder = self.holder.lock();
        if holder.is_some_and(|h| h.client == client) {
            *holder = None;
            info!(client, "App focus abandoned");
        }
    }

    fn notify(&self, client: ClientId, event: InterruptEvent) {
        let listener = self.listeners.get(&client).map(|l| Arc::clone(l.value()));
        if let Some(listener) = listener {
            listener.on_focus_change(client, &event);
        }
    }
}

impl std::fmt::Debug for AppFocus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppFocus")
            .field("holder", &self.holder())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
