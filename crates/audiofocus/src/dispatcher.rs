//! Per-session event delivery.
//!
//! The arbitrator enqueues events while it holds the focus lock, in the order
//! it generates them, then flushes the touched mailboxes once the lock is
//! released. Listener tables live here, outside the focus lock, so a listener
//! may call back into the engine.
//!
//! Each mailbox is drained by at most one thread at a time, which keeps
//! delivery FIFO per session. A flush that finds the mailbox busy waits until
//! its own events have been delivered, so a call returns only after its
//! listeners ran. The one exception is a flush issued from inside a listener:
//! it returns at once and leaves its events to the active drainer, so a
//! listener that re-enters the engine never waits on a delivery that is
//! waiting on it.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{FocusError, Result};
use crate::event::{EventKind, InterruptEvent, SessionEvent, StateChange};
use crate::session::SessionId;

/// Receives interrupt events for one session.
pub trait InterruptListener: Send + Sync {
    fn on_interrupt(&self, session: SessionId, event: &InterruptEvent);
}

impl<F> InterruptListener for F
where
    F: Fn(SessionId, &InterruptEvent) + Send + Sync,
{
    fn on_interrupt(&self, session: SessionId, event: &InterruptEvent) {
        self(session, event)
    }
}

/// Receives lifecycle transitions for one session.
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, change: &StateChange);
}

impl<F> StateListener for F
where
    F: Fn(&StateChange) + Send + Sync,
{
    fn on_state_change(&self, change: &StateChange) {
        self(change)
    }
}

/// A listener of either kind.
#[derive(Clone)]
pub enum Listener {
    Interrupt(Arc<dyn InterruptListener>),
    State(Arc<dyn StateListener>),
}

impl Listener {
    pub fn kind(&self) -> EventKind {
        match self {
            Listener::Interrupt(_) => EventKind::Interrupt,
            Listener::State(_) => EventKind::StateChange,
        }
    }
}

thread_local! {
    /// How many listener deliveries are running on this thread.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

fn in_listener() -> bool {
    DELIVERING.with(|depth| depth.get() > 0)
}

/// Marks the current thread as running a listener for its lifetime.
struct DeliveryScope;

impl DeliveryScope {
    fn enter() -> Self {
        DELIVERING.with(|depth| depth.set(depth.get() + 1));
        DeliveryScope
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[derive(Default)]
struct Queue {
    events: VecDeque<SessionEvent>,
    /// Sequence numbers: events ever queued, and events handed to listeners.
    enqueued: u64,
    delivered: u64,
    draining: bool,
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<Queue>,
    /// Signalled after each delivery and when draining ends.
    progress: Condvar,
    interrupt: Mutex<Vec<Arc<dyn InterruptListener>>>,
    state: Mutex<Vec<Arc<dyn StateListener>>>,
    channels: Mutex<Vec<mpsc::UnboundedSender<InterruptEvent>>>,
}

impl Mailbox {
    fn deliver(&self, id: SessionId, event: SessionEvent) {
        let _scope = DeliveryScope::enter();
        match event {
            SessionEvent::Interrupt(interrupt) => {
                // Snapshot so listeners may (un)subscribe while running
                let listeners = self.interrupt.lock().clone();
                for listener in &listeners {
                    listener.on_interrupt(id, &interrupt);
                }
                self.channels.lock().retain(|tx| tx.send(interrupt).is_ok());
            }
            SessionEvent::State(change) => {
                let listeners = self.state.lock().clone();
                for listener in &listeners {
                    listener.on_state_change(&change);
                }
            }
        }
    }

    fn clear(&self) {
        self.interrupt.lock().clear();
        self.state.lock().clear();
        self.channels.lock().clear();
    }
}

/// Clears the draining flag if a listener panics mid-flush, waking waiters
/// so one of them takes over the rest of the queue.
struct DrainGuard<'a> {
    mailbox: &'a Mailbox,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.mailbox.queue.lock().draining = false;
            self.mailbox.progress.notify_all();
        }
    }
}

/// Listener tables and mailboxes for every open session.
#[derive(Default)]
pub struct EventDispatcher {
    mailboxes: DashMap<SessionId, Arc<Mailbox>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self, id: SessionId) {
        self.mailboxes.entry(id).or_default();
    }

    /// Drop the mailbox and every listener of a session.
    pub(crate) fn close(&self, id: SessionId) {
        if let Some((_, mailbox)) = self.mailboxes.remove(&id) {
            mailbox.clear();
        }
    }

    pub fn is_open(&self, id: SessionId) -> bool {
        self.mailboxes.contains_key(&id)
    }

    fn mailbox(&self, id: SessionId) -> Option<Arc<Mailbox>> {
        // Clone out so no map shard lock is held during delivery
        self.mailboxes.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn subscribe(&self, id: SessionId, listener: Listener) -> Result<()> {
        let mailbox = self.mailbox(id).ok_or(FocusError::UnknownSession(id))?;
        let kind = listener.kind();
        match listener {
            Listener::Interrupt(l) => mailbox.interrupt.lock().push(l),
            Listener::State(l) => mailbox.state.lock().push(l),
        }
        tracing::debug!(session_id = %id, kind = ?kind, "Listener subscribed");
        Ok(())
    }

    pub fn on_interrupt<L>(&self, id: SessionId, listener: L) -> Result<()>
    where
        L: InterruptListener + 'static,
    {
        self.subscribe(id, Listener::Interrupt(Arc::new(listener)))
    }

    pub fn on_state_change<L>(&self, id: SessionId, listener: L) -> Result<()>
    where
        L: StateListener + 'static,
    {
        self.subscribe(id, Listener::State(Arc::new(listener)))
    }

    /// Remove every listener of `kind`. Unsubscribing `Interrupt` also closes
    /// the session's interrupt channels. Unknown sessions are ignored.
    pub fn unsubscribe(&self, id: SessionId, kind: EventKind) {
        let Some(mailbox) = self.mailbox(id) else {
            return;
        };
        match kind {
            EventKind::Interrupt => {
                mailbox.interrupt.lock().clear();
                mailbox.channels.lock().clear();
            }
            EventKind::StateChange => mailbox.state.lock().clear(),
        }
        tracing::debug!(session_id = %id, kind = ?kind, "Listeners removed");
    }

    /// Stream of interrupt events for async consumers. The receiver ends when
    /// the session is released or its interrupt listeners are removed.
    pub fn interrupt_channel(
        &self,
        id: SessionId,
    ) -> Result<mpsc::UnboundedReceiver<InterruptEvent>> {
        let mailbox = self.mailbox(id).ok_or(FocusError::UnknownSession(id))?;
        let (tx, rx) = mpsc::unbounded_channel();
        mailbox.channels.lock().push(tx);
        Ok(rx)
    }

    pub fn listener_count(&self, id: SessionId, kind: EventKind) -> usize {
        match (self.mailbox(id), kind) {
            (None, _) => 0,
            (Some(m), EventKind::Interrupt) => m.interrupt.lock().len() + m.channels.lock().len(),
            (Some(m), EventKind::StateChange) => m.state.lock().len(),
        }
    }

    /// Queue an event. Events for closed sessions are dropped.
    pub(crate) fn enqueue(&self, id: SessionId, event: SessionEvent) {
        if let Some(mailbox) = self.mailbox(id) {
            tracing::trace!(session_id = %id, kind = ?event.kind(), "Event queued");
            let mut queue = mailbox.queue.lock();
            queue.events.push_back(event);
            queue.enqueued += 1;
        }
    }

    /// Deliver everything queued for `id` so far.
    ///
    /// If another thread is draining the mailbox this waits until that
    /// thread has delivered the events queued before the call, taking over
    /// if it stops early. From inside a listener it never waits.
    pub(crate) fn flush(&self, id: SessionId) {
        let Some(mailbox) = self.mailbox(id) else {
            return;
        };
        {
            let mut queue = mailbox.queue.lock();
            let target = queue.enqueued;
            loop {
                if queue.delivered >= target || (queue.events.is_empty() && !queue.draining) {
                    return;
                }
                if !queue.draining {
                    break;
                }
                if in_listener() {
                    return;
                }
                mailbox.progress.wait(&mut queue);
            }
            queue.draining = true;
        }

        let mut guard = DrainGuard {
            mailbox: &mailbox,
            armed: true,
        };
        loop {
            let next = {
                let mut queue = mailbox.queue.lock();
                match queue.events.pop_front() {
                    Some(event) => event,
                    None => {
                        // Cleared under the lock so a concurrent enqueue is never stranded
                        queue.draining = false;
                        guard.armed = false;
                        break;
                    }
                }
            };
            mailbox.deliver(id, next);
            mailbox.queue.lock().delivered += 1;
            mailbox.progress.notify_all();
        }
        mailbox.progress.notify_all();
    }

    pub(crate) fn flush_all(&self, ids: &[SessionId]) {
        for id in ids {
            self.flush(*id);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("open_sessions", &self.mailboxes.len())
            .finish()
    }
}
