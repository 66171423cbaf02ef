//! Focus Arbitrator
//!
//! The single serialization point of the engine. The registry and the hold
//! table live behind one `parking_lot::Mutex`; every start, stop, pause and
//! release takes it, applies the policy, and queues the resulting events.
//! Events are delivered after the lock is dropped.
//!
//! Spans:
//! - `focus.request` - arbitration for a starting session
//! - `focus.release` - a session giving up focus

use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

use crate::dispatcher::EventDispatcher;
use crate::error::{FocusError, Result};
use crate::event::{InterruptEvent, InterruptHint, SessionEvent, StateChange};
use crate::policy::{InterruptPolicy, Verdict};
use crate::registry::{InMemoryRegistry, RegistryStats, SessionRegistry};
use crate::session::{SessionId, SessionSpec, StreamSession};
use crate::state::{ClientOp, SessionState, SystemOp};
use crate::types::{Direction, InterruptMode, ParseEnumError, SessionIntent};

/// Configuration for the arbitrator.
#[derive(Debug, Clone)]
pub struct ArbitratorConfig {
    /// Volume scale for ducked sessions.
    pub duck_volume: f32,
    /// How long a caller waits for the focus lock.
    pub lock_timeout: Duration,
    /// Mode for sessions created without one.
    pub default_interrupt_mode: InterruptMode,
    pub policy: InterruptPolicy,
}

impl Default for ArbitratorConfig {
    fn default() -> Self {
        Self {
            duck_volume: 0.2,
            lock_timeout: Duration::from_millis(1000),
            default_interrupt_mode: InterruptMode::Share,
            policy: InterruptPolicy::default(),
        }
    }
}

impl ArbitratorConfig {
    pub fn from_config(config: &focusconf::FocusConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| FocusError::IllegalValue(e.to_string()))?;
        let default_interrupt_mode = config
            .arbitration
            .default_interrupt_mode
            .parse()
            .map_err(|e: ParseEnumError| FocusError::IllegalValue(e.to_string()))?;

        Ok(Self {
            duck_volume: config.arbitration.duck_volume,
            lock_timeout: Duration::from_millis(config.arbitration.lock_timeout_ms),
            default_interrupt_mode,
            policy: InterruptPolicy::from_config(&config.policy)?,
        })
    }

    pub fn with_policy(mut self, policy: InterruptPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_mode(mut self, mode: InterruptMode) -> Self {
        self.default_interrupt_mode = mode;
        self
    }
}

/// Verdicts applied to incumbents when a candidate took focus.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrationResult {
    pub candidate: SessionId,
    /// Every incumbent that was affected, in creation order. `Allow` is omitted.
    pub affected: Vec<(SessionId, Verdict)>,
}

impl ArbitrationResult {
    fn uncontested(candidate: SessionId) -> Self {
        Self {
            candidate,
            affected: Vec::new(),
        }
    }

    pub fn verdict_for(&self, id: SessionId) -> Option<Verdict> {
        self.affected
            .iter()
            .find(|(affected, _)| *affected == id)
            .map(|(_, verdict)| *verdict)
    }

    pub fn is_uncontested(&self) -> bool {
        self.affected.is_empty()
    }
}

/// How a session currently relates to focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusStatus {
    Active,
    Ducked,
    /// Paused by the arbitrator, waiting for focus to come back.
    Paused,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FocusInfo {
    pub session: SessionId,
    pub direction: Direction,
    pub intent: SessionIntent,
    pub interrupt_mode: InterruptMode,
    pub status: FocusStatus,
    pub volume_scale: f32,
}

/// `holder` is the session whose start put the held session in this state.
/// `verdict` is always a temporary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hold {
    holder: SessionId,
    verdict: Verdict,
}

/// Sessions with queued events, flushed once the focus lock is released.
struct Outbox<'a> {
    dispatcher: &'a EventDispatcher,
    touched: Vec<SessionId>,
}

impl<'a> Outbox<'a> {
    fn new(dispatcher: &'a EventDispatcher) -> Self {
        Self {
            dispatcher,
            touched: Vec::new(),
        }
    }

    /// Share-mode sessions never see interrupt events.
    fn interrupt(&mut self, id: SessionId, mode: InterruptMode, event: InterruptEvent) {
        if mode == InterruptMode::Independent {
            self.dispatcher.enqueue(id, SessionEvent::Interrupt(event));
            self.touch(id);
        }
    }

    fn state(&mut self, change: StateChange) {
        self.dispatcher.enqueue(change.session, SessionEvent::State(change));
        self.touch(change.session);
    }

    fn touch(&mut self, id: SessionId) {
        if !self.touched.contains(&id) {
            self.touched.push(id);
        }
    }

    fn flush(self) {
        self.dispatcher.flush_all(&self.touched);
    }
}

/// Everything guarded by the focus lock.
struct Inner {
    registry: Box<dyn SessionRegistry>,
    /// Held session -> what is holding it.
    holds: BTreeMap<SessionId, Vec<Hold>>,
}

/// The focus arbitrator.
pub struct FocusArbitrator {
    config: ArbitratorConfig,
    inner: Mutex<Inner>,
    dispatcher: EventDispatcher,
}

impl FocusArbitrator {
    pub fn new(config: ArbitratorConfig) -> Self {
        Self::with_registry(config, InMemoryRegistry::boxed())
    }

    pub fn with_registry(config: ArbitratorConfig, registry: Box<dyn SessionRegistry>) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                registry,
                holds: BTreeMap::new(),
            }),
            dispatcher: EventDispatcher::new(),
        }
    }

    pub fn config(&self) -> &ArbitratorConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    fn lock(&self, id: SessionId) -> Result<MutexGuard<'_, Inner>> {
        self.inner.try_lock_for(self.config.lock_timeout).ok_or_else(|| {
            warn!(
                session_id = %id,
                timeout_ms = self.config.lock_timeout.as_millis() as u64,
                "Focus lock timed out"
            );
            FocusError::ConcurrentModification(id)
        })
    }

    /// Register a new session in state `New` and open its mailbox.
    pub fn create_session(&self, spec: SessionSpec) -> Result<SessionId> {
        let mut inner = self.inner.lock();
        let id = inner.registry.allocate_id();
        let session = StreamSession::new(id, spec, self.config.default_interrupt_mode);
        let mode = session.interrupt_mode;
        inner.registry.insert(session)?;
        self.dispatcher.open(id);

        info!(
            session_id = %id,
            direction = %spec.direction,
            intent = %spec.intent,
            mode = %mode,
            "Session created"
        );
        Ok(id)
    }

    pub fn prepare(&self, id: SessionId) -> Result<()> {
        self.client_op(id, ClientOp::Prepare)
    }

    /// Arbitrate for `id` and move it to `Running`.
    ///
    /// When this returns the verdicts are applied and their events delivered,
    /// unless the caller is itself a listener of an affected session; those
    /// events follow once that listener returns.
    pub fn start(&self, id: SessionId) -> Result<ArbitrationResult> {
        let _span = info_span!("focus.request", session_id = %id).entered();
        let mut out = Outbox::new(&self.dispatcher);
        let result = {
            let mut inner = self.lock(id)?;
            inner.start(id, &self.config, &mut out)
        };
        out.flush();
        result
    }

    pub fn pause(&self, id: SessionId) -> Result<()> {
        self.client_op(id, ClientOp::Pause)
    }

    pub fn stop(&self, id: SessionId) -> Result<()> {
        self.client_op(id, ClientOp::Stop)
    }

    /// Release and deregister. Succeeds for sessions that are already gone.
    ///
    /// Waits for the focus lock without a timeout so a release always completes.
    pub fn release(&self, id: SessionId) -> Result<()> {
        let _span = info_span!("focus.release", session_id = %id).entered();
        let mut out = Outbox::new(&self.dispatcher);
        let released = {
            let mut inner = self.inner.lock();
            inner.release(id, &mut out)?
        };
        out.flush();
        if released {
            self.dispatcher.close(id);
            info!(session_id = %id, "Session released");
        }
        Ok(())
    }

    /// Apply the policy for `id` without starting it.
    ///
    /// Only sessions that could still start may ask: a running session already
    /// has focus and an invalid one never will.
    pub fn request_focus(&self, id: SessionId) -> Result<ArbitrationResult> {
        let _span = info_span!("focus.request", session_id = %id).entered();
        let mut out = Outbox::new(&self.dispatcher);
        let result = {
            let mut inner = self.lock(id)?;
            let session = inner.registry.get(id).ok_or(FocusError::UnknownSession(id))?;
            if matches!(session.state(), SessionState::Running | SessionState::Invalid) {
                let err = FocusError::IllegalState {
                    session: id,
                    state: session.state(),
                    op: "request focus",
                };
                return Err(rejected(err));
            }
            inner.arbitrate(id, &self.config, &mut out)
        };
        out.flush();
        result
    }

    /// Drop every hold `id` owns, restoring the sessions it paused or ducked.
    pub fn release_focus(&self, id: SessionId) -> Result<Vec<(SessionId, InterruptHint)>> {
        let _span = info_span!("focus.release", session_id = %id).entered();
        let mut out = Outbox::new(&self.dispatcher);
        let restored = {
            let mut inner = self.lock(id)?;
            if !inner.registry.contains(id) {
                return Err(FocusError::UnknownSession(id));
            }
            inner.release_focus(id, &mut out)
        };
        out.flush();
        Ok(restored)
    }

    /// Move a session to `Invalid` after an unrecoverable error.
    pub fn mark_invalid(&self, id: SessionId) -> Result<()> {
        let mut out = Outbox::new(&self.dispatcher);
        let result = {
            let mut inner = self.lock(id)?;
            inner.invalidate(id, &mut out)
        };
        out.flush();
        result
    }

    pub fn set_interrupt_mode(&self, id: SessionId, mode: InterruptMode) -> Result<()> {
        let mut inner = self.lock(id)?;
        let session = inner
            .registry
            .get_mut(id)
            .ok_or(FocusError::UnknownSession(id))?;
        if session.interrupt_mode != mode {
            info!(
                session_id = %id,
                from = %session.interrupt_mode,
                to = %mode,
                "Interrupt mode changed"
            );
            session.interrupt_mode = mode;
        }
        Ok(())
    }

    /// Take the session out of arbitration, or put it back. Applies from the
    /// next start; holds already in place are not touched.
    pub fn set_parallel_play(&self, id: SessionId, parallel: bool) -> Result<()> {
        let mut inner = self.lock(id)?;
        let session = inner
            .registry
            .get_mut(id)
            .ok_or(FocusError::UnknownSession(id))?;
        if session.parallel_play != parallel {
            info!(session_id = %id, parallel, "Parallel play changed");
            session.parallel_play = parallel;
        }
        Ok(())
    }

    pub fn state(&self, id: SessionId) -> Result<SessionState> {
        self.inner
            .lock()
            .registry
            .get(id)
            .map(|s| s.state())
            .ok_or(FocusError::UnknownSession(id))
    }

    /// Snapshot of a registered session.
    pub fn session(&self, id: SessionId) -> Option<StreamSession> {
        self.inner.lock().registry.get(id).cloned()
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.lock().registry.stats()
    }

    /// Sessions that hold focus or are waiting to get it back.
    pub fn focus_info(&self) -> Vec<FocusInfo> {
        let inner = self.inner.lock();
        inner
            .registry
            .iter()
            .filter_map(|s| {
                let status = match s.state() {
                    SessionState::Running if s.is_ducked() => FocusStatus::Ducked,
                    SessionState::Running => FocusStatus::Active,
                    SessionState::Paused if inner.is_held(s.id, Verdict::PauseResume) => {
                        FocusStatus::Paused
                    }
                    _ => return None,
                };
                Some(FocusInfo {
                    session: s.id,
                    direction: s.direction,
                    intent: s.intent,
                    interrupt_mode: s.interrupt_mode,
                    status,
                    volume_scale: s.volume_scale(),
                })
            })
            .collect()
    }

    fn client_op(&self, id: SessionId, op: ClientOp) -> Result<()> {
        let mut out = Outbox::new(&self.dispatcher);
        let result = {
            let mut inner = self.lock(id)?;
            inner.client_op(id, op, &mut out)
        };
        out.flush();
        result
    }
}

impl std::fmt::Debug for FocusArbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusArbitrator")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

fn effective_verdict(verdict: Verdict, pause_when_ducked: bool) -> Verdict {
    match verdict {
        Verdict::DuckUnduck if pause_when_ducked => Verdict::PauseResume,
        other => other,
    }
}

fn rejected(err: FocusError) -> FocusError {
    warn!(error = %err, "Transition rejected");
    err
}

impl Inner {
    fn is_held(&self, id: SessionId, verdict: Verdict) -> bool {
        self.holds
            .get(&id)
            .is_some_and(|holds| holds.iter().any(|h| h.verdict == verdict))
    }

    fn start(
        &mut self,
        id: SessionId,
        config: &ArbitratorConfig,
        out: &mut Outbox<'_>,
    ) -> Result<ArbitrationResult> {
        self.registry
            .get(id)
            .ok_or(FocusError::UnknownSession(id))?
            .check_client(ClientOp::Start)
            .map_err(rejected)?;

        let result = self.arbitrate(id, config, out)?;

        // A client start overrides whatever was holding this session
        self.holds.remove(&id);
        let session = self
            .registry
            .get_mut(id)
            .ok_or(FocusError::UnknownSession(id))?;
        if session.is_ducked() {
            session.unduck();
        }
        if let Some(change) = session.apply_client(ClientOp::Start)? {
            out.state(change);
        }
        Ok(result)
    }

    fn arbitrate(
        &mut self,
        candidate: SessionId,
        config: &ArbitratorConfig,
        out: &mut Outbox<'_>,
    ) -> Result<ArbitrationResult> {
        let session = self
            .registry
            .get(candidate)
            .ok_or(FocusError::UnknownSession(candidate))?;
        let mut result = ArbitrationResult::uncontested(candidate);
        if !session.competes() {
            debug!(
                session_id = %candidate,
                mode = %session.interrupt_mode,
                parallel = session.parallel_play,
                "Not arbitrated"
            );
            return Ok(result);
        }

        let (intent, direction) = (session.intent, session.direction);
        let decisions: Vec<(SessionId, Verdict)> = self
            .registry
            .iter()
            .filter(|s| {
                s.id != candidate
                    && s.state() == SessionState::Running
                    && s.competes()
                    && s.direction == direction
            })
            .map(|s| {
                let verdict = config.policy.decide(s.intent, intent);
                (s.id, effective_verdict(verdict, s.pause_when_ducked))
            })
            .collect();

        // A denial leaves every incumbent untouched
        if let Some(&(by, _)) = decisions.iter().find(|(_, v)| *v == Verdict::Deny) {
            warn!(session_id = %candidate, denied_by = %by, "Focus denied");
            return Err(FocusError::FocusDenied {
                session: candidate,
                by,
            });
        }

        for (incumbent, verdict) in decisions {
            debug!(
                session_id = %candidate,
                incumbent = %incumbent,
                verdict = %verdict,
                "Verdict"
            );
            if verdict == Verdict::Allow {
                continue;
            }
            if self.apply_verdict(incumbent, candidate, verdict, config, out) {
                result.affected.push((incumbent, verdict));
            }
        }

        info!(
            session_id = %candidate,
            affected = result.affected.len(),
            "Arbitration resolved"
        );
        Ok(result)
    }

    /// Returns false when the incumbent vanished before the verdict landed.
    fn apply_verdict(
        &mut self,
        incumbent: SessionId,
        candidate: SessionId,
        verdict: Verdict,
        config: &ArbitratorConfig,
        out: &mut Outbox<'_>,
    ) -> bool {
        let Some(hint) = verdict.begin_hint() else {
            return false;
        };
        let Some(session) = self.registry.get_mut(incumbent) else {
            return false;
        };
        let mode = session.interrupt_mode;
        let begin = InterruptEvent::begin(hint);

        let held = match verdict {
            Verdict::PauseResume => match session.apply_system(SystemOp::Pause) {
                Some(change) => {
                    out.interrupt(incumbent, mode, begin);
                    out.state(change);
                    true
                }
                None => false,
            },
            Verdict::DuckUnduck => {
                // One duck episode per session regardless of how many hold it
                if !session.is_ducked() {
                    session.duck(config.duck_volume);
                    out.interrupt(incumbent, mode, begin);
                }
                true
            }
            Verdict::Stop => {
                if let Some(change) = session.apply_system(SystemOp::Stop) {
                    out.interrupt(incumbent, mode, begin);
                    out.state(change);
                }
                session.unduck();
                self.holds.remove(&incumbent);
                transfer_holds(&mut self.holds, incumbent, candidate);
                false
            }
            Verdict::Allow | Verdict::Deny => return false,
        };
        if held && verdict.is_temporary() {
            add_hold(&mut self.holds, incumbent, candidate, verdict);
        }
        true
    }

    fn release_focus(
        &mut self,
        holder: SessionId,
        out: &mut Outbox<'_>,
    ) -> Vec<(SessionId, InterruptHint)> {
        let mut restored = Vec::new();
        let held: Vec<SessionId> = self.holds.keys().copied().collect();

        for id in held {
            let Some(holds) = self.holds.get_mut(&id) else {
                continue;
            };
            if !holds.iter().any(|h| h.holder == holder) {
                continue;
            }
            let owned: Vec<Verdict> = holds
                .iter()
                .filter(|h| h.holder == holder)
                .map(|h| h.verdict)
                .collect();
            holds.retain(|h| h.holder != holder);
            // Only the last hold of a kind restores the session
            let dropped: Vec<Verdict> = [Verdict::PauseResume, Verdict::DuckUnduck]
                .into_iter()
                .filter(|v| owned.contains(v) && !holds.iter().any(|h| h.verdict == *v))
                .collect();
            if holds.is_empty() {
                self.holds.remove(&id);
            }

            let Some(session) = self.registry.get_mut(id) else {
                continue;
            };
            let mode = session.interrupt_mode;
            for verdict in dropped {
                let Some(hint) = verdict.end_hint() else {
                    continue;
                };
                let change = match verdict {
                    Verdict::PauseResume => match session.apply_system(SystemOp::Resume) {
                        Some(change) => Some(change),
                        None => continue,
                    },
                    _ if session.is_ducked() => {
                        session.unduck();
                        None
                    }
                    _ => continue,
                };
                out.interrupt(id, mode, InterruptEvent::end(hint));
                if let Some(change) = change {
                    out.state(change);
                }
                restored.push((id, hint));
            }
        }

        if !restored.is_empty() {
            info!(session_id = %holder, restored = restored.len(), "Focus released");
        }
        restored
    }

    fn client_op(&mut self, id: SessionId, op: ClientOp, out: &mut Outbox<'_>) -> Result<()> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or(FocusError::UnknownSession(id))?;
        let Some(change) = session.apply_client(op).map_err(rejected)? else {
            return Ok(());
        };
        out.state(change);

        match op {
            ClientOp::Pause => {
                self.release_focus(id, out);
            }
            ClientOp::Stop => {
                // Stopped by the client: nothing to restore it later
                if let Some(session) = self.registry.get_mut(id) {
                    session.unduck();
                }
                self.holds.remove(&id);
                self.release_focus(id, out);
            }
            ClientOp::Prepare | ClientOp::Start | ClientOp::Release => {}
        }
        Ok(())
    }

    /// Returns whether the session was registered.
    fn release(&mut self, id: SessionId, out: &mut Outbox<'_>) -> Result<bool> {
        let Some(session) = self.registry.get_mut(id) else {
            debug!(session_id = %id, "Release of unregistered session");
            return Ok(false);
        };
        if let Some(change) = session.apply_client(ClientOp::Release)? {
            out.state(change);
        }
        self.holds.remove(&id);
        self.release_focus(id, out);
        self.registry.remove(id);
        Ok(true)
    }

    fn invalidate(&mut self, id: SessionId, out: &mut Outbox<'_>) -> Result<()> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or(FocusError::UnknownSession(id))?;
        let state = session.state();
        let change = session
            .apply_system(SystemOp::Invalidate)
            .ok_or(FocusError::IllegalState {
                session: id,
                state,
                op: SystemOp::Invalidate.name(),
            })?;
        session.unduck();
        out.state(change);
        warn!(session_id = %id, from = %state, "Session marked invalid");
        self.holds.remove(&id);
        self.release_focus(id, out);
        Ok(())
    }
}

fn add_hold(
    holds: &mut BTreeMap<SessionId, Vec<Hold>>,
    held: SessionId,
    holder: SessionId,
    verdict: Verdict,
) {
    holds.entry(held).or_default().push(Hold { holder, verdict });
}

/// Holds owned by a stopped session pass to the session that stopped it.
fn transfer_holds(holds: &mut BTreeMap<SessionId, Vec<Hold>>, from: SessionId, to: SessionId) {
    for list in holds.values_mut() {
        for hold in list.iter_mut().filter(|h| h.holder == from) {
            hold.holder = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InterruptType;
    use crate::policy::PolicyRule;
    use crate::state::TransitionCause;
    use crate::types::{ContentType, FocusClass, StreamUsage};
    use std::sync::{Arc, Mutex as StdMutex};

    struct Recorder {
        events: StdMutex<Vec<(SessionId, InterruptEvent)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: StdMutex::new(Vec::new()),
            })
        }

        fn hints(&self, id: SessionId) -> Vec<(InterruptType, InterruptHint)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == id)
                .map(|(_, e)| (e.event_type, e.hint_type))
                .collect()
        }
    }

    impl crate::dispatcher::InterruptListener for Recorder {
        fn on_interrupt(&self, session: SessionId, event: &InterruptEvent) {
            self.events.lock().unwrap().push((session, *event));
        }
    }

    fn arbitrator() -> FocusArbitrator {
        let config = ArbitratorConfig::default().with_default_mode(InterruptMode::Independent);
        FocusArbitrator::new(config)
    }

    fn spawn(arb: &FocusArbitrator, usage: StreamUsage, recorder: &Arc<Recorder>) -> SessionId {
        let spec = SessionSpec::renderer(SessionIntent::new(ContentType::Music, usage));
        let id = arb.create_session(spec).unwrap();
        arb.dispatcher()
            .subscribe(id, crate::dispatcher::Listener::Interrupt(recorder.clone()))
            .unwrap();
        id
    }

    #[test]
    fn test_pause_then_resume() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);

        arb.start(music).unwrap();
        let result = arb.start(call).unwrap();
        assert_eq!(result.verdict_for(music), Some(Verdict::PauseResume));
        assert_eq!(arb.state(music).unwrap(), SessionState::Paused);

        arb.stop(call).unwrap();
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
        assert_eq!(
            rec.hints(music),
            vec![
                (InterruptType::Begin, InterruptHint::Pause),
                (InterruptType::End, InterruptHint::Resume)
            ]
        );
        assert!(rec.hints(call).is_empty());
    }

    #[test]
    fn test_duck_sets_volume() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let alarm = spawn(&arb, StreamUsage::Alarm, &rec);

        arb.start(music).unwrap();
        arb.start(alarm).unwrap();
        let snapshot = arb.session(music).unwrap();
        assert!(snapshot.is_ducked());
        assert_eq!(snapshot.volume_scale(), 0.2);
        assert_eq!(snapshot.state(), SessionState::Running);

        arb.pause(alarm).unwrap();
        assert_eq!(arb.session(music).unwrap().volume_scale(), 1.0);
        assert_eq!(rec.hints(music).last(), Some(&(InterruptType::End, InterruptHint::Unduck)));
    }

    #[test]
    fn test_pause_when_ducked() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let intent = SessionIntent::new(ContentType::Speech, StreamUsage::Audiobook);
        let spec = SessionSpec::renderer(intent).with_pause_when_ducked(true);
        let book = arb.create_session(spec).unwrap();
        arb.dispatcher()
            .subscribe(book, crate::dispatcher::Listener::Interrupt(rec.clone()))
            .unwrap();
        let assistant = spawn(&arb, StreamUsage::VoiceAssistant, &rec);

        arb.start(book).unwrap();
        let result = arb.start(assistant).unwrap();
        assert_eq!(result.verdict_for(book), Some(Verdict::PauseResume));
        assert_eq!(arb.state(book).unwrap(), SessionState::Paused);
    }

    #[test]
    fn test_stop_is_final() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let a = spawn(&arb, StreamUsage::Media, &rec);
        let b = spawn(&arb, StreamUsage::Music, &rec);

        arb.start(a).unwrap();
        arb.start(b).unwrap();
        arb.stop(b).unwrap();

        assert_eq!(arb.state(a).unwrap(), SessionState::Stopped);
        assert_eq!(rec.hints(a), vec![(InterruptType::Begin, InterruptHint::Stop)]);
    }

    #[test]
    fn test_last_duck_hold_unducks() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let nav = spawn(&arb, StreamUsage::Navigation, &rec);
        let first = spawn(&arb, StreamUsage::Alarm, &rec);
        let second = spawn(&arb, StreamUsage::Alarm, &rec);

        arb.start(nav).unwrap();
        arb.start(first).unwrap();
        assert!(arb.session(nav).unwrap().is_ducked());
        arb.start(second).unwrap();
        arb.stop(first).unwrap();
        assert!(arb.session(nav).unwrap().is_ducked(), "still held by second");

        arb.stop(second).unwrap();
        assert!(!arb.session(nav).unwrap().is_ducked());
        assert_eq!(
            rec.hints(nav),
            vec![
                (InterruptType::Begin, InterruptHint::Duck),
                (InterruptType::End, InterruptHint::Unduck)
            ]
        );
    }

    #[test]
    fn test_force_stop_transfers_holds() {
        let policy = InterruptPolicy::with_rules(vec![PolicyRule {
            incumbent: FocusClass::VoiceCommunication,
            candidate: FocusClass::VoiceCommunication,
            verdict: Verdict::Stop,
        }]);
        let arb = FocusArbitrator::new(
            ArbitratorConfig::default()
                .with_default_mode(InterruptMode::Independent)
                .with_policy(policy),
        );
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call1 = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        let call2 = spawn(&arb, StreamUsage::VoiceCommunication, &rec);

        arb.start(music).unwrap();
        arb.start(call1).unwrap();
        arb.start(call2).unwrap();
        assert_eq!(arb.state(call1).unwrap(), SessionState::Stopped);
        assert_eq!(arb.state(music).unwrap(), SessionState::Paused);

        arb.release(call2).unwrap();
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
        let resumes = rec
            .hints(music)
            .into_iter()
            .filter(|h| *h == (InterruptType::End, InterruptHint::Resume))
            .count();
        assert_eq!(resumes, 1);
    }

    #[test]
    fn test_client_stop_while_paused_clears_hold() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);

        arb.start(music).unwrap();
        arb.start(call).unwrap();
        arb.stop(music).unwrap();
        arb.stop(call).unwrap();

        assert_eq!(arb.state(music).unwrap(), SessionState::Stopped);
        assert_eq!(rec.hints(music), vec![(InterruptType::Begin, InterruptHint::Pause)]);
    }

    #[test]
    fn test_deny_touches_nothing() {
        let policy = InterruptPolicy::with_rules(vec![PolicyRule {
            incumbent: FocusClass::VoiceCommunication,
            candidate: FocusClass::Media,
            verdict: Verdict::Deny,
        }]);
        let arb = FocusArbitrator::new(
            ArbitratorConfig::default()
                .with_default_mode(InterruptMode::Independent)
                .with_policy(policy),
        );
        let rec = Recorder::new();
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        let music = spawn(&arb, StreamUsage::Media, &rec);

        arb.start(call).unwrap();
        let err = arb.start(music).unwrap_err();
        assert_eq!(err, FocusError::FocusDenied { session: music, by: call });
        assert_eq!(arb.state(music).unwrap(), SessionState::New);
        assert_eq!(arb.state(call).unwrap(), SessionState::Running);
        assert!(rec.hints(call).is_empty());
    }

    #[test]
    fn test_directions_do_not_compete() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let mic = arb
            .create_session(SessionSpec::capturer(SessionIntent::new(
                ContentType::Unknown,
                StreamUsage::VoiceCommunication,
            )))
            .unwrap();

        arb.start(music).unwrap();
        let result = arb.start(mic).unwrap();
        assert!(result.is_uncontested());
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
    }

    #[test]
    fn test_request_focus_on_running_rejected() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        arb.start(music).unwrap();
        let err = arb.request_focus(music).unwrap_err();
        assert!(matches!(err, FocusError::IllegalState { op: "request focus", .. }));
    }

    #[test]
    fn test_request_focus_on_invalid_rejected() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        arb.start(music).unwrap();
        arb.mark_invalid(call).unwrap();

        let err = arb.request_focus(call).unwrap_err();
        assert_eq!(
            err,
            FocusError::IllegalState {
                session: call,
                state: SessionState::Invalid,
                op: "request focus",
            }
        );
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
        assert!(rec.hints(music).is_empty());
    }

    #[test]
    fn test_parallel_play_candidate_interrupts_nobody() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        arb.set_parallel_play(call, true).unwrap();

        arb.start(music).unwrap();
        let result = arb.start(call).unwrap();
        assert!(result.is_uncontested());
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);

        arb.stop(call).unwrap();
        assert!(rec.hints(music).is_empty());
    }

    #[test]
    fn test_parallel_play_incumbent_is_left_alone() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let spec = SessionSpec::renderer(SessionIntent::new(ContentType::Music, StreamUsage::Media))
            .with_parallel_play(true);
        let music = arb.create_session(spec).unwrap();
        let game = spawn(&arb, StreamUsage::Game, &rec);

        arb.start(music).unwrap();
        arb.start(game).unwrap();
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
        assert_eq!(arb.state(game).unwrap(), SessionState::Running);

        // Back in arbitration, the next same-class start stops it
        arb.set_parallel_play(music, false).unwrap();
        arb.stop(game).unwrap();
        arb.start(game).unwrap();
        assert_eq!(arb.state(music).unwrap(), SessionState::Stopped);
    }

    #[test]
    fn test_release_focus_reports_restored() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);

        arb.start(music).unwrap();
        arb.request_focus(call).unwrap();
        assert_eq!(arb.state(music).unwrap(), SessionState::Paused);

        let restored = arb.release_focus(call).unwrap();
        assert_eq!(restored, vec![(music, InterruptHint::Resume)]);
        assert!(arb.release_focus(call).unwrap().is_empty());
        let missing = SessionId(999);
        assert_eq!(arb.release_focus(missing), Err(FocusError::UnknownSession(missing)));
    }

    #[test]
    fn test_focus_info() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let nav = spawn(&arb, StreamUsage::Navigation, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        let idle = spawn(&arb, StreamUsage::Game, &rec);

        arb.start(nav).unwrap();
        arb.start(music).unwrap();
        arb.start(call).unwrap();

        let info = arb.focus_info();
        let status: Vec<_> = info.iter().map(|i| (i.session, i.status)).collect();
        assert_eq!(
            status,
            vec![
                (music, FocusStatus::Paused),
                (nav, FocusStatus::Paused),
                (call, FocusStatus::Active)
            ]
        );
        assert!(info.iter().all(|i| i.session != idle));
    }

    #[test]
    fn test_mark_invalid_releases_holds() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);

        arb.start(music).unwrap();
        arb.start(call).unwrap();
        arb.mark_invalid(call).unwrap();

        assert_eq!(arb.state(call).unwrap(), SessionState::Invalid);
        assert_eq!(arb.state(music).unwrap(), SessionState::Running);
        assert!(arb.mark_invalid(call).is_err());
        assert!(arb.start(call).is_err());
        arb.release(call).unwrap();
    }

    #[test]
    fn test_state_changes_carry_cause() {
        let arb = arbitrator();
        let rec = Recorder::new();
        let music = spawn(&arb, StreamUsage::Media, &rec);
        let call = spawn(&arb, StreamUsage::VoiceCommunication, &rec);
        let changes = Arc::new(StdMutex::new(Vec::new()));
        let c = Arc::clone(&changes);
        arb.dispatcher()
            .on_state_change(music, move |change: &StateChange| {
                c.lock().unwrap().push((change.to, change.cause))
            })
            .unwrap();

        arb.start(music).unwrap();
        arb.start(call).unwrap();
        arb.stop(call).unwrap();

        assert_eq!(
            *changes.lock().unwrap(),
            vec![
                (SessionState::Running, TransitionCause::Client),
                (SessionState::Paused, TransitionCause::System),
                (SessionState::Running, TransitionCause::System)
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = focusconf::FocusConfig::default();
        config.arbitration.duck_volume = 0.5;
        config.arbitration.default_interrupt_mode = "independent".to_string();
        let arb_config = ArbitratorConfig::from_config(&config).unwrap();
        assert_eq!(arb_config.duck_volume, 0.5);
        assert_eq!(arb_config.default_interrupt_mode, InterruptMode::Independent);

        config.arbitration.duck_volume = 2.0;
        assert!(ArbitratorConfig::from_config(&config).is_err());
    }
}
