//! Scripted focus scenarios, replayed against a fresh `AudioManager`.

use anyhow::{bail, Context, Result};
use audiofocus::{
    AudioCapturerOptions, AudioManager, AudioRendererOptions, ContentType, InterruptEvent,
    InterruptMode, SessionHandle, SessionId, SessionState, SourceType, StateChange, StreamUsage,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sessions: Vec<SessionDef>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    Renderer,
    Capturer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionDef {
    pub name: String,
    #[serde(default)]
    pub kind: SessionKind,
    /// Renderer content; unknown when omitted.
    pub content: Option<ContentType>,
    /// Renderer usage; unknown when omitted.
    pub usage: Option<StreamUsage>,
    /// Capturer source; mic when omitted.
    pub source: Option<SourceType>,
    pub mode: Option<InterruptMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Pause,
    Stop,
    Release,
    SetMode,
    /// Only evaluate the step's expectations.
    Check,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Pause => "pause",
            Action::Stop => "stop",
            Action::Release => "release",
            Action::SetMode => "set_mode",
            Action::Check => "check",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub session: String,
    pub action: Action,
    /// Target of `set_mode`.
    pub mode: Option<InterruptMode>,
    pub expect_state: Option<SessionState>,
    #[serde(default)]
    pub expect_error: bool,
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub session: String,
    pub action: Action,
    /// Error message and code when the call failed.
    pub error: Option<String>,
    /// Events delivered while the step ran, in delivery order.
    pub events: Vec<String>,
    /// Why the step's expectations were not met.
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub name: String,
    pub steps: Vec<StepReport>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.failure.is_some()).count()
    }
}

pub fn load(path: &Path) -> Result<Scenario> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    parse(&contents).with_context(|| format!("Failed to parse scenario {}", path.display()))
}

pub fn parse(contents: &str) -> Result<Scenario> {
    Ok(toml::from_str(contents)?)
}

type EventLog = Arc<Mutex<Vec<String>>>;

fn lock(log: &EventLog) -> MutexGuard<'_, Vec<String>> {
    // A panicking listener must not hide the rest of the run
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open(manager: &AudioManager, def: &SessionDef) -> Result<SessionHandle> {
    let handle = match def.kind {
        SessionKind::Renderer => {
            let options = AudioRendererOptions::new(
                def.content.unwrap_or(ContentType::Unknown),
                def.usage.unwrap_or(StreamUsage::Unknown),
            );
            (*manager.create_audio_renderer(options)?).clone()
        }
        SessionKind::Capturer => {
            let options = AudioCapturerOptions::new(def.source.unwrap_or(SourceType::Mic));
            (*manager.create_audio_capturer(options)?).clone()
        }
    };
    if let Some(mode) = def.mode {
        handle.set_interrupt_mode(mode)?;
    }
    Ok(handle)
}

fn attach(handle: &SessionHandle, name: &str, log: &EventLog) -> Result<()> {
    let (n, l) = (name.to_string(), Arc::clone(log));
    handle.on_interrupt(move |_: SessionId, event: &InterruptEvent| {
        lock(&l).push(format!(
            "{n} <- {:?}/{:?}",
            event.event_type, event.hint_type
        ).to_lowercase());
    })?;

    let (n, l) = (name.to_string(), Arc::clone(log));
    handle.on_state_change(move |change: &StateChange| {
        lock(&l).push(format!(
            "{n}: {} -> {} ({:?})",
            change.from, change.to, change.cause
        ).to_lowercase());
    })?;
    Ok(())
}

pub fn run(manager: &AudioManager, scenario: &Scenario) -> Result<Report> {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let mut handles: HashMap<&str, SessionHandle> = HashMap::new();

    for def in &scenario.sessions {
        let handle = open(manager, def)
            .with_context(|| format!("Failed to create session {:?}", def.name))?;
        attach(&handle, &def.name, &log)?;
        if handles.insert(def.name.as_str(), handle).is_some() {
            bail!("duplicate session name {:?}", def.name);
        }
    }

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        let handle = handles
            .get(step.session.as_str())
            .with_context(|| format!("step {index}: unknown session {:?}", step.session))?;

        let result = match step.action {
            Action::Start => handle.start(),
            Action::Pause => handle.pause(),
            Action::Stop => handle.stop(),
            Action::Release => handle.release(),
            Action::SetMode => {
                let mode = step
                    .mode
                    .with_context(|| format!("step {index}: set_mode needs a mode"))?;
                handle.set_interrupt_mode(mode)
            }
            Action::Check => Ok(()),
        };
        let events = std::mem::take(&mut *lock(&log));

        let mut failure = match (&result, step.expect_error) {
            (Ok(()), true) => Some("expected an error".to_string()),
            (Err(err), false) => Some(format!("unexpected error: {err}")),
            _ => None,
        };
        if let Some(expected) = step.expect_state {
            let actual = handle.state();
            if actual != expected && failure.is_none() {
                failure = Some(format!("expected {expected}, found {actual}"));
            }
        }

        steps.push(StepReport {
            index,
            session: step.session.clone(),
            action: step.action,
            error: result.err().map(|err| format!("{err} (code {})", err.code())),
            events,
            failure,
        });
    }

    Ok(Report {
        name: scenario.name.clone(),
        steps,
    })
}
