//! Interrupt policy: what happens to a running session when another starts.
//!
//! [`decide`] is the built-in table. [`InterruptPolicy`] puts configured
//! override rules in front of it.

use crate::error::{FocusError, Result};
use crate::event::InterruptHint;
use crate::types::{FocusClass, SessionIntent, StreamUsage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome for one incumbent when a candidate starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Both keep playing.
    Allow,
    /// Incumbent is paused now and resumed when the candidate lets go.
    PauseResume,
    /// Incumbent is ducked now and unducked when the candidate lets go.
    DuckUnduck,
    /// Incumbent is stopped for good.
    Stop,
    /// Candidate is refused. Only produced by override rules.
    Deny,
}

impl Verdict {
    pub const ALL: [Verdict; 5] = [
        Verdict::Allow,
        Verdict::PauseResume,
        Verdict::DuckUnduck,
        Verdict::Stop,
        Verdict::Deny,
    ];

    /// Name used in config files.
    pub fn name(self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::PauseResume => "pause",
            Verdict::DuckUnduck => "duck",
            Verdict::Stop => "stop",
            Verdict::Deny => "deny",
        }
    }

    /// Hint sent to the incumbent when the verdict is applied.
    pub fn begin_hint(self) -> Option<InterruptHint> {
        match self {
            Verdict::PauseResume => Some(InterruptHint::Pause),
            Verdict::DuckUnduck => Some(InterruptHint::Duck),
            Verdict::Stop => Some(InterruptHint::Stop),
            Verdict::Allow | Verdict::Deny => None,
        }
    }

    /// Hint sent when the hold created by this verdict is dropped.
    pub fn end_hint(self) -> Option<InterruptHint> {
        match self {
            Verdict::PauseResume => Some(InterruptHint::Resume),
            Verdict::DuckUnduck => Some(InterruptHint::Unduck),
            _ => None,
        }
    }

    /// Whether applying this verdict leaves a hold to undo later.
    pub fn is_temporary(self) -> bool {
        self.end_hint().is_some()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Verdict {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s)
            .ok_or_else(|| FocusError::IllegalValue(format!("unknown verdict {s:?}")))
    }
}

/// Built-in decision table. First match wins, anything unlisted is `Allow`.
pub fn decide(incumbent: SessionIntent, candidate: SessionIntent) -> Verdict {
    match candidate.usage {
        StreamUsage::VoiceCommunication | StreamUsage::NotificationRingtone => Verdict::PauseResume,
        StreamUsage::VoiceAssistant | StreamUsage::Alarm => Verdict::DuckUnduck,
        StreamUsage::Accessibility => Verdict::PauseResume,
        _ if incumbent.focus_class() == candidate.focus_class() => Verdict::Stop,
        _ => Verdict::Allow,
    }
}

/// One configured override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub incumbent: FocusClass,
    pub candidate: FocusClass,
    pub verdict: Verdict,
}

impl PolicyRule {
    fn matches(&self, incumbent: SessionIntent, candidate: SessionIntent) -> bool {
        self.incumbent == incumbent.focus_class() && self.candidate == candidate.focus_class()
    }
}

/// Override rules consulted before the built-in table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterruptPolicy {
    rules: Vec<PolicyRule>,
}

impl InterruptPolicy {
    pub fn with_rules(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Build from the `[[policy.rules]]` section of a config.
    pub fn from_config(config: &focusconf::PolicyConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                Ok(PolicyRule {
                    incumbent: parse_class(&rule.incumbent)?,
                    candidate: parse_class(&rule.candidate)?,
                    verdict: rule.verdict.parse()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn decide(&self, incumbent: SessionIntent, candidate: SessionIntent) -> Verdict {
        self.rules
            .iter()
            .find(|rule| rule.matches(incumbent, candidate))
            .map(|rule| rule.verdict)
            .unwrap_or_else(|| decide(incumbent, candidate))
    }
}

fn parse_class(name: &str) -> Result<FocusClass> {
    name.parse()
        .map_err(|e: crate::types::ParseEnumError| FocusError::IllegalValue(e.to_string()))
}
