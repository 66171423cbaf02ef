//! Arbitration and policy-override settings.

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Names accepted for the `incumbent`/`candidate` side of a policy rule.
pub const FOCUS_CLASSES: &[&str] = &[
    "media",
    "voice_communication",
    "ringtone",
    "voice_assistant",
    "alarm",
    "accessibility",
    "system",
    "notification",
    "navigation",
    "voice_message",
];

/// Names accepted for a policy rule's verdict.
pub const VERDICTS: &[&str] = &["allow", "pause", "duck", "stop", "deny"];

const INTERRUPT_MODES: &[&str] = &["share", "independent"];

/// Tuning knobs for the focus arbitrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Volume scale applied to a ducked session, in `0.0..=1.0`.
    /// Default: 0.2
    #[serde(default = "ArbitrationConfig::default_duck_volume")]
    pub duck_volume: f32,

    /// How long a caller waits for the focus lock before giving up.
    /// Default: 1000
    #[serde(default = "ArbitrationConfig::default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Interrupt mode for sessions created without an explicit one.
    /// Default: share
    #[serde(default = "ArbitrationConfig::default_interrupt_mode")]
    pub default_interrupt_mode: String,
}

impl ArbitrationConfig {
    fn default_duck_volume() -> f32 {
        0.2
    }

    fn default_lock_timeout_ms() -> u64 {
        1000
    }

    fn default_interrupt_mode() -> String {
        "share".to_string()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.duck_volume) {
            return Err(ConfigError::Invalid {
                field: "arbitration.duck_volume".to_string(),
                message: format!("{} is outside 0.0..=1.0", self.duck_volume),
            });
        }
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "arbitration.lock_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        check_name(
            "arbitration.default_interrupt_mode",
            &self.default_interrupt_mode,
            INTERRUPT_MODES,
        )
    }
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            duck_volume: Self::default_duck_volume(),
            lock_timeout_ms: Self::default_lock_timeout_ms(),
            default_interrupt_mode: Self::default_interrupt_mode(),
        }
    }
}

/// One `(incumbent class, candidate class) -> verdict` override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    pub incumbent: String,
    pub candidate: String,
    pub verdict: String,
}

/// Ordered override rules; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rules: Vec<PolicyRuleConfig>,
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, rule) in self.rules.iter().enumerate() {
            check_name(&format!("policy.rules[{i}].incumbent"), &rule.incumbent, FOCUS_CLASSES)?;
            check_name(&format!("policy.rules[{i}].candidate"), &rule.candidate, FOCUS_CLASSES)?;
            check_name(&format!("policy.rules[{i}].verdict"), &rule.verdict, VERDICTS)?;
        }
        Ok(())
    }
}

fn check_name(field: &str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: field.to_string(),
            message: format!("unknown name {:?}, expected one of {}", value, allowed.join(", ")),
        })
    }
}
