//! Layered configuration loading for the audiofocus engine.
//!
//! The engine and the `focusctl` binary both read their settings through this
//! crate, so it keeps its dependency list small.
//!
//! # Sections
//!
//! - **Arbitration** (`ArbitrationConfig`): duck level, the bound on how long a
//!   caller waits for the focus lock, and the interrupt mode new sessions get.
//! - **Policy** (`PolicyConfig`): ordered override rules consulted before the
//!   built-in interrupt table.
//! - **Telemetry** (`TelemetryConfig`): log filter and output format.
//!
//! # Usage
//!
//! ```rust,no_run
//! use focusconf::FocusConfig;
//!
//! let config = FocusConfig::load().expect("Failed to load config");
//! println!("duck volume: {}", config.arbitration.duck_volume);
//! for rule in &config.policy.rules {
//!     println!("{} vs {} -> {}", rule.incumbent, rule.candidate, rule.verdict);
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order. A key set in a later file wins, even when it
//! sets the compiled default:
//! 1. `/etc/audiofocus/config.toml` (system)
//! 2. `~/.config/audiofocus/config.toml` (user)
//! 3. `./audiofocus.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`AUDIOFOCUS_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [arbitration]
//! duck_volume = 0.2
//! lock_timeout_ms = 1000
//! default_interrupt_mode = "share"
//!
//! [telemetry]
//! log_level = "info"
//! format = "pretty"
//!
//! [[policy.rules]]
//! incumbent = "media"
//! candidate = "alarm"
//! verdict = "pause"
//! ```

pub mod arbitration;
pub mod loader;
pub mod telemetry;

pub use arbitration::{ArbitrationConfig, PolicyConfig, PolicyRuleConfig, FOCUS_CLASSES, VERDICTS};
pub use loader::{discover_config_files_with_override, ConfigLayer, ConfigSources};
pub use telemetry::{LogFormat, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Complete audiofocus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FocusConfig {
    #[serde(default)]
    pub arbitration: ArbitrationConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl FocusConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/audiofocus/config.toml`
    /// 3. `~/.config/audiofocus/config.toml`
    /// 4. `./audiofocus.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for the local override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    ///
    /// The merged result is validated once, after env overrides, so a file may
    /// carry a value that a later layer corrects.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = FocusConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let layer = loader::load_layer(&path)?;
            config = loader::apply_layer(config, layer);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Check value ranges and names that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arbitration.validate()?;
        self.policy.validate()?;
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so the output reads like a config file someone wrote
        let mut output = String::new();

        output.push_str("# audiofocus configuration\n\n");

        output.push_str("[arbitration]\n");
        output.push_str(&format!(
            "duck_volume = {}\n",
            self.arbitration.duck_volume
        ));
        output.push_str(&format!(
            "lock_timeout_ms = {}\n",
            self.arbitration.lock_timeout_ms
        ));
        output.push_str(&format!(
            "default_interrupt_mode = \"{}\"\n",
            self.arbitration.default_interrupt_mode
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        output.push_str(&format!("format = \"{}\"\n", self.telemetry.format));

        for rule in &self.policy.rules {
            output.push_str("\n[[policy.rules]]\n");
            output.push_str(&format!("incumbent = \"{}\"\n", rule.incumbent));
            output.push_str(&format!("candidate = \"{}\"\n", rule.candidate));
            output.push_str(&format!("verdict = \"{}\"\n", rule.verdict));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FocusConfig::default();
        assert_eq!(config.arbitration.duck_volume, 0.2);
        assert_eq!(config.arbitration.lock_timeout_ms, 1000);
        assert_eq!(config.arbitration.default_interrupt_mode, "share");
        assert!(config.policy.rules.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml() {
        let mut config = FocusConfig::default();
        config.policy.rules.push(PolicyRuleConfig {
            incumbent: "media".to_string(),
            candidate: "alarm".to_string(),
            verdict: "pause".to_string(),
        });
        let toml = config.to_toml();
        assert!(toml.contains("[arbitration]"));
        assert!(toml.contains("[telemetry]"));
        assert!(toml.contains("[[policy.rules]]"));
        assert!(toml.contains("candidate = \"alarm\""));
    }

    #[test]
    fn test_to_toml_reparses() {
        let mut config = FocusConfig::default();
        config.arbitration.duck_volume = 0.35;
        config.policy.rules.push(PolicyRuleConfig {
            incumbent: "navigation".to_string(),
            candidate: "media".to_string(),
            verdict: "duck".to_string(),
        });
        let reparsed: FocusConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_rule() {
        let mut config = FocusConfig::default();
        config.policy.rules.push(PolicyRuleConfig {
            incumbent: "media".to_string(),
            candidate: "karaoke".to_string(),
            verdict: "stop".to_string(),
        });
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => {
                assert_eq!(field, "policy.rules[0].candidate")
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}
