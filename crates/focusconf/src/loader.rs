//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, FocusConfig, LogFormat, PolicyRuleConfig};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/audiofocus/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("audiofocus/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("audiofocus.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// One config file as written: every key is optional.
///
/// A key counts as set when it appears in the file, even if its value equals
/// the compiled default, so a later file can restore a default that an
/// earlier file changed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub arbitration: ArbitrationLayer,

    #[serde(default)]
    pub policy: PolicyLayer,

    #[serde(default)]
    pub telemetry: TelemetryLayer,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArbitrationLayer {
    pub duck_volume: Option<f32>,
    pub lock_timeout_ms: Option<u64>,
    pub default_interrupt_mode: Option<String>,
}

/// `rules = []` is a set value and clears inherited rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PolicyLayer {
    pub rules: Option<Vec<PolicyRuleConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TelemetryLayer {
    pub log_level: Option<String>,
    pub format: Option<LogFormat>,
}

/// Read one config file. Keys it leaves out stay unset.
pub fn load_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_layer(&contents, path)
}

pub fn parse_layer(contents: &str, path: &Path) -> Result<ConfigLayer, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `layer` on top of `base`. Every key the layer sets wins.
pub fn apply_layer(mut base: FocusConfig, layer: ConfigLayer) -> FocusConfig {
    let ConfigLayer {
        arbitration,
        policy,
        telemetry,
    } = layer;

    if let Some(volume) = arbitration.duck_volume {
        base.arbitration.duck_volume = volume;
    }
    if let Some(ms) = arbitration.lock_timeout_ms {
        base.arbitration.lock_timeout_ms = ms;
    }
    if let Some(mode) = arbitration.default_interrupt_mode {
        base.arbitration.default_interrupt_mode = mode;
    }

    if let Some(rules) = policy.rules {
        base.policy.rules = rules;
    }

    if let Some(level) = telemetry.log_level {
        base.telemetry.log_level = level;
    }
    if let Some(format) = telemetry.format {
        base.telemetry.format = format;
    }

    base
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut FocusConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup, so tests need not touch the process env.
///
/// Values that fail to parse are skipped and not reported as sources.
pub fn apply_overrides_from<F>(config: &mut FocusConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("AUDIOFOCUS_DUCK_VOLUME") {
        if let Ok(volume) = v.parse() {
            config.arbitration.duck_volume = volume;
            sources.env_overrides.push("AUDIOFOCUS_DUCK_VOLUME".to_string());
        }
    }
    if let Some(v) = lookup("AUDIOFOCUS_LOCK_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.arbitration.lock_timeout_ms = ms;
            sources.env_overrides.push("AUDIOFOCUS_LOCK_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("AUDIOFOCUS_DEFAULT_MODE") {
        config.arbitration.default_interrupt_mode = v.to_lowercase();
        sources.env_overrides.push("AUDIOFOCUS_DEFAULT_MODE".to_string());
    }

    if let Some(v) = lookup("AUDIOFOCUS_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("AUDIOFOCUS_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
    if let Some(v) = lookup("AUDIOFOCUS_LOG_FORMAT") {
        let format = match v.to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        };
        if let Some(format) = format {
            config.telemetry.format = format;
            sources.env_overrides.push("AUDIOFOCUS_LOG_FORMAT".to_string());
        }
    }
}
