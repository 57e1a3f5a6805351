//! Persistent configuration handling for selection-capture.
//!
//! Persists configuration in a JSON file:
//! `~/.config/selection-capture/config.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::capture::CaptureOptions;
use crate::command::{ScriptInterpreter, ScriptJob, DEFAULT_SCRIPT_TIMEOUT};
use crate::strategy::{Strategy, StrategySet};

const APP_CONFIG_DIR_NAME: &str = "selection-capture";
const CONFIG_FILE_NAME: &str = "config.json";

/// Timeout for keystroke and menu automation commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// What a clipboard-touching call does while another one is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPolicy {
    /// Wait for the running call to finish.
    #[default]
    Queue,
    /// Fail immediately with `Busy`.
    Reject,
}

impl FlightPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "queue" => Some(Self::Queue),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Reject => "reject",
        }
    }
}

/// A copy script for one application, keyed by name or bundle id in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppScript {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AppScript {
    pub fn to_job(&self, app_key: &str) -> ScriptJob {
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SCRIPT_TIMEOUT);
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{app_key} copy"));
        ScriptJob::new(self.source.clone())
            .with_timeout(timeout)
            .named(name)
    }
}

/// Effective settings after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: LogLevel,
    pub strategies: StrategySet,
    pub capture: CaptureOptions,
    pub command_timeout: Duration,
    pub flight_policy: FlightPolicy,
    pub mute_alert_volume: bool,
    pub script_interpreter: ScriptInterpreter,
    pub app_scripts: BTreeMap<String, AppScript>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            strategies: StrategySet::default(),
            capture: CaptureOptions::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            flight_policy: FlightPolicy::default(),
            mute_alert_volume: false,
            script_interpreter: ScriptInterpreter::default(),
            app_scripts: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Pretty JSON in the on-disk format.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&RawConfig::from(self))?)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    strategies: Option<Vec<String>>,
    #[serde(default)]
    preserve_clipboard: Option<bool>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    poll_timeout_ms: Option<u64>,
    #[serde(default)]
    restore_delay_ms: Option<u64>,
    #[serde(default)]
    command_timeout_ms: Option<u64>,
    #[serde(default)]
    flight_policy: Option<String>,
    #[serde(default)]
    mute_alert_volume: Option<bool>,
    #[serde(default)]
    script_interpreter: Option<ScriptInterpreter>,
    #[serde(default)]
    app_scripts: Option<BTreeMap<String, AppScript>>,
}

fn parse_strategies(names: &[String]) -> StrategySet {
    let mut set = StrategySet::new(Vec::new());
    for name in names {
        match name.parse::<Strategy>() {
            Ok(strategy) => set.push(strategy),
            Err(err) => warn!(error = %err, "Ignoring unknown strategy in config"),
        }
    }
    if set.is_empty() {
        warn!("No usable strategies in config, using default order");
        return StrategySet::default();
    }
    set
}

impl From<RawConfig> for Settings {
    fn from(raw: RawConfig) -> Self {
        let defaults = Settings::default();
        let ms = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        Self {
            log_level: raw
                .log_level
                .as_deref()
                .and_then(LogLevel::from_str)
                .unwrap_or(defaults.log_level),
            strategies: raw
                .strategies
                .as_deref()
                .map(parse_strategies)
                .unwrap_or(defaults.strategies),
            capture: CaptureOptions {
                preserve_original: raw
                    .preserve_clipboard
                    .unwrap_or(defaults.capture.preserve_original),
                restore_delay: ms(raw.restore_delay_ms, defaults.capture.restore_delay),
                poll_interval: ms(raw.poll_interval_ms, defaults.capture.poll_interval),
                poll_timeout: ms(raw.poll_timeout_ms, defaults.capture.poll_timeout),
            },
            command_timeout: ms(raw.command_timeout_ms, defaults.command_timeout),
            flight_policy: raw
                .flight_policy
                .as_deref()
                .and_then(FlightPolicy::from_str)
                .unwrap_or(defaults.flight_policy),
            mute_alert_volume: raw.mute_alert_volume.unwrap_or(defaults.mute_alert_volume),
            script_interpreter: raw
                .script_interpreter
                .filter(|i| !i.program.is_empty())
                .unwrap_or(defaults.script_interpreter),
            app_scripts: raw
                .app_scripts
                .unwrap_or_default()
                .into_iter()
                .filter(|(_, script)| !script.source.trim().is_empty())
                .collect(),
        }
    }
}

impl From<&Settings> for RawConfig {
    fn from(settings: &Settings) -> Self {
        let ms = |d: Duration| Some(d.as_millis() as u64);
        Self {
            log_level: Some(settings.log_level.as_str().to_string()),
            strategies: Some(settings.strategies.iter().map(|s| s.to_string()).collect()),
            preserve_clipboard: Some(settings.capture.preserve_original),
            poll_interval_ms: ms(settings.capture.poll_interval),
            poll_timeout_ms: ms(settings.capture.poll_timeout),
            restore_delay_ms: ms(settings.capture.restore_delay),
            command_timeout_ms: ms(settings.command_timeout),
            flight_policy: Some(settings.flight_policy.as_str().to_string()),
            mute_alert_volume: Some(settings.mute_alert_volume),
            script_interpreter: Some(settings.script_interpreter.clone()),
            app_scripts: (!settings.app_scripts.is_empty()).then(|| settings.app_scripts.clone()),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    let path = config_dir()?
        .join(APP_CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    Some(path)
}

fn ensure_config_dir_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_raw_config(path: &Path) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(RawConfig::default());
    }

    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

fn save_raw_config(path: &Path, mut cfg: RawConfig) -> Result<(), ConfigError> {
    ensure_config_dir_exists(path)?;
    cfg.log_level = cfg.log_level.filter(|s| !s.is_empty());
    cfg.flight_policy = cfg.flight_policy.filter(|s| !s.is_empty());

    let data = serde_json::to_string_pretty(&cfg)?;
    fs::write(path, data)?;
    debug!(?path, "Config saved");
    Ok(())
}

/// Reads settings from `path`; a missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    load_raw_config(path).map(Settings::from)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    save_raw_config(path, RawConfig::from(settings))
}

/// Settings from the default location. A broken file is logged and ignored.
pub fn load_settings() -> Settings {
    let Some(path) = config_path() else {
        debug!("No config_dir available, using defaults only");
        return Settings::default();
    };
    match load_settings_from(&path) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(error = ?err, ?path, "Failed to load config, using defaults");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_settings_to(&path, settings)
}
