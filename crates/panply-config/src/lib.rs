//! Shared configuration for the panply CLI.
//!
//! TOML profiles, `PANPLY_*` environment overrides, state-source selection,
//! and translation to `panply_core::ApplyConfig`. The CLI layers its flags
//! on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use panply_core::apply::deadline_from_secs;
use panply_core::{
    ApplyConfig, DEFAULT_API_VERSION, DEFAULT_VSYS, RetryPolicy, TlsVerification,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' is not defined in the config file")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named deployment profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Accept self-signed device certificates unless a profile says otherwise.
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_vsys")]
    pub vsys: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Retries for transient transport failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds a synchronous commit may take.
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout: u64,

    /// Seconds between commit job polls.
    #[serde(default = "default_poll_interval")]
    pub commit_poll_interval: u64,

    /// Credential rotation script, run with bash before connecting.
    #[serde(default = "default_rotation_script")]
    pub rotation_script: Option<PathBuf>,

    #[serde(default)]
    pub strict: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: true,
            timeout: default_timeout(),
            username: default_username(),
            vsys: default_vsys(),
            api_version: default_api_version(),
            retries: default_retries(),
            commit_timeout: default_commit_timeout(),
            commit_poll_interval: default_poll_interval(),
            rotation_script: default_rotation_script(),
            strict: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_username() -> String {
    "admin".into()
}
fn default_vsys() -> String {
    DEFAULT_VSYS.into()
}
fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}
fn default_retries() -> u32 {
    3
}
fn default_commit_timeout() -> u64 {
    600
}
fn default_poll_interval() -> u64 {
    2
}
fn default_rotation_script() -> Option<PathBuf> {
    Some(PathBuf::from(panply_core::rotation::DEFAULT_SCRIPT))
}

/// A named deployment: where its state lives and how to reach the device.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Directory to run `terraform output -json` in.
    pub terraform_dir: Option<PathBuf>,

    /// JSON file of inputs (flat or Terraform output shape).
    pub state_file: Option<PathBuf>,

    /// Management address; overrides the state's `vmseries_mgmt_public_ip`.
    pub address: Option<String>,

    pub username: Option<String>,
    pub vsys: Option<String>,
    pub api_version: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    pub retries: Option<u32>,
    pub commit_timeout: Option<u64>,
    pub commit_poll_interval: Option<u64>,

    /// Overall run deadline (seconds); 0 disables it.
    pub deadline: Option<u64>,

    pub rotation_script: Option<PathBuf>,

    /// Set to false to skip credential rotation.
    pub rotate: Option<bool>,

    pub strict: Option<bool>,
}

/// Where run inputs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSource {
    Terraform(PathBuf),
    File(PathBuf),
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "panply", "panply").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("panply");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// Nested keys use a double underscore: `PANPLY_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PANPLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

impl Config {
    /// Pick the active profile.
    ///
    /// An explicitly requested profile must exist; the default profile may
    /// be absent, in which case only `[defaults]` apply.
    pub fn profile(&self, requested: Option<&str>) -> Result<(String, Profile), ConfigError> {
        if let Some(name) = requested {
            return self
                .profiles
                .get(name)
                .cloned()
                .map(|p| (name.to_owned(), p))
                .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() });
        }
        let name = self
            .default_profile
            .clone()
            .unwrap_or_else(|| "default".into());
        let profile = self.profiles.get(&name).cloned().unwrap_or_default();
        Ok((name, profile))
    }
}

/// Where the profile's inputs come from. Defaults to Terraform in the
/// working directory.
pub fn state_source(profile: &Profile) -> Result<StateSource, ConfigError> {
    match (&profile.state_file, &profile.terraform_dir) {
        (Some(_), Some(_)) => Err(ConfigError::Validation {
            field: "state_file".into(),
            reason: "set either state_file or terraform_dir, not both".into(),
        }),
        (Some(file), None) => Ok(StateSource::File(file.clone())),
        (None, Some(dir)) => Ok(StateSource::Terraform(dir.clone())),
        (None, None) => Ok(StateSource::Terraform(PathBuf::from("."))),
    }
}

/// Build an `ApplyConfig` from defaults and a profile, no CLI overrides.
pub fn profile_to_apply_config(
    defaults: &Defaults,
    profile: &Profile,
) -> Result<ApplyConfig, ConfigError> {
    let username = profile
        .username
        .clone()
        .unwrap_or_else(|| defaults.username.clone());
    if username.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "username".into(),
            reason: "must not be empty".into(),
        });
    }

    let tls = match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca)) => TlsVerification::CustomCa(ca.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        (None, None) if defaults.insecure => TlsVerification::DangerAcceptInvalid,
        (None, None) => TlsVerification::SystemDefaults,
    };

    let poll = profile
        .commit_poll_interval
        .unwrap_or(defaults.commit_poll_interval);
    if poll == 0 {
        return Err(ConfigError::Validation {
            field: "commit_poll_interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let rotation_script = if profile.rotate == Some(false) {
        None
    } else {
        profile
            .rotation_script
            .clone()
            .or_else(|| defaults.rotation_script.clone())
    };

    Ok(ApplyConfig {
        username,
        address: profile.address.clone(),
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        vsys: profile.vsys.clone().unwrap_or_else(|| defaults.vsys.clone()),
        api_version: profile
            .api_version
            .clone()
            .unwrap_or_else(|| defaults.api_version.clone()),
        retry: RetryPolicy {
            max_retries: profile.retries.unwrap_or(defaults.retries),
            ..RetryPolicy::default()
        },
        commit_poll_interval: Duration::from_secs(poll),
        commit_timeout: Duration::from_secs(
            profile.commit_timeout.unwrap_or(defaults.commit_timeout),
        ),
        strict: profile.strict.unwrap_or(defaults.strict),
        deadline: profile.deadline.and_then(deadline_from_secs),
        rotation_script,
        ..ApplyConfig::default()
    })
}
