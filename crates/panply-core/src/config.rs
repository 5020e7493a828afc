// ── Runtime apply configuration ──
//
// These types describe *how* to reach a firewall and drive an apply run.
// They carry credential data and tuning, but never touch disk. The CLI
// builds an `ApplyConfig` from its profile and flags and hands it in.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use panply_api::{DEFAULT_API_VERSION, DEFAULT_VSYS, RetryPolicy, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Default: freshly deployed firewalls present a
    /// self-signed certificate.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Everything needed to open one authenticated session to a device.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Management URL (e.g., `https://203.0.113.10`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Virtual system that vsys-scoped objects land in.
    pub vsys: String,
    /// REST API version segment (e.g., `v10.2`).
    pub api_version: String,
    pub retry: RetryPolicy,
    /// Delay between commit job polls.
    pub commit_poll_interval: Duration,
    /// How long a synchronous commit may stay non-terminal.
    pub commit_timeout: Duration,
}

impl SessionConfig {
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            url,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            vsys: DEFAULT_VSYS.into(),
            api_version: DEFAULT_API_VERSION.into(),
            retry: RetryPolicy::default(),
            commit_poll_interval: Duration::from_secs(2),
            commit_timeout: Duration::from_secs(600),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.to_mode(),
            timeout: self.timeout,
        }
    }
}

/// Settings for a full apply run.
///
/// The device address and admin password come from the state provider;
/// everything else is tuning.
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    /// Admin account used for key generation.
    pub username: String,
    /// Overrides the management address resolved from state.
    pub address: Option<String>,
    pub tls: TlsVerification,
    pub timeout: Duration,
    pub vsys: String,
    pub api_version: String,
    pub retry: RetryPolicy,
    pub commit_poll_interval: Duration,
    pub commit_timeout: Duration,
    /// Resolve every name reference locally before contacting the device.
    pub strict: bool,
    /// Abort (before commit) once the run has taken longer than this.
    pub deadline: Option<Duration>,
    /// Credential rotation script, run with `bash`. `None` skips rotation.
    pub rotation_script: Option<PathBuf>,
    /// Upper bound on the rotation script's runtime.
    pub rotation_timeout: Duration,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            address: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            vsys: DEFAULT_VSYS.into(),
            api_version: DEFAULT_API_VERSION.into(),
            retry: RetryPolicy::default(),
            commit_poll_interval: Duration::from_secs(2),
            commit_timeout: Duration::from_secs(600),
            strict: false,
            deadline: None,
            rotation_script: None,
            rotation_timeout: Duration::from_secs(300),
        }
    }
}

impl ApplyConfig {
    /// Session settings for the device at `address`.
    pub fn session_config(
        &self,
        address: &str,
        password: SecretString,
    ) -> Result<SessionConfig, CoreError> {
        let address = self.address.as_deref().unwrap_or(address);
        Ok(SessionConfig {
            url: device_url(address)?,
            username: self.username.clone(),
            password,
            tls: self.tls.clone(),
            timeout: self.timeout,
            vsys: self.vsys.clone(),
            api_version: self.api_version.clone(),
            retry: self.retry.clone(),
            commit_poll_interval: self.commit_poll_interval,
            commit_timeout: self.commit_timeout,
        })
    }
}

/// Turn a management address into the device's base URL.
///
/// Bare hosts and IPs get `https://`; values that already carry a scheme
/// are used as-is.
pub fn device_url(address: &str) -> Result<Url, CoreError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CoreError::InvalidInput {
            key: "address".into(),
            reason: "management address is empty".into(),
        });
    }

    let raw = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_owned()
    } else if let Ok(IpAddr::V6(v6)) = address.parse::<IpAddr>() {
        format!("https://[{v6}]")
    } else {
        format!("https://{address}")
    };

    Url::parse(&raw).map_err(|e| CoreError::InvalidInput {
        key: "address".into(),
        reason: format!("'{address}' is not a valid management address: {e}"),
    })
}
