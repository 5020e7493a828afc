//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use panply_config::ConfigError;
use panply_core::CoreError;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const INPUT: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const COMMIT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Inputs ───────────────────────────────────────────────────────

    #[error("Missing required input '{key}' from {provider}")]
    #[diagnostic(
        code(panply::input_missing),
        help(
            "The deployment outputs must define '{key}'.\n\
             Check `terraform output -json`, or pass --state-file with a JSON map."
        )
    )]
    InputMissing { key: String, provider: String },

    #[error("Invalid input '{key}': {reason}")]
    #[diagnostic(code(panply::invalid_input))]
    InvalidInput { key: String, reason: String },

    #[error("Could not load deployment state: {message}")]
    #[diagnostic(
        code(panply::state),
        help("Use --terraform-dir to point at the Terraform root, or --state-file for a JSON file.")
    )]
    State { message: String },

    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to firewall at {url}")]
    #[diagnostic(
        code(panply::connection_failed),
        help(
            "{reason}\n\
             Check that the management interface is reachable.\n\
             Freshly booted firewalls can take several minutes to accept logins."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(panply::auth_failed),
        help(
            "Verify the admin_password output and --username.\n\
             If the rotation script failed, the device may still hold the old password."
        )
    )]
    AuthFailed { message: String },

    // ── Apply ────────────────────────────────────────────────────────

    #[error("Firewall rejected {object}: {reason}")]
    #[diagnostic(code(panply::rejected), help("{details}"))]
    Rejected {
        object: String,
        reason: String,
        details: String,
    },

    #[error("Commit failed{job}: {reason}")]
    #[diagnostic(code(panply::commit_failed), help("{details}"))]
    CommitFailed {
        job: String,
        reason: String,
        details: String,
    },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Deadline of {seconds}s exceeded before {step}")]
    #[diagnostic(
        code(panply::deadline),
        help("Nothing was committed. Raise --deadline or the profile's deadline and re-run.")
    )]
    Deadline { seconds: u64, step: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(panply::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(panply::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(panply::config))]
    Config { message: String },

    // ── Other ────────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(code(panply::general))]
    General { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(panply::output))]
    Output(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputMissing { .. } | Self::InvalidInput { .. } | Self::State { .. } => {
                exit_code::INPUT
            }
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::CommitFailed { .. } => exit_code::COMMIT,
            Self::Deadline { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn detail_lines(details: &[String]) -> String {
    if details.is_empty() {
        "The device returned no further detail.".into()
    } else {
        details.join("\n")
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InputMissing { key, provider } => CliError::InputMissing { key, provider },

            CoreError::InvalidInput { key, reason } => CliError::InvalidInput { key, reason },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::DeviceRejected {
                kind,
                name,
                reason,
                code,
                details,
            } => CliError::Rejected {
                object: format!("{kind} '{name}'"),
                reason: match code {
                    Some(code) => format!("{reason} (code {code})"),
                    None => reason,
                },
                details: detail_lines(&details),
            },

            CoreError::Commit {
                job_id,
                reason,
                details,
            } => CliError::CommitFailed {
                job: job_id.map(|id| format!(" (job {id})")).unwrap_or_default(),
                reason,
                details: detail_lines(&details),
            },

            CoreError::DeadlineExceeded {
                deadline_secs,
                step,
            } => CliError::Deadline {
                seconds: deadline_secs,
                step,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::State { message },

            other @ (CoreError::CredentialRotation { .. }
            | CoreError::InvalidState { .. }
            | CoreError::Api { .. }
            | CoreError::Internal(_)) => CliError::General {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use panply_core::ObjectKind;

    use super::*;

    #[test]
    fn rejection_maps_to_its_own_exit_code() {
        let err = CliError::from(CoreError::DeviceRejected {
            kind: ObjectKind::Zone,
            name: "untrust".into(),
            reason: "Invalid Object".into(),
            code: Some(3),
            details: vec!["untrust -> network is invalid".into()],
        });
        assert_eq!(err.exit_code(), exit_code::REJECTED);
        assert_eq!(
            err.to_string(),
            "Firewall rejected zone 'untrust': Invalid Object (code 3)"
        );
    }

    #[test]
    fn commit_failure_keeps_job_id() {
        let err = CliError::from(CoreError::Commit {
            job_id: Some(7),
            reason: "Validation Error".into(),
            details: Vec::new(),
        });
        assert_eq!(err.exit_code(), exit_code::COMMIT);
        assert_eq!(err.to_string(), "Commit failed (job 7): Validation Error");
    }

    #[test]
    fn missing_input_and_deadline_codes() {
        let missing = CliError::from(CoreError::InputMissing {
            key: "admin_password".into(),
            provider: "outputs.json".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::INPUT);

        let late = CliError::from(CoreError::DeadlineExceeded {
            deadline_secs: 0,
            step: "commit".into(),
        });
        assert_eq!(late.exit_code(), exit_code::TIMEOUT);
    }
}
