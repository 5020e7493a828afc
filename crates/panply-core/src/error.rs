// ── Core error types ──
//
// Run-level errors from panply-core. Consumers never see HTTP statuses or
// JSON parse failures directly: the `From<panply_api::Error>` impl
// translates transport errors, and the session re-labels failures with the
// object or commit job they belong to.

use thiserror::Error;

use crate::model::ObjectKind;
use crate::session::SessionState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Missing required input '{key}' from {provider}")]
    InputMissing { key: String, provider: String },

    #[error("Invalid input '{key}': {reason}")]
    InvalidInput { key: String, reason: String },

    #[error("Credential rotation via {script} failed: {reason}")]
    CredentialRotation { script: String, reason: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Apply errors ─────────────────────────────────────────────────
    #[error("Device rejected {kind} '{name}': {reason}")]
    DeviceRejected {
        kind: ObjectKind,
        name: String,
        reason: String,
        /// Device error code, when the device returned one.
        code: Option<u16>,
        /// Device detail lines (offending field paths, causes).
        details: Vec<String>,
    },

    #[error("Commit failed{}: {reason}", job_suffix(.job_id))]
    Commit {
        job_id: Option<u64>,
        reason: String,
        details: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Deadline of {deadline_secs}s exceeded before {step}")]
    DeadlineExceeded { deadline_secs: u64, step: String },

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api { message: String, code: Option<u16> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

#[allow(clippy::ref_option)]
fn job_suffix(job_id: &Option<u64>) -> String {
    job_id.map(|id| format!(" (job {id})")).unwrap_or_default()
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if the failure is worth only a warning: the run continues.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, Self::CredentialRotation { .. })
    }

    /// Re-label an API failure as a rejection of the given object.
    ///
    /// Authentication failures keep their identity; everything else,
    /// exhausted transient retries included, names the object.
    pub(crate) fn rejected(kind: ObjectKind, name: &str, err: panply_api::Error) -> Self {
        if err.is_auth() {
            return err.into();
        }
        let code = err.api_error_code();
        let (reason, details) = match err {
            panply_api::Error::Api {
                message, details, ..
            } => (message, details),
            panply_api::Error::XmlApi { message, .. } => (message, Vec::new()),
            other => (other.to_string(), Vec::new()),
        };
        Self::DeviceRejected {
            kind,
            name: name.to_owned(),
            reason,
            code,
            details,
        }
    }

    /// Re-label an API failure that happened while committing.
    pub(crate) fn commit(job_id: Option<u64>, err: panply_api::Error) -> Self {
        if err.is_auth() {
            return err.into();
        }
        let (reason, details) = match err {
            panply_api::Error::Api {
                message, details, ..
            } => (message, details),
            other => (other.to_string(), Vec::new()),
        };
        Self::Commit {
            job_id,
            reason,
            details,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<panply_api::Error> for CoreError {
    fn from(err: panply_api::Error) -> Self {
        match err {
            panply_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            panply_api::Error::NotAuthenticated => CoreError::AuthenticationFailed {
                message: "no API key -- session is not connected".into(),
            },
            panply_api::Error::Transport(e) => CoreError::ConnectionFailed {
                url: "<unknown>".into(),
                reason: e.without_url().to_string(),
            },
            panply_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            panply_api::Error::Unavailable { status } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("management plane unavailable (HTTP {status})"),
            },
            panply_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            panply_api::Error::Api { message, code, .. }
            | panply_api::Error::XmlApi { message, code } => CoreError::Api { message, code },
            panply_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected device response: {message}"),
                code: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_keeps_device_details() {
        let err = CoreError::rejected(
            ObjectKind::Zone,
            "untrust",
            panply_api::Error::Api {
                status: 400,
                code: Some(3),
                message: "Invalid Object".into(),
                details: vec!["ethernet1/9 is not a valid reference".into()],
            },
        );
        match err {
            CoreError::DeviceRejected {
                kind,
                ref name,
                ref reason,
                code,
                ref details,
            } => {
                assert_eq!(kind, ObjectKind::Zone);
                assert_eq!(name, "untrust");
                assert_eq!(reason, "Invalid Object");
                assert_eq!(code, Some(3));
                assert_eq!(details.len(), 1);
            }
            other => panic!("expected DeviceRejected, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_retries_name_the_object() {
        let err = CoreError::rejected(
            ObjectKind::Interface,
            "ethernet1/1",
            panply_api::Error::Unavailable { status: 503 },
        );
        assert!(matches!(err, CoreError::DeviceRejected { .. }));
        assert!(err.to_string().contains("interface 'ethernet1/1'"), "{err}");
    }

    #[test]
    fn auth_failure_is_not_relabelled() {
        let err = CoreError::commit(Some(7), panply_api::Error::NotAuthenticated);
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[test]
    fn commit_display_includes_job() {
        let err = CoreError::Commit {
            job_id: Some(12),
            reason: "Validation Error".into(),
            details: vec![],
        };
        assert_eq!(err.to_string(), "Commit failed (job 12): Validation Error");

        let err = CoreError::Commit {
            job_id: None,
            reason: "refused".into(),
            details: vec![],
        };
        assert_eq!(err.to_string(), "Commit failed: refused");
    }

    #[test]
    fn unparsable_commit_answer_is_a_commit_failure() {
        let err = CoreError::commit(
            None,
            panply_api::Error::Deserialization {
                message: "XML API response: malformed XML".into(),
                body: String::new(),
            },
        );
        assert!(
            matches!(err, CoreError::Commit { job_id: None, ref reason, .. } if reason.contains("malformed XML")),
            "{err:?}"
        );
    }

    #[test]
    fn unparsable_answer_is_not_internal() {
        let err = CoreError::from(panply_api::Error::Deserialization {
            message: "malformed XML".into(),
            body: String::new(),
        });
        assert!(matches!(err, CoreError::Api { code: None, .. }), "{err:?}");
    }

    #[test]
    fn only_rotation_is_non_fatal() {
        let rotation = CoreError::CredentialRotation {
            script: "rotate.sh".into(),
            reason: "exited with code 1".into(),
        };
        assert!(rotation.is_non_fatal());
        assert!(!CoreError::validation("x").is_non_fatal());
    }
}
