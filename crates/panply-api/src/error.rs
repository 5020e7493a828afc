use thiserror::Error;

/// REST error code the device returns when a POST targets an entry that
/// is already present in the candidate configuration.
pub const CODE_OBJECT_EXISTS: u16 = 5;

/// XML-API / REST codes that mean the API key was refused or expired.
const AUTH_CODES: &[u16] = &[16, 22, 403];

/// Top-level error type for the `panply-api` crate.
///
/// Covers every failure mode of the firewall management API: key
/// generation, transport, REST config calls, and the XML-API commit/job
/// endpoints. `panply-core` maps these into run-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Key generation failed or the device refused the API key.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A call that needs an API key was made before `login`.
    #[error("Not authenticated -- call login() first")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The management plane answered with a gateway/unavailable status.
    #[error("Device management plane unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Structured error from a REST config call.
    #[error("Device rejected request (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<u16>,
        message: String,
        /// Flattened `details[].causes[].description` lines.
        details: Vec<String>,
    },

    // ── XML API ─────────────────────────────────────────────────────
    /// `response.@status == "error"` from the XML API (keygen, commit, op).
    #[error("XML API error: {message}")]
    XmlApi {
        code: Option<u16>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Semantic rejections (`Api`, `XmlApi`) are never transient:
    /// resending an invalid definition cannot succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Unavailable { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the device refused the request because the
    /// entry already exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Api { code, message, .. } => {
                *code == Some(CODE_OBJECT_EXISTS)
                    || message.to_ascii_lowercase().contains("already exists")
            }
            _ => false,
        }
    }

    /// Returns `true` if this error means the credentials or key were refused.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotAuthenticated)
    }

    /// Extract the device error code, if available.
    pub fn api_error_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } | Self::XmlApi { code, .. } => *code,
            _ => None,
        }
    }

    pub(crate) fn is_auth_code(code: Option<u16>) -> bool {
        code.is_some_and(|c| AUTH_CODES.contains(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_not_transient() {
        let err = Error::Api {
            status: 400,
            code: Some(12),
            message: "Invalid Object".into(),
            details: vec![],
        };
        assert!(!err.is_transient());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn unavailable_is_transient() {
        assert!(Error::Unavailable { status: 503 }.is_transient());
    }

    #[test]
    fn already_exists_by_code_or_message() {
        let by_code = Error::Api {
            status: 409,
            code: Some(CODE_OBJECT_EXISTS),
            message: "Object Already Exists".into(),
            details: vec![],
        };
        let by_message = Error::Api {
            status: 400,
            code: None,
            message: "ethernet1/1 already exists".into(),
            details: vec![],
        };
        assert!(by_code.is_already_exists());
        assert!(by_message.is_already_exists());
    }
}
