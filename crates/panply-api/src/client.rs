// Device management API HTTP client
//
// Wraps `reqwest::Client` with firewall-specific URL construction, API key
// injection, bounded retries and envelope unwrapping. Transport errors are
// stripped of their URL, which may carry query parameters. Endpoint groups
// (keygen, config entries, commit/jobs) are inherent methods in separate
// files to keep this module focused on transport mechanics.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::{RestError, RestResponse, XmlApiResponse, parse_xml_response};
use crate::retry::RetryPolicy;
use crate::transport::TransportConfig;

/// Default REST API version segment.
pub const DEFAULT_API_VERSION: &str = "v10.2";

/// Default virtual system for vsys-scoped resources.
pub const DEFAULT_VSYS: &str = "vsys1";

const API_KEY_HEADER: &str = "X-PAN-KEY";

/// Raw HTTP client for a single firewall's management API.
///
/// One client is one authenticated channel: `login` stores the generated
/// API key, and every later call sends it in the `X-PAN-KEY` header.
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    api_version: String,
    vsys: String,
    retry: RetryPolicy,
    api_key: RwLock<Option<SecretString>>,
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the management interface root, e.g. `https://203.0.113.10`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            api_version: DEFAULT_API_VERSION.into(),
            vsys: DEFAULT_VSYS.into(),
            retry: RetryPolicy::default(),
            api_key: RwLock::new(None),
        }
    }

    /// Override the REST API version segment (e.g. `v11.1`).
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Override the virtual system used for vsys-scoped resources.
    pub fn with_vsys(mut self, vsys: impl Into<String>) -> Self {
        self.vsys = vsys.into();
        self
    }

    /// Override the transient-failure retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use an already-issued API key instead of calling `login`.
    pub fn with_api_key(self, key: SecretString) -> Self {
        self.set_api_key(key);
        self
    }

    /// The management interface base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The virtual system used for vsys-scoped resources.
    pub fn vsys(&self) -> &str {
        &self.vsys
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.read().is_ok_and(|g| g.is_some())
    }

    // ── API key management ────────────────────────────────────────────

    pub(crate) fn set_api_key(&self, key: SecretString) {
        debug!("storing API key");
        if let Ok(mut guard) = self.api_key.write() {
            *guard = Some(key);
        }
    }

    fn apply_key(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.api_key.read().map_err(|_| Error::NotAuthenticated)?;
        match guard.as_ref() {
            Some(key) => Ok(builder.header(API_KEY_HEADER, key.expose_secret())),
            None => Err(Error::NotAuthenticated),
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a REST resource URL: `{base}/restapi/{version}/{resource}`.
    ///
    /// Vsys-scoped resources carry `location=vsys&vsys={vsys}`; `name`
    /// selects a single entry.
    pub(crate) fn rest_url(
        &self,
        resource: &str,
        vsys_scoped: bool,
        name: Option<&str>,
    ) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!(
            "{base}/restapi/{}/{}",
            self.api_version,
            resource.trim_start_matches('/')
        ))?;
        {
            let mut query = url.query_pairs_mut();
            if vsys_scoped {
                query.append_pair("location", "vsys");
                query.append_pair("vsys", &self.vsys);
            }
            if let Some(name) = name {
                query.append_pair("name", name);
            }
        }
        Ok(url)
    }

    /// Build an XML-API URL: `{base}/api/?{params}`.
    pub(crate) fn xml_api_url(&self, params: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.xml_api_endpoint()?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// The bare XML-API endpoint, for calls whose parameters travel in a form body.
    pub(crate) fn xml_api_endpoint(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a request built by `build`, retrying transient failures.
    ///
    /// `build` runs once per attempt so each retry sends a fresh request.
    pub(crate) async fn send(
        &self,
        authenticated: bool,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        self.send_with(authenticated, self.retry.max_retries, build).await
    }

    /// Send a non-idempotent request exactly once.
    ///
    /// A lost response may still have been acted on by the device, so a
    /// resend could duplicate the side effect.
    pub(crate) async fn send_once(
        &self,
        authenticated: bool,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        self.send_with(authenticated, 0, build).await
    }

    async fn send_with(
        &self,
        authenticated: bool,
        max_retries: u32,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let mut attempt: u32 = 0;
        loop {
            let mut request = build(&self.http);
            if authenticated {
                request = self.apply_key(request)?;
            }

            let err = match request.send().await {
                Ok(resp) if !is_unavailable(resp.status()) => return Ok(resp),
                Ok(resp) => Error::Unavailable {
                    status: resp.status().as_u16(),
                },
                Err(e) => Error::Transport(e.without_url()),
            };

            if !err.is_transient() || attempt >= max_retries {
                return Err(err);
            }

            let delay = self.retry.backoff(attempt);
            warn!(error = %err, attempt, ?delay, "transient failure, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Parse a REST response, returning the success envelope or an `Error::Api`.
    pub(crate) async fn parse_rest(&self, resp: reqwest::Response) -> Result<RestResponse, Error> {
        let status = resp.status();
        let body = read_body(resp).await?;
        trace!(%status, body = %preview(&body), "REST response");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "API key rejected (HTTP 401)".into(),
            });
        }

        if !status.is_success() {
            return Err(rest_error(status.as_u16(), &body));
        }

        let envelope: RestResponse = if body.trim().is_empty() {
            RestResponse {
                status: Some("success".into()),
                code: None,
                msg: None,
                result: None,
            }
        } else {
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            })?
        };

        match envelope.status.as_deref() {
            Some("error") => Err(rest_error(status.as_u16(), &body)),
            _ => Ok(envelope),
        }
    }

    /// Parse an XML-API response envelope, returning it when `status="success"`.
    ///
    /// Keygen answers carry the API key, so the body is neither logged nor
    /// copied into errors.
    pub(crate) async fn parse_xml_api(
        &self,
        resp: reqwest::Response,
    ) -> Result<XmlApiResponse, Error> {
        let status = resp.status();
        let body = read_body(resp).await?;
        trace!(%status, bytes = body.len(), "XML API response");

        let parsed = parse_xml_response(&body);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let message = parsed
                .map(|r| r.message())
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::Authentication { message });
        }

        if !status.is_success() {
            let message = parsed
                .map(|r| r.message())
                .ok()
                .filter(|m| !m.is_empty())
                .map_or_else(|| format!("HTTP {status}"), |m| format!("HTTP {status}: {m}"));
            return Err(Error::XmlApi {
                code: Some(status.as_u16()),
                message,
            });
        }

        let response = parsed.map_err(|message| Error::Deserialization {
            message: format!("XML API response: {message}"),
            body: String::new(),
        })?;

        if response.status == "success" {
            return Ok(response);
        }

        let message = response.message();
        if Error::is_auth_code(response.code) {
            Err(Error::Authentication { message })
        } else {
            Err(Error::XmlApi {
                code: response.code,
                message,
            })
        }
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
    resp.text()
        .await
        .map_err(|e| Error::Transport(e.without_url()))
}

fn is_unavailable(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn rest_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<RestError>(body) {
        Ok(err) => {
            let details = err.detail_lines();
            let message = err
                .message
                .clone()
                .or_else(|| details.first().cloned())
                .unwrap_or_else(|| format!("HTTP {status}"));
            if Error::is_auth_code(err.code) {
                Error::Authentication { message }
            } else {
                Error::Api {
                    status,
                    code: err.code,
                    message,
                    details,
                }
            }
        }
        Err(_) => Error::Api {
            status,
            code: None,
            message: format!("HTTP {status}: {}", preview(body)),
            details: vec![],
        },
    }
}
