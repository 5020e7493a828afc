// API key generation
//
// `type=keygen` exchanges username/password for an API key. The key is
// stored in the client and sent as `X-PAN-KEY` on every later call.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::DeviceClient;
use crate::error::Error;

impl DeviceClient {
    /// Authenticate with username/password and store the generated API key.
    ///
    /// `POST /api/` with a `type=keygen&user=...&password=...` form body, so
    /// the credentials never appear in a URL.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.xml_api_endpoint()?;
        let form = [
            ("type", "keygen"),
            ("user", username),
            ("password", password.expose_secret()),
        ];

        debug!(username, "generating API key");

        let resp = self
            .send(false, |http| http.post(url.clone()).form(&form))
            .await?;
        let response = self.parse_xml_api(resp).await?;

        let key = response
            .result
            .as_ref()
            .and_then(|r| r.get("key"))
            .and_then(|k| k.as_str())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "keygen response did not contain a key".into(),
            })?;

        self.set_api_key(SecretString::from(key.to_owned()));
        debug!("API key generated");
        Ok(())
    }
}
