// Config entry endpoints
//
// Every config object is a named entry of a REST resource, e.g.
// `Network/EthernetInterfaces` or `Policies/SecurityRules`. Requests and
// responses wrap definitions as `{"entry": {...}}` / `{"result": {"entry": [...]}}`.

use serde_json::{Value, json};
use tracing::debug;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::models::{RulePosition, UpsertOutcome};

impl DeviceClient {
    /// Create a new entry in the candidate configuration.
    ///
    /// `POST /restapi/{v}/{resource}?[location=vsys&vsys=..&]name={name}`
    pub async fn create_entry(
        &self,
        resource: &str,
        vsys_scoped: bool,
        name: &str,
        entry: &Value,
    ) -> Result<(), Error> {
        let url = self.rest_url(resource, vsys_scoped, Some(name))?;
        debug!(resource, entry = name, "POST {}", url);
        let body = json!({ "entry": entry });
        let resp = self
            .send(true, |http| http.post(url.clone()).json(&body))
            .await?;
        self.parse_rest(resp).await?;
        Ok(())
    }

    /// Replace an existing entry with a new definition.
    ///
    /// `PUT /restapi/{v}/{resource}?[location=vsys&vsys=..&]name={name}`
    pub async fn replace_entry(
        &self,
        resource: &str,
        vsys_scoped: bool,
        name: &str,
        entry: &Value,
    ) -> Result<(), Error> {
        let url = self.rest_url(resource, vsys_scoped, Some(name))?;
        debug!(resource, entry = name, "PUT {}", url);
        let body = json!({ "entry": entry });
        let resp = self
            .send(true, |http| http.put(url.clone()).json(&body))
            .await?;
        self.parse_rest(resp).await?;
        Ok(())
    }

    /// Create the entry, or replace it if the device reports it already exists.
    ///
    /// Re-running the same definition converges to the same candidate state.
    pub async fn upsert_entry(
        &self,
        resource: &str,
        vsys_scoped: bool,
        name: &str,
        entry: &Value,
    ) -> Result<UpsertOutcome, Error> {
        match self.create_entry(resource, vsys_scoped, name, entry).await {
            Ok(()) => Ok(UpsertOutcome::Created),
            Err(e) if e.is_already_exists() => {
                debug!(resource, entry = name, "entry exists, replacing");
                self.replace_entry(resource, vsys_scoped, name, entry)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// List all entries of a resource, in device order.
    ///
    /// `GET /restapi/{v}/{resource}?[location=vsys&vsys=..]`
    pub async fn list_entries(&self, resource: &str, vsys_scoped: bool) -> Result<Vec<Value>, Error> {
        let url = self.rest_url(resource, vsys_scoped, None)?;
        debug!(resource, "GET {}", url);
        let resp = self.send(true, |http| http.get(url.clone())).await?;
        let envelope = self.parse_rest(resp).await?;
        Ok(envelope.result.map(|r| r.entry).unwrap_or_default())
    }

    /// Move a rule within its rulebase.
    ///
    /// `POST /restapi/{v}/{resource}:move?location=vsys&vsys=..&name=..&where=top|after[&dst=..]`
    pub async fn move_entry(
        &self,
        resource: &str,
        name: &str,
        position: &RulePosition,
    ) -> Result<(), Error> {
        let mut url = self.rest_url(&format!("{resource}:move"), true, Some(name))?;
        {
            let mut query = url.query_pairs_mut();
            match position {
                RulePosition::Top => {
                    query.append_pair("where", "top");
                }
                RulePosition::After(dst) => {
                    query.append_pair("where", "after");
                    query.append_pair("dst", dst);
                }
            }
        }
        debug!(resource, entry = name, ?position, "moving rule");
        let resp = self.send(true, |http| http.post(url.clone())).await?;
        self.parse_rest(resp).await?;
        Ok(())
    }
}

/// Extract the `@name` of each entry, preserving order.
pub fn entry_names(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.get("@name").and_then(Value::as_str))
        .map(String::from)
        .collect()
}
