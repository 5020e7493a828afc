// ── State providers ──
//
// Key/value inputs produced by the infrastructure stage: management IP,
// subnets, private addresses, the admin password. Two providers: a
// static map (from a JSON file or built in code) and Terraform outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::CoreError;

/// Read-only source of named input values.
pub trait StateProvider: Send + Sync {
    /// Human-readable origin, used in error messages.
    fn source(&self) -> &str;

    fn get(&self, key: &str) -> Option<&Value>;

    /// Look up `key` or fail naming it.
    fn require(&self, key: &str) -> Result<&Value, CoreError> {
        self.get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| CoreError::InputMissing {
                key: key.to_owned(),
                provider: self.source().to_owned(),
            })
    }

    /// Look up `key` as a non-empty scalar string.
    fn require_str(&self, key: &str) -> Result<String, CoreError> {
        match self.require(key)? {
            Value::String(s) if s.trim().is_empty() => Err(CoreError::InputMissing {
                key: key.to_owned(),
                provider: self.source().to_owned(),
            }),
            Value::String(s) => Ok(s.trim().to_owned()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(CoreError::InvalidInput {
                key: key.to_owned(),
                reason: format!("expected a string, got {other}"),
            }),
        }
    }
}

// ── Static map ───────────────────────────────────────────────────────

/// In-memory inputs, from a JSON document or built directly.
#[derive(Debug, Clone, Default)]
pub struct StaticState {
    source: String,
    values: BTreeMap<String, Value>,
}

impl StaticState {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn from_pairs<K, V>(source: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = Self::new(source);
        for (k, v) in pairs {
            state.insert(k, v);
        }
        state
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Parse a JSON object of inputs.
    ///
    /// Accepts a flat `{"key": value}` map or Terraform's output shape
    /// `{"key": {"value": ..., "type": ..., "sensitive": ...}}`.
    pub fn from_json_str(source: impl Into<String>, json: &str) -> Result<Self, CoreError> {
        let source = source.into();
        let parsed: Value = serde_json::from_str(json).map_err(|e| CoreError::Config {
            message: format!("{source} is not valid JSON: {e}"),
        })?;
        let Value::Object(map) = parsed else {
            return Err(CoreError::Config {
                message: format!("{source} must contain a JSON object of inputs"),
            });
        };

        let values = map
            .into_iter()
            .map(|(k, v)| (k, unwrap_output(v)))
            .collect();
        Ok(Self { source, values })
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            message: format!("cannot read state file {}: {e}", path.display()),
        })?;
        Self::from_json_str(format!("state file {}", path.display()), &contents)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StateProvider for StaticState {
    fn source(&self) -> &str {
        &self.source
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

fn unwrap_output(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("value") => {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ── Terraform outputs ────────────────────────────────────────────────

/// Reads inputs with `terraform output -json` in a working directory.
#[derive(Debug, Clone)]
pub struct TerraformState {
    dir: PathBuf,
    binary: String,
}

impl TerraformState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            binary: "terraform".into(),
        }
    }

    /// Use a different executable (e.g. `tofu`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run the output command and snapshot the result.
    pub async fn load(&self) -> Result<StaticState, CoreError> {
        debug!(dir = %self.dir.display(), binary = %self.binary, "reading terraform outputs");

        let output = Command::new(&self.binary)
            .args(["output", "-json"])
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CoreError::Config {
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    format!("'{}' not found on PATH", self.binary)
                } else {
                    format!("failed to run '{} output': {e}", self.binary)
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::Config {
                message: format!(
                    "'{} output -json' in {} failed ({}): {}",
                    self.binary,
                    self.dir.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let state = StaticState::from_json_str(
            format!("terraform outputs in {}", self.dir.display()),
            &stdout,
        )?;
        debug!(
            count = state.len(),
            keys = ?state.keys().collect::<Vec<_>>(),
            "terraform outputs loaded"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_map() {
        let state = StaticState::from_json_str("test", r#"{"a": "1", "b": 2}"#).unwrap();
        assert_eq!(state.require_str("a").unwrap(), "1");
        assert_eq!(state.require_str("b").unwrap(), "2");
    }

    #[test]
    fn terraform_output_shape() {
        let state = StaticState::from_json_str(
            "test",
            r#"{"admin_password": {"sensitive": true, "type": "string", "value": "s3cret"}}"#,
        )
        .unwrap();
        assert_eq!(state.require_str("admin_password").unwrap(), "s3cret");
    }

    #[test]
    fn keys_are_sorted_and_values_unwrapped() {
        let state = StaticState::from_json_str(
            "test",
            r#"{"untrust_subnet_cidr": {"value": "10.0.1.0/24"}, "admin_password": "x"}"#,
        )
        .unwrap();
        assert_eq!(
            state.keys().collect::<Vec<_>>(),
            vec!["admin_password", "untrust_subnet_cidr"]
        );
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn missing_key_names_key_and_source() {
        let state = StaticState::from_pairs("state file x.json", [("a", "1")]);
        let err = state.require_str("admin_password").unwrap_err();
        match err {
            CoreError::InputMissing { ref key, ref provider } => {
                assert_eq!(key, "admin_password");
                assert_eq!(provider, "state file x.json");
            }
            other => panic!("expected InputMissing, got {other:?}"),
        }
    }

    #[test]
    fn empty_and_null_count_as_missing() {
        let mut state = StaticState::new("test");
        state.insert("a", "  ");
        state.insert("b", Value::Null);
        assert!(matches!(state.require_str("a"), Err(CoreError::InputMissing { .. })));
        assert!(matches!(state.require_str("b"), Err(CoreError::InputMissing { .. })));
    }

    #[test]
    fn structured_value_is_invalid_as_string() {
        let state = StaticState::from_pairs("test", [("a", json!(["x"]))]);
        assert!(matches!(state.require_str("a"), Err(CoreError::InvalidInput { .. })));
        assert!(state.require("a").is_ok());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(StaticState::from_json_str("test", "[1, 2]").is_err());
        assert!(StaticState::from_json_str("test", "not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terraform_outputs_are_read() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-terraform");
        std::fs::write(
            &fake,
            "#!/bin/sh\necho '{\"vmseries_mgmt_public_ip\": {\"value\": \"203.0.113.10\"}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let state = TerraformState::new(dir.path())
            .with_binary(fake.to_string_lossy())
            .load()
            .await
            .unwrap();
        assert_eq!(
            state.require_str("vmseries_mgmt_public_ip").unwrap(),
            "203.0.113.10"
        );
    }

    #[tokio::test]
    async fn missing_terraform_binary_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TerraformState::new(dir.path())
            .with_binary("panply-no-such-terraform")
            .load()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }
}
