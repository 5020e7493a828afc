// ── Credential rotation ──
//
// Runs the operator's password-rotation script with `bash <script>`
// before the session connects. Failures surface as
// `CoreError::CredentialRotation`, which callers log and move past.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CoreError;

/// Default script location, relative to the working directory.
pub const DEFAULT_SCRIPT: &str = "./admin_pass.sh";

#[derive(Debug, Clone)]
pub struct CredentialRotator {
    script: PathBuf,
    interpreter: String,
    timeout: Duration,
}

impl CredentialRotator {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            interpreter: "bash".into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Run the script to completion.
    pub async fn rotate(&self) -> Result<(), CoreError> {
        if !self.script.is_file() {
            return Err(self.failure("script not found".into()));
        }

        debug!(script = %self.script.display(), "running credential rotation");

        let run = Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| self.failure(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.failure(format!("interpreter '{}' not found", self.interpreter))
                } else {
                    self.failure(format!("could not start: {e}"))
                }
            })?;

        if !output.status.success() {
            let reason = match output.status.code() {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".into(),
            };
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(self.failure(if stderr.is_empty() {
                reason
            } else {
                format!("{reason}: {}", last_line(stderr))
            }));
        }

        info!(script = %self.script.display(), "admin credential rotated");
        Ok(())
    }

    fn failure(&self, reason: String) -> CoreError {
        CoreError::CredentialRotation {
            script: self.script.display().to_string(),
            reason,
        }
    }
}

fn last_line(text: &str) -> &str {
    text.lines().next_back().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("rotate.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn successful_script() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = CredentialRotator::new(script(&dir, "echo rotated\nexit 0\n"));
        rotator.rotate().await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_rotation_error() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = CredentialRotator::new(script(&dir, "echo 'ssh: timeout' >&2\nexit 1\n"));
        let err = rotator.rotate().await.unwrap_err();
        assert!(err.is_non_fatal());
        let message = err.to_string();
        assert!(message.contains("exited with code 1"), "{message}");
        assert!(message.contains("ssh: timeout"), "{message}");
    }

    #[tokio::test]
    async fn missing_script_is_rotation_error() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = CredentialRotator::new(dir.path().join("absent.sh"));
        let err = rotator.rotate().await.unwrap_err();
        assert!(
            matches!(err, CoreError::CredentialRotation { ref reason, .. } if reason == "script not found"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = CredentialRotator::new(script(&dir, "sleep 5\n"))
            .with_timeout(Duration::from_millis(100));
        let err = rotator.rotate().await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn missing_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = CredentialRotator::new(script(&dir, "exit 0\n"))
            .with_interpreter("panply-no-such-shell");
        let err = rotator.rotate().await.unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }
}
