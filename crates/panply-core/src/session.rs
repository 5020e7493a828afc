// ── Device session ──
//
// One authenticated channel to a firewall. Objects are staged locally,
// created one by one in the candidate configuration, then committed as a
// single device job. The lifecycle is enforced at runtime:
//
//   Disconnected → Connected → Staging → Committing → Active | Failed

use std::collections::HashMap;
use std::time::{Duration, Instant};

use panply_api::{CommitRequest, DeviceClient, RulePosition, UpsertOutcome, entry_names};
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::CoreError;
use crate::graph::DependencyGraph;
use crate::model::{ConfigObject, ObjectKind, ObjectRef, Rulebase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connected,
    /// At least one object has been created in the candidate.
    Staging,
    Committing,
    Active,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CommitStatus {
    /// The commit job finished with result OK.
    Succeeded,
    /// The candidate already matched the running configuration.
    NoChanges,
    /// Accepted as a job; not waited on.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub job_id: Option<u64>,
    pub status: CommitStatus,
    /// Device detail lines (warnings, the no-changes message).
    pub details: Vec<String>,
}

pub struct DeviceSession {
    client: DeviceClient,
    username: String,
    password: SecretString,
    state: SessionState,
    staged: Vec<ConfigObject>,
    created: Vec<ObjectRef>,
    poll_interval: Duration,
    commit_timeout: Duration,
}

impl DeviceSession {
    /// Build a disconnected session; no device traffic.
    pub fn new(config: &SessionConfig) -> Result<Self, CoreError> {
        let client = DeviceClient::new(config.url.clone(), &config.transport())?
            .with_api_version(config.api_version.clone())
            .with_vsys(config.vsys.clone())
            .with_retry(config.retry.clone());

        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            state: SessionState::Disconnected,
            staged: Vec::new(),
            created: Vec::new(),
            poll_interval: config.commit_poll_interval,
            commit_timeout: config.commit_timeout,
        })
    }

    /// Build a session and authenticate it.
    pub async fn open(config: &SessionConfig) -> Result<Self, CoreError> {
        let mut session = Self::new(config)?;
        session.connect().await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Staged top-level objects, in staging order.
    pub fn staged(&self) -> &[ConfigObject] {
        &self.staged
    }

    /// Objects created so far, in creation order.
    pub fn created(&self) -> &[ObjectRef] {
        &self.created
    }

    fn ensure(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), CoreError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CoreError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    // ── Connect ─────────────────────────────────────────────────────

    /// Generate an API key from the session's credentials.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        self.ensure("connect", &[SessionState::Disconnected])?;
        let url = self.client.base_url().to_string();
        info!(url = %url, username = %self.username, "connecting to device");

        match self.client.login(&self.username, &self.password).await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!("device session established");
                Ok(())
            }
            Err(e) if e.is_auth() => Err(e.into()),
            // Anything but a refused credential means the device could not
            // complete the exchange.
            Err(
                e @ (panply_api::Error::Transport(_)
                | panply_api::Error::Unavailable { .. }
                | panply_api::Error::Tls(_)
                | panply_api::Error::XmlApi { .. }
                | panply_api::Error::Deserialization { .. }),
            ) => Err(CoreError::ConnectionFailed {
                url,
                reason: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ── Staging ─────────────────────────────────────────────────────

    /// Register a top-level object. No device traffic.
    pub fn stage(&mut self, object: ConfigObject) -> Result<ObjectRef, CoreError> {
        self.ensure(
            "stage",
            &[
                SessionState::Disconnected,
                SessionState::Connected,
                SessionState::Staging,
            ],
        )?;
        object.validate()?;

        let object_ref = object.object_ref();
        if !object_ref.kind.is_top_level() {
            return Err(CoreError::validation(format!(
                "{object_ref} must be staged under its parent"
            )));
        }
        if self.staged.iter().any(|o| o.object_ref() == object_ref) {
            return Err(CoreError::validation(format!(
                "duplicate {object_ref} at the root scope"
            )));
        }

        debug!(object = %object_ref, "staged");
        self.staged.push(object);
        Ok(object_ref)
    }

    /// Register `child` under an already staged parent.
    pub fn stage_child(
        &mut self,
        parent: &ObjectRef,
        child: ConfigObject,
    ) -> Result<ObjectRef, CoreError> {
        self.ensure(
            "stage",
            &[
                SessionState::Disconnected,
                SessionState::Connected,
                SessionState::Staging,
            ],
        )?;
        if self.created.contains(parent) {
            return Err(CoreError::validation(format!(
                "{parent} was already created; stage children before creating it"
            )));
        }

        let child_ref = child.object_ref();
        let expected = child_ref.kind.spec().parent;
        if expected != Some(parent.kind) {
            return Err(CoreError::validation(format!(
                "{child_ref} cannot be staged under {parent}"
            )));
        }

        let owner = self
            .staged
            .iter_mut()
            .find(|o| &o.object_ref() == parent)
            .ok_or_else(|| CoreError::validation(format!("{parent} is not staged")))?;
        owner.attach(child)?;

        debug!(object = %child_ref, parent = %parent, "staged child");
        Ok(child_ref)
    }

    /// Creation order for everything staged.
    pub fn plan(&self, strict: bool) -> Result<DependencyGraph, CoreError> {
        DependencyGraph::build(&self.staged, strict)
    }

    // ── Create ──────────────────────────────────────────────────────

    /// Send a staged top-level object to the candidate configuration.
    ///
    /// Any failure moves the session to `Failed`; nothing may be created
    /// or committed afterwards.
    pub async fn create(&mut self, target: &ObjectRef) -> Result<(), CoreError> {
        self.ensure("create", &[SessionState::Connected, SessionState::Staging])?;

        let result = {
            let object = self
                .staged
                .iter()
                .find(|o| &o.object_ref() == target)
                .ok_or_else(|| CoreError::validation(format!("{target} is not staged")))?;
            push(&self.client, object).await
        };

        match result {
            Ok(()) => {
                self.state = SessionState::Staging;
                self.created.push(target.clone());
                info!(object = %target, "created");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                warn!(object = %target, error = %e, "create failed");
                Err(e)
            }
        }
    }

    // ── Commit ──────────────────────────────────────────────────────

    /// Activate the candidate configuration.
    ///
    /// A synchronous commit polls the job until it reaches a terminal
    /// state or the commit timeout passes.
    pub async fn commit(&mut self, synchronous: bool) -> Result<CommitResult, CoreError> {
        self.ensure("commit", &[SessionState::Connected, SessionState::Staging])?;
        self.state = SessionState::Committing;
        info!(objects = self.created.len(), "committing candidate configuration");

        let request = match self.client.commit().await {
            Ok(request) => request,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(CoreError::commit(None, e));
            }
        };

        let result = match request {
            CommitRequest::NoChanges { message } => {
                info!("no changes to commit");
                Ok(CommitResult {
                    job_id: None,
                    status: CommitStatus::NoChanges,
                    details: vec![message],
                })
            }
            CommitRequest::Enqueued { id } if !synchronous => {
                info!(job_id = id, "commit enqueued");
                return Ok(CommitResult {
                    job_id: Some(id),
                    status: CommitStatus::Pending,
                    details: Vec::new(),
                });
            }
            CommitRequest::Enqueued { id } => self.wait_for_job(id).await,
        };

        self.state = match result {
            Ok(_) => SessionState::Active,
            Err(_) => SessionState::Failed,
        };
        result
    }

    async fn wait_for_job(&self, id: u64) -> Result<CommitResult, CoreError> {
        let started = Instant::now();
        loop {
            let job = self
                .client
                .job_status(id)
                .await
                .map_err(|e| CoreError::commit(Some(id), e))?;

            if job.succeeded() {
                info!(job_id = id, "commit job finished");
                return Ok(CommitResult {
                    job_id: Some(id),
                    status: CommitStatus::Succeeded,
                    details: job.details,
                });
            }
            if job.is_terminal() {
                let reason = if job.details.is_empty() {
                    format!("job finished with result {:?}", job.result)
                } else {
                    job.details.join(" ")
                };
                return Err(CoreError::Commit {
                    job_id: Some(id),
                    reason,
                    details: job.details,
                });
            }
            if started.elapsed() >= self.commit_timeout {
                return Err(CoreError::Commit {
                    job_id: Some(id),
                    reason: format!(
                        "job did not finish within {}s",
                        self.commit_timeout.as_secs()
                    ),
                    details: job.details,
                });
            }

            debug!(job_id = id, progress = ?job.progress, state = ?job.state, "commit in progress");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    // ── Read-back ───────────────────────────────────────────────────

    /// Rule names of one rule kind, in device order.
    pub async fn rule_order(&self, kind: ObjectKind) -> Result<Vec<String>, CoreError> {
        self.ensure(
            "read rules",
            &[
                SessionState::Connected,
                SessionState::Staging,
                SessionState::Committing,
                SessionState::Active,
            ],
        )?;
        let spec = kind.spec();
        let resource = match spec.resource {
            Some(resource) if kind.is_rule() => resource,
            _ => {
                return Err(CoreError::validation(format!("{kind} is not a rule kind")));
            }
        };
        let entries = self.client.list_entries(resource, spec.vsys_scoped).await?;
        Ok(entry_names(&entries))
    }
}

// ── Object push ─────────────────────────────────────────────────────

async fn push(client: &DeviceClient, object: &ConfigObject) -> Result<(), CoreError> {
    if let ConfigObject::Rulebase(rulebase) = object {
        return push_rulebase(client, rulebase).await;
    }

    let kind = object.kind();
    let spec = kind.spec();
    let resource = spec
        .resource
        .ok_or_else(|| CoreError::Internal(format!("{kind} has no device resource")))?;

    let outcome = client
        .upsert_entry(resource, spec.vsys_scoped, object.name(), &object.to_entry())
        .await
        .map_err(|e| CoreError::rejected(kind, object.name(), e))?;
    log_outcome(kind, object.name(), outcome);
    Ok(())
}

/// Upsert each rule in declared order, then move it into place: the first
/// rule of a type to the top, every later one after its predecessor.
async fn push_rulebase(client: &DeviceClient, rulebase: &Rulebase) -> Result<(), CoreError> {
    let mut previous: HashMap<ObjectKind, &str> = HashMap::new();

    for rule in &rulebase.rules {
        let kind = rule.kind();
        let name = rule.name();
        let spec = kind.spec();
        let resource = spec
            .resource
            .ok_or_else(|| CoreError::Internal(format!("{kind} has no device resource")))?;

        let outcome = client
            .upsert_entry(resource, spec.vsys_scoped, name, &rule.to_entry())
            .await
            .map_err(|e| CoreError::rejected(kind, name, e))?;
        log_outcome(kind, name, outcome);

        let position = match previous.get(&kind) {
            Some(prev) => RulePosition::After((*prev).to_owned()),
            None => RulePosition::Top,
        };
        client
            .move_entry(resource, name, &position)
            .await
            .map_err(|e| CoreError::rejected(kind, name, e))?;

        previous.insert(kind, name);
    }
    Ok(())
}

fn log_outcome(kind: ObjectKind, name: &str, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created => debug!(%kind, object = name, "entry created"),
        UpsertOutcome::Updated => debug!(%kind, object = name, "existing entry replaced"),
    }
}
