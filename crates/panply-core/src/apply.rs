// ── Apply orchestrator ──
//
// One run: resolve inputs, rotate the admin credential, build and stage
// the topology, create every top-level object in dependency order, then
// commit once. Any create failure aborts before the commit.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ApplyConfig, SessionConfig, device_url};
use crate::error::CoreError;
use crate::inputs::DeviceInputs;
use crate::model::{ConfigObject, ObjectKind, ObjectRef};
use crate::rotation::CredentialRotator;
use crate::session::{CommitResult, CommitStatus, DeviceSession};
use crate::state::StateProvider;
use crate::topology;

/// Status line printed after a successful run.
pub const SUCCESS_LINE: &str = "Commit successful! The new configuration is now active.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum RotationStatus {
    Rotated,
    /// No script configured.
    Skipped,
    /// The script failed; the run continued with the existing credential.
    Failed(String),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub device: String,
    pub rotation: RotationStatus,
    /// Top-level objects, in creation order.
    pub created: Vec<ObjectRef>,
    pub commit: CommitResult,
    pub elapsed_ms: u64,
}

impl ApplyReport {
    pub fn status_line(&self) -> String {
        match (self.commit.status, self.commit.job_id) {
            (CommitStatus::Pending, Some(id)) => {
                format!("Commit accepted as job {id}; not waiting for it to finish.")
            }
            _ => SUCCESS_LINE.to_owned(),
        }
    }
}

/// One step of a creation plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub step: usize,
    pub kind: ObjectKind,
    pub name: String,
    pub resource: Option<&'static str>,
    pub vsys_scoped: bool,
    /// Contained objects sent with (or right after) this one.
    pub children: Vec<ObjectRef>,
}

/// Creation plan computed without contacting the device.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyPlan {
    pub device: String,
    pub steps: Vec<PlanStep>,
}

pub struct Applier {
    config: ApplyConfig,
}

impl Applier {
    pub fn new(config: ApplyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApplyConfig {
        &self.config
    }

    // ── Plan ────────────────────────────────────────────────────────

    /// Ordered create plan for the inputs in `provider`. No device traffic.
    pub fn plan(&self, provider: &dyn StateProvider) -> Result<ApplyPlan, CoreError> {
        let inputs = DeviceInputs::resolve(provider)?;
        let address = self.config.address.as_deref().unwrap_or(&inputs.mgmt_address);
        let objects = topology::two_zone(&inputs)?;
        Ok(ApplyPlan {
            device: device_url(address)?.to_string(),
            steps: self.plan_objects(&objects)?,
        })
    }

    /// Ordered create plan for an arbitrary object set.
    pub fn plan_objects(&self, objects: &[ConfigObject]) -> Result<Vec<PlanStep>, CoreError> {
        let graph = crate::graph::DependencyGraph::build(objects, self.config.strict)?;
        let steps = graph
            .order()
            .iter()
            .enumerate()
            .filter_map(|(i, target)| {
                let object = objects.iter().find(|o| &o.object_ref() == target)?;
                let spec = target.kind.spec();
                Some(PlanStep {
                    step: i + 1,
                    kind: target.kind,
                    name: target.name.clone(),
                    resource: spec.resource,
                    vsys_scoped: spec.vsys_scoped,
                    children: object.children().iter().map(ConfigObject::object_ref).collect(),
                })
            })
            .collect();
        Ok(steps)
    }

    // ── Run ─────────────────────────────────────────────────────────

    /// Full run against the device described by `provider`.
    pub async fn run(&self, provider: &dyn StateProvider) -> Result<ApplyReport, CoreError> {
        let started = Instant::now();

        let inputs = DeviceInputs::resolve(provider)?;
        info!(source = provider.source(), "inputs resolved");

        let rotation = self.rotate().await;

        let objects = topology::two_zone(&inputs)?;
        let session = self
            .config
            .session_config(&inputs.mgmt_address, inputs.admin_password.clone())?;

        let mut report = self.apply_from(started, &session, objects).await?;
        report.rotation = rotation;
        Ok(report)
    }

    /// Stage, create and commit `objects` on the device in `session`.
    pub async fn apply(
        &self,
        session: &SessionConfig,
        objects: Vec<ConfigObject>,
    ) -> Result<ApplyReport, CoreError> {
        self.apply_from(Instant::now(), session, objects).await
    }

    async fn apply_from(
        &self,
        started: Instant,
        config: &SessionConfig,
        objects: Vec<ConfigObject>,
    ) -> Result<ApplyReport, CoreError> {
        let mut session = DeviceSession::new(config)?;
        for object in objects {
            session.stage(object)?;
        }
        let graph = session.plan(self.config.strict)?;
        info!(objects = graph.len(), "configuration staged");

        self.check_deadline(started, "connecting")?;
        session.connect().await?;

        for target in graph.order() {
            self.check_deadline(started, &format!("creating {target}"))?;
            session.create(target).await?;
        }

        self.check_deadline(started, "commit")?;
        let commit = session.commit(true).await?;
        info!(job_id = ?commit.job_id, status = %commit.status, "configuration active");

        Ok(ApplyReport {
            device: config.url.to_string(),
            rotation: RotationStatus::Skipped,
            created: session.created().to_vec(),
            commit,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn rotate(&self) -> RotationStatus {
        let Some(script) = &self.config.rotation_script else {
            return RotationStatus::Skipped;
        };
        let rotator =
            CredentialRotator::new(script.clone()).with_timeout(self.config.rotation_timeout);
        match rotator.rotate().await {
            Ok(()) => RotationStatus::Rotated,
            Err(e) => {
                warn!(error = %e, "credential rotation failed; continuing with the current password");
                RotationStatus::Failed(e.to_string())
            }
        }
    }

    fn check_deadline(&self, started: Instant, step: &str) -> Result<(), CoreError> {
        match self.config.deadline {
            Some(deadline) if started.elapsed() >= deadline => Err(CoreError::DeadlineExceeded {
                deadline_secs: deadline.as_secs(),
                step: step.to_owned(),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for Applier {
    fn default() -> Self {
        Self::new(ApplyConfig::default())
    }
}

/// Convenience for callers that only need the deadline as a duration.
pub fn deadline_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::inputs::tests::sample_state;
    use crate::state::StaticState;

    #[test]
    fn plan_is_ordered_without_device() {
        let plan = Applier::default().plan(&sample_state()).unwrap();
        assert_eq!(plan.device, "https://203.0.113.10/");
        let kinds: Vec<_> = plan.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ObjectKind::ManagementProfile,
                ObjectKind::Interface,
                ObjectKind::Interface,
                ObjectKind::Zone,
                ObjectKind::Zone,
                ObjectKind::VirtualRouter,
                ObjectKind::Rulebase,
            ]
        );
        let rulebase = plan.steps.last().unwrap();
        assert_eq!(rulebase.children.len(), 4);
        assert_eq!(plan.steps[0].step, 1);
    }

    #[test]
    fn plan_fails_on_missing_input() {
        let err = Applier::default()
            .plan(&StaticState::new("empty"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InputMissing { .. }), "{err:?}");
    }

    #[test]
    fn deadline_zero_means_none() {
        assert_eq!(deadline_from_secs(0), None);
        assert_eq!(deadline_from_secs(5), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn rotation_skipped_without_script() {
        assert_eq!(Applier::default().rotate().await, RotationStatus::Skipped);
    }
}
