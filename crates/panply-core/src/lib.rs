//! Dependency-ordered configuration apply engine between `panply-api` and
//! the `panply` CLI.
//!
//! - **[`model`]**: typed config objects (management profiles, interfaces,
//!   zones, virtual routers with static routes, rulebases with NAT and
//!   security rules) and the [`ObjectKind`] registry that declares each
//!   kind's device endpoint, scope and `depends_on` relation.
//!
//! - **[`DependencyGraph`]**: deterministic topological order over the
//!   kind registry, with optional strict resolution of name references.
//!
//! - **[`DeviceSession`]**: one authenticated channel to a firewall. Stages
//!   objects locally, creates them in the candidate configuration and
//!   commits the candidate as a device job.
//!
//! - **[`Applier`]**: resolves inputs from a [`StateProvider`], runs the
//!   credential rotation script, builds the two-zone topology and drives a
//!   session through create and commit.

pub mod apply;
pub mod config;
pub mod derive;
pub mod error;
pub mod graph;
pub mod inputs;
pub mod model;
pub mod rotation;
pub mod session;
pub mod state;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use apply::{ApplyPlan, ApplyReport, Applier, PlanStep, RotationStatus, SUCCESS_LINE};
pub use config::{ApplyConfig, SessionConfig, TlsVerification};
pub use error::CoreError;
pub use graph::DependencyGraph;
pub use inputs::{DeviceInputs, keys};
pub use rotation::CredentialRotator;
pub use session::{CommitResult, CommitStatus, DeviceSession, SessionState};
pub use state::{StateProvider, StaticState, TerraformState};

pub use model::{
    AddressAssignment, ConfigObject, DestinationTranslation, EthernetInterface,
    InspectionProfiles, KindSpec, ManagementProfile, NatRule, NatType, NetworkMode, NextHop,
    ObjectKind, ObjectRef, Reference, Rule, RuleAction, Rulebase, SecurityRule,
    SourceTranslation, StaticRoute, VirtualRouter, Zone,
};

pub use panply_api::{DEFAULT_API_VERSION, DEFAULT_VSYS, RetryPolicy};
