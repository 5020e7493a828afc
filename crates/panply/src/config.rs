//! Layering of CLI flags over the resolved profile.
//!
//! `panply-config` owns the TOML file and environment; this module applies
//! flag overrides and produces the `ApplyConfig` plus the state source the
//! commands run with.

use panply_config::{Config, Profile, StateSource};
use panply_core::{ApplyConfig, CoreError, StaticState, TerraformState};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a device-bound command needs.
#[derive(Debug)]
pub struct Resolved {
    pub profile: String,
    pub source: StateSource,
    pub apply: ApplyConfig,
}

/// Load the config file and resolve the active profile with CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = panply_config::load_config()?;
    resolve_with(&cfg, global)
}

pub fn resolve_with(cfg: &Config, global: &GlobalOpts) -> Result<Resolved, CliError> {
    let (name, profile) = cfg
        .profile(global.profile.as_deref())
        .map_err(|e| match e {
            panply_config::ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            },
            other => other.into(),
        })?;

    let profile = apply_overrides(profile, global);
    let source = panply_config::state_source(&profile)?;
    let apply = panply_config::profile_to_apply_config(&cfg.defaults, &profile)?;

    tracing::debug!(profile = %name, ?source, "resolved configuration");
    Ok(Resolved {
        profile: name,
        source,
        apply,
    })
}

fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref file) = global.state_file {
        profile.state_file = Some(file.clone());
        profile.terraform_dir = None;
    }
    if let Some(ref dir) = global.terraform_dir {
        profile.terraform_dir = Some(dir.clone());
        profile.state_file = None;
    }
    if global.address.is_some() {
        profile.address.clone_from(&global.address);
    }
    if global.username.is_some() {
        profile.username.clone_from(&global.username);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if global.strict {
        profile.strict = Some(true);
    }
    if global.no_rotate {
        profile.rotate = Some(false);
    }
    if let Some(ref script) = global.rotation_script {
        profile.rotation_script = Some(script.clone());
        profile.rotate = Some(true);
    }
    if global.deadline.is_some() {
        profile.deadline = global.deadline;
    }
    profile
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Read the run inputs from the resolved source.
pub async fn load_state(source: &StateSource) -> Result<StaticState, CoreError> {
    match source {
        StateSource::File(path) => StaticState::from_file(path),
        StateSource::Terraform(dir) => TerraformState::new(dir).load().await,
    }
}
