//! `panply plan`: the ordered create plan, computed without device contact.

use tabled::Tabled;

use panply_core::{Applier, PlanStep};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Contains")]
    contains: String,
}

fn plan_row(s: &PlanStep) -> PlanRow {
    let scope = if s.vsys_scoped { " (vsys)" } else { "" };
    PlanRow {
        step: s.step,
        kind: s.kind.to_string(),
        name: s.name.clone(),
        endpoint: s
            .resource
            .map_or_else(|| "-".to_owned(), |r| format!("{r}{scope}")),
        contains: s
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let state = config::load_state(&resolved.source).await?;

    let applier = Applier::new(resolved.apply);
    let plan = applier.plan(&state)?;
    tracing::info!(device = %plan.device, steps = plan.steps.len(), "plan computed");

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => output::render_list(
            &global.output,
            &plan.steps,
            plan_row,
            |s| format!("{} {}", s.kind, s.name),
        )?,
        _ => output::render_single(&global.output, &plan, |_| String::new(), |p| p.device.clone())?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
