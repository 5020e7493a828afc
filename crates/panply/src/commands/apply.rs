//! `panply apply`: rotate, create in order, commit.

use panply_core::{Applier, ApplyReport, RotationStatus};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

fn detail(report: &ApplyReport, color: bool) -> String {
    let mut lines = Vec::new();
    if let RotationStatus::Failed(ref reason) = report.rotation {
        lines.push(format!("Credential rotation failed, continued with existing password: {reason}"));
    }
    lines.push(output::success(&report.status_line(), color));
    lines.join("\n")
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    tracing::info!(profile = %resolved.profile, "applying configuration");

    let state = config::load_state(&resolved.source).await?;
    let applier = Applier::new(resolved.apply);
    let report = applier.run(&state).await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        ApplyReport::status_line,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
