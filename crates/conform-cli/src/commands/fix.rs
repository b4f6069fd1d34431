//! Fix command implementation.

use anyhow::{Context, Result};
use std::path::Path;

use super::workspace::Workspace;
use crate::RunArgs;

/// Runs the fix command.
///
/// Corrected files are written back unless `dry_run` is set. Exits with
/// status 1 when a residual violation reaches the configured `fail_on`.
pub fn run(
    path: &Path,
    args: &RunArgs,
    dry_run: bool,
    explicit_config: Option<&Path>,
) -> Result<()> {
    let engine = super::engine()?;
    let mut workspace = Workspace::load(path, &args.include)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let config = workspace.resolve_config(&engine, explicit_config, args)?;

    tracing::info!(
        "Fixing {} file(s) under {:?} with {} rule(s)",
        workspace.files.len(),
        path,
        config.enabled_rules().len()
    );

    let report = engine
        .run_correction(&mut workspace.tree, &workspace.files, &config)
        .context("Correction failed")?;

    if dry_run {
        tracing::info!("Dry run: no files written");
    } else {
        let written = workspace.persist()?;
        tracing::info!("Wrote {written} file(s)");
    }

    super::output::print_correction(&report, &workspace.tree, args.format, dry_run)?;

    let fail_on = config.fail_on();
    if report.residual.iter().any(|r| r.violation.severity >= fail_on) {
        std::process::exit(1);
    }

    Ok(())
}
