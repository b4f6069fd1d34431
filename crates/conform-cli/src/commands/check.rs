//! Check command implementation.

use anyhow::{Context, Result};
use std::path::Path;

use super::workspace::Workspace;
use crate::RunArgs;

/// Runs the check command.
pub fn run(path: &Path, args: &RunArgs, explicit_config: Option<&Path>) -> Result<()> {
    let engine = super::engine()?;
    let workspace = Workspace::load(path, &args.include)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let config = workspace.resolve_config(&engine, explicit_config, args)?;

    tracing::info!(
        "Checking {} file(s) under {:?} with {} rule(s)",
        workspace.files.len(),
        path,
        config.enabled_rules().len()
    );

    let result = engine
        .run_verification(&workspace.tree, &workspace.files, &config)
        .context("Verification failed")?;

    super::output::print_verification(&result, &workspace.tree, args.format)?;

    if result.has_violations_at(config.fail_on()) {
        std::process::exit(1);
    }

    Ok(())
}
