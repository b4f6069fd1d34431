//! Subcommand implementations.

pub mod check;
pub mod fix;
pub mod init;
pub mod list_rules;
pub mod output;
pub mod workspace;

use anyhow::{Context, Result};
use conform_core::Engine;

/// Builds an engine over the built-in rule catalogue.
///
/// Each command gets its own engine, and with it an empty result cache.
fn engine() -> Result<Engine> {
    let registry = conform_rules::builtin_registry().context("Failed to register built-in rules")?;
    Ok(Engine::new(registry))
}
