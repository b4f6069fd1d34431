//! Init command implementation.

use anyhow::{bail, Result};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# conform configuration

# Base rule set: "minimal", "recommended" or "strict"
preset = "recommended"

# Extra rules to enable, and rules to switch off
enable = []
disable = []

# Drop violations below this level; fail the run at this level
severity_floor = "info"
fail_on = "error"

[execution]
# "parallel" or "sequential"
strategy = "parallel"
rule_timeout_ms = 10000
# run_timeout_ms = 60000
# max_workers = 4
cache = true

[fix]
enabled = true
max_rounds = 5

# Per-rule settings: enabled, severity, and rule options

# [rules.max-line-length]
# enabled = true
# severity = "error"
# max = 120

[rules.no-todo-macro]
allow_in_tests = true
"#;

/// Runs the init command.
pub fn run(force: bool) -> Result<()> {
    let config_path = Path::new("conform.toml");
    write_default(config_path, force)?;

    println!("Created conform.toml");
    println!("\nNext steps:");
    println!("  1. Edit conform.toml to configure rules");
    println!("  2. Run: conform check");

    Ok(())
}

fn write_default(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }
    std::fs::write(config_path, DEFAULT_CONFIG)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conform_core::{Engine, PartialConfig, Severity, Strategy};
    use tempfile::TempDir;

    #[test]
    fn default_config_resolves_against_builtin_rules() {
        let engine = Engine::new(conform_rules::builtin_registry().unwrap());
        let source = PartialConfig::parse(DEFAULT_CONFIG).unwrap();

        let config = engine.resolve(&[source]).unwrap();

        assert!(config.is_enabled("no-todo-macro"));
        assert!(!config.is_enabled("max-line-length"));
        assert_eq!(config.fail_on(), Severity::Error);
        assert_eq!(config.strategy(), Strategy::Parallel);
        assert_eq!(config.max_fix_rounds(), 5);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conform.toml");
        std::fs::write(&path, "preset = \"strict\"\n").unwrap();

        let err = write_default(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "preset = \"strict\"\n"
        );

        write_default(&path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }
}
