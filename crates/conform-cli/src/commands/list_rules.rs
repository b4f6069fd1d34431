//! List rules command implementation.

use anyhow::Result;
use conform_core::RuleRegistry;
use std::fmt::Write;

use super::workspace::DEFAULT_PRESET;

/// Runs the list-rules command.
pub fn run() -> Result<()> {
    let engine = super::engine()?;
    print!("{}", render(engine.registry()));

    println!("\nUse --rules and --disable to adjust the rule set, e.g.:");
    println!("  conform check --rules max-line-length --disable no-tabs");

    Ok(())
}

/// The rule table followed by every registered preset.
fn render(registry: &RuleRegistry) -> String {
    let mut out = String::from("Available rules:\n\n");
    let _ = writeln!(
        out,
        "{:<24} {:<10} {:<8} {:<8} Description",
        "Id", "Category", "Level", "Fixable"
    );
    let _ = writeln!(out, "{}", "-".repeat(90));

    for rule in registry.iter() {
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:<8} {:<8} {}",
            rule.id(),
            rule.category().to_string(),
            rule.default_severity().to_string(),
            if rule.is_fixable() { "yes" } else { "no" },
            rule.description()
        );
        for option in rule.options() {
            let _ = writeln!(
                out,
                "{:<24}   option `{}`: {}",
                "", option.name, option.description
            );
        }
    }

    out.push_str("\nPresets:\n");
    for name in registry.preset_names() {
        let ids = registry.preset(name).unwrap_or_default();
        let default = if name == DEFAULT_PRESET.name() {
            " (default)"
        } else {
            ""
        };
        let _ = writeln!(out, "  {name:<12} - {}{default}", ids.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_registered_presets_with_default_marked() {
        let mut registry = conform_rules::builtin_registry().unwrap();
        registry.register_preset("team", ["no-tabs"]).unwrap();

        let listing = render(&registry);
        let presets: Vec<&str> = listing
            .split("\nPresets:\n")
            .nth(1)
            .unwrap()
            .lines()
            .map(str::trim)
            .collect();

        assert_eq!(presets.len(), 4);
        assert!(presets[0].starts_with("minimal "));
        assert!(presets[1].starts_with("recommended "));
        assert!(presets[1].ends_with("no-tabs, no-todo-macro (default)"));
        assert!(!presets[2].ends_with("(default)"));
        assert_eq!(presets[3], format!("{:<12} - no-tabs", "team"));
    }
}
