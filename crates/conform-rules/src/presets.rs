//! Rule presets for common configurations.

use crate::{FinalNewline, MaxLineLength, NoTabs, NoTodoComments, NoTodoMacro, NoTrailingWhitespace};
use conform_core::{RegistryError, RuleRef, RuleRegistry};
use std::sync::Arc;

/// Built-in presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Whitespace hygiene only, for gradual adoption.
    Minimal,
    /// Recommended rules with sensible defaults.
    Recommended,
    /// Every built-in rule.
    Strict,
}

impl Preset {
    /// All presets.
    pub const ALL: [Self; 3] = [Self::Minimal, Self::Recommended, Self::Strict];

    /// Name used in configuration files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Recommended => "recommended",
            Self::Strict => "strict",
        }
    }

    /// Rule ids enabled by this preset.
    #[must_use]
    pub fn rule_ids(self) -> &'static [&'static str] {
        match self {
            Self::Minimal => &[crate::no_trailing_whitespace::ID, crate::final_newline::ID],
            Self::Recommended => &[
                crate::no_trailing_whitespace::ID,
                crate::final_newline::ID,
                crate::no_tabs::ID,
                crate::no_todo_macro::ID,
            ],
            Self::Strict => &[
                crate::no_trailing_whitespace::ID,
                crate::final_newline::ID,
                crate::no_tabs::ID,
                crate::max_line_length::ID,
                crate::no_todo_comments::ID,
                crate::no_todo_macro::ID,
            ],
        }
    }
}

/// Returns every built-in rule, in registration order.
#[must_use]
pub fn all_rules() -> Vec<RuleRef> {
    vec![
        Arc::new(NoTrailingWhitespace::new()),
        Arc::new(FinalNewline::new()),
        Arc::new(NoTabs::new()),
        Arc::new(MaxLineLength::new()),
        Arc::new(NoTodoComments::new()),
        Arc::new(NoTodoMacro::new()),
    ]
}

/// Registers every built-in rule and preset.
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if a built-in id is already taken.
pub fn register_builtin(registry: &mut RuleRegistry) -> Result<(), RegistryError> {
    for rule in all_rules() {
        registry.register_ref(rule)?;
    }
    for preset in Preset::ALL {
        registry.register_preset(preset.name(), preset.rule_ids().iter().copied())?;
    }
    Ok(())
}

/// A registry holding only the built-in rules and presets.
///
/// # Errors
///
/// Never fails in practice; the signature mirrors [`register_builtin`].
pub fn builtin_registry() -> Result<RuleRegistry, RegistryError> {
    let mut registry = RuleRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}
