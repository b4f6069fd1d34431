//! The contract every rule, built-in or plugin, must satisfy.

use crate::context::FileContext;
use crate::options::{OptionSpec, RuleOptions};
use crate::types::{Category, Severity, Violation};
use std::sync::Arc;

/// Failure raised by a rule's verification or correction operation.
///
/// Returned errors and panics are both recorded by the executor as a
/// rule fault for the offending rule and file; neither aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RuleError {
    message: String,
}

impl RuleError {
    /// Creates a rule error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A verification rule with an optional correction operation.
///
/// Implementations are treated as opaque: the core calls [`Rule::check`]
/// and [`Rule::fix`] and takes their return values as the whole observable
/// effect.
///
/// # Example
///
/// ```ignore
/// use conform_core::{Category, FileContext, Rule, RuleError, RuleOptions, Violation};
///
/// pub struct NoBom;
///
/// impl Rule for NoBom {
///     fn id(&self) -> &str { "no-bom" }
///     fn category(&self) -> Category { Category::Style }
///
///     fn check(&self, ctx: &FileContext, _opts: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
///         if ctx.content.starts_with('\u{feff}') {
///             Ok(vec![Violation::new(self.id(), self.default_severity(), ctx.path, ctx.span_at(0, 3), "byte order mark")])
///         } else {
///             Ok(Vec::new())
///         }
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Stable, unique, kebab-case id (e.g. "no-trailing-whitespace").
    fn id(&self) -> &str;

    /// Category used for grouping and presets.
    fn category(&self) -> Category;

    /// Returns a brief description of what this rule checks.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the default severity for violations from this rule.
    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    /// Whether violations from this rule can be corrected automatically.
    fn is_fixable(&self) -> bool {
        false
    }

    /// Declared configuration options.
    fn options(&self) -> &[OptionSpec] {
        &[]
    }

    /// Whether the rule wants a parsed Rust syntax tree in its context.
    ///
    /// The tree is only produced for `.rs` files that parse.
    fn wants_syntax(&self) -> bool {
        false
    }

    /// Checks a single file and returns the violations found.
    ///
    /// # Errors
    ///
    /// Returns an error when the rule cannot evaluate the file.
    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions)
        -> Result<Vec<Violation>, RuleError>;

    /// Computes revised content that resolves `violation`.
    ///
    /// Returns `Ok(None)` when this violation cannot be fixed. The default
    /// applies the violation's replacement, if it carries one.
    ///
    /// # Errors
    ///
    /// Returns an error when the fix cannot be computed.
    fn fix(
        &self,
        content: &str,
        violation: &Violation,
        _options: &RuleOptions,
    ) -> Result<Option<String>, RuleError> {
        let Some(replacement) = violation.fix.as_ref().and_then(|f| f.replacement.as_ref()) else {
            return Ok(None);
        };
        replacement
            .apply(content)
            .map(Some)
            .ok_or_else(|| RuleError::new("replacement does not fit the current content"))
    }
}

/// Shared handle to a registered rule.
pub type RuleRef = Arc<dyn Rule>;
