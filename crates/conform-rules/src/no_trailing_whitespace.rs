//! Rule to forbid whitespace at the end of a line.
//!
//! # Fix
//!
//! Deletes the trailing spaces and tabs. A `\r` before the line break is
//! left alone.

use conform_core::{
    Category, FileContext, Fix, Replacement, Rule, RuleError, RuleOptions, Severity, Span,
    Violation,
};

/// Rule id for no-trailing-whitespace.
pub const ID: &str = "no-trailing-whitespace";

/// Forbids spaces and tabs before a line break or the end of the file.
#[derive(Debug, Clone, Default)]
pub struct NoTrailingWhitespace;

impl NoTrailingWhitespace {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for NoTrailingWhitespace {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn description(&self) -> &str {
        "Forbids trailing spaces and tabs"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn is_fixable(&self) -> bool {
        true
    }

    fn check(&self, ctx: &FileContext<'_>, _options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let mut violations = Vec::new();
        for (_, start, text) in ctx.lines() {
            let trimmed = text.trim_end_matches([' ', '\t']);
            if trimmed.len() == text.len() {
                continue;
            }
            let offset = start + trimmed.len();
            let len = text.len() - trimmed.len();
            violations.push(
                Violation::new(
                    ID,
                    self.default_severity(),
                    ctx.path,
                    ctx.span_at(offset, len),
                    format!("{len} trailing whitespace character(s)"),
                )
                .with_fix(Fix::replace(
                    "remove trailing whitespace",
                    Replacement::new(Span::new(offset, len), ""),
                )),
            );
        }
        Ok(violations)
    }
}
