//! Rule to forbid tab characters.
//!
//! # Configuration
//!
//! - `tab_width`: spaces written for each tab by the fix (default: 4)
//!
//! # Fix
//!
//! Replaces each run of tabs with `tab_width` spaces per tab.

use conform_core::{
    Category, FileContext, Fix, OptionKind, OptionSpec, Replacement, Rule, RuleError, RuleOptions,
    Severity, Span, Violation,
};

/// Rule id for no-tabs.
pub const ID: &str = "no-tabs";

const DEFAULT_TAB_WIDTH: i64 = 4;

const OPTIONS: &[OptionSpec] = &[OptionSpec::optional(
    "tab_width",
    OptionKind::Integer,
    "spaces per tab when fixing",
)];

/// Forbids tab characters anywhere in the file.
#[derive(Debug, Clone, Default)]
pub struct NoTabs;

impl NoTabs {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for NoTabs {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn description(&self) -> &str {
        "Forbids tab characters"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn is_fixable(&self) -> bool {
        true
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let width = options.get_int("tab_width", DEFAULT_TAB_WIDTH);
        let width = usize::try_from(width)
            .ok()
            .filter(|w| (1..=16).contains(w))
            .ok_or_else(|| RuleError::new(format!("tab_width must be between 1 and 16, got {width}")))?;

        let bytes = ctx.content.as_bytes();
        let mut violations = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\t' {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i] == b'\t' {
                i += 1;
            }
            let count = i - start;
            violations.push(
                Violation::new(
                    ID,
                    self.default_severity(),
                    ctx.path,
                    ctx.span_at(start, count),
                    if count == 1 {
                        "tab character".to_string()
                    } else {
                        format!("{count} tab characters")
                    },
                )
                .with_fix(Fix::replace(
                    "replace tabs with spaces",
                    Replacement::new(Span::new(start, count), " ".repeat(count * width)),
                )),
            );
        }
        Ok(violations)
    }
}
