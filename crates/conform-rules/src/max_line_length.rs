//! Rule to limit line length.
//!
//! # Configuration
//!
//! - `max`: longest allowed line, in characters (default: 100)

use conform_core::{
    Category, FileContext, OptionKind, OptionSpec, Rule, RuleError, RuleOptions, Severity,
    Violation,
};

/// Rule id for max-line-length.
pub const ID: &str = "max-line-length";

const DEFAULT_MAX: i64 = 100;

const OPTIONS: &[OptionSpec] = &[OptionSpec::optional(
    "max",
    OptionKind::Integer,
    "longest allowed line in characters",
)];

/// Limits the number of characters on a line.
#[derive(Debug, Clone, Default)]
pub struct MaxLineLength;

impl MaxLineLength {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for MaxLineLength {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn description(&self) -> &str {
        "Limits line length"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let max = options.get_int("max", DEFAULT_MAX);
        let max = usize::try_from(max)
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| RuleError::new(format!("max must be positive, got {max}")))?;

        let mut violations = Vec::new();
        for (_, start, text) in ctx.lines() {
            let length = text.chars().count();
            if length <= max {
                continue;
            }
            // Span covers the overflow, starting at the first character past the limit.
            let overflow = text
                .char_indices()
                .nth(max)
                .map_or(text.len(), |(i, _)| i);
            violations.push(Violation::new(
                ID,
                self.default_severity(),
                ctx.path,
                ctx.span_at(start + overflow, text.len() - overflow),
                format!("line is {length} characters long, limit is {max}"),
            ));
        }
        Ok(violations)
    }
}
