//! Rule to require a line break at the end of every non-empty file.

use conform_core::{
    Category, FileContext, Fix, Replacement, Rule, RuleError, RuleOptions, Severity, Span,
    Violation,
};

/// Rule id for final-newline.
pub const ID: &str = "final-newline";

/// Requires non-empty files to end with `\n`.
#[derive(Debug, Clone, Default)]
pub struct FinalNewline;

impl FinalNewline {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for FinalNewline {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Style
    }

    fn description(&self) -> &str {
        "Requires a line break at the end of the file"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn is_fixable(&self) -> bool {
        true
    }

    fn check(&self, ctx: &FileContext<'_>, _options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let content = ctx.content;
        if content.is_empty() || content.ends_with('\n') {
            return Ok(Vec::new());
        }
        let end = content.len();
        Ok(vec![Violation::new(
            ID,
            self.default_severity(),
            ctx.path,
            ctx.span_at(end, 0),
            "missing line break at end of file",
        )
        .with_fix(Fix::replace(
            "append a line break",
            Replacement::new(Span::new(end, 0), "\n"),
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn check(content: &str) -> Vec<Violation> {
        let ctx = FileContext::new(Path::new("test.txt"), content);
        FinalNewline::new().check(&ctx, &RuleOptions::new()).unwrap()
    }

    #[test]
    fn missing_newline_is_reported_at_end() {
        let violations = check("a\nbc");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location.line, 2);
        assert_eq!(violations[0].location.column, 3);
    }

    #[test]
    fn empty_and_terminated_files_pass() {
        assert!(check("").is_empty());
        assert!(check("a\n").is_empty());
    }

    #[test]
    fn fix_appends_newline() {
        let violation = check("abc").remove(0);
        let fixed = FinalNewline::new()
            .fix("abc", &violation, &RuleOptions::new())
            .unwrap();
        assert_eq!(fixed.as_deref(), Some("abc\n"));
    }
}
