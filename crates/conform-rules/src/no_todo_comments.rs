//! Rule to surface TODO-style markers in comments.
//!
//! # Configuration
//!
//! - `markers`: words to look for (default: `["TODO", "FIXME", "XXX"]`)
//!
//! # Detected Patterns
//!
//! A marker counts when it appears after a line comment (`//`, `#`, `--`)
//! or a block comment opener (`/*`, `<!--`) on the same line.

use conform_core::{
    Category, FileContext, OptionKind, OptionSpec, Rule, RuleError, RuleOptions, Severity,
    Violation,
};

/// Rule id for no-todo-comments.
pub const ID: &str = "no-todo-comments";

const DEFAULT_MARKERS: &[&str] = &["TODO", "FIXME", "XXX"];

const COMMENT_OPENERS: &[&str] = &["//", "/*", "<!--", "#", "--"];

const OPTIONS: &[OptionSpec] = &[OptionSpec::optional(
    "markers",
    OptionKind::StringList,
    "marker words to report",
)];

/// Reports marker words left in comments.
#[derive(Debug, Clone, Default)]
pub struct NoTodoComments;

impl NoTodoComments {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for NoTodoComments {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn description(&self) -> &str {
        "Reports TODO/FIXME markers in comments"
    }

    fn default_severity(&self) -> Severity {
        Severity::Info
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let markers = options
            .get_str_array("markers")
            .unwrap_or_else(|| DEFAULT_MARKERS.iter().map(|m| (*m).to_string()).collect());

        let mut violations = Vec::new();
        for (_, start, text) in ctx.lines() {
            let Some(comment) = COMMENT_OPENERS.iter().filter_map(|o| text.find(o)).min() else {
                continue;
            };
            let tail = &text[comment..];
            for marker in markers.iter().filter(|m| !m.is_empty()) {
                for (i, _) in tail.match_indices(marker.as_str()) {
                    if !is_word_at(tail, i, marker.len()) {
                        continue;
                    }
                    let offset = start + comment + i;
                    violations.push(Violation::new(
                        ID,
                        self.default_severity(),
                        ctx.path,
                        ctx.span_at(offset, marker.len()),
                        format!("{marker} comment"),
                    ));
                }
            }
        }
        Ok(violations)
    }
}

fn is_word_at(text: &str, start: usize, len: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[start + len..].chars().next();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn check(content: &str, options: &RuleOptions) -> Vec<Violation> {
        let ctx = FileContext::new(Path::new("test.rs"), content);
        NoTodoComments::new().check(&ctx, options).unwrap()
    }

    #[test]
    fn finds_markers_in_comments_only() {
        let content = "let todo = \"TODO\";\n// TODO: later\n# FIXME\n";
        let violations = check(content, &RuleOptions::new());
        let lines: Vec<usize> = violations.iter().map(|v| v.location.line).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(violations[0].location.column, 4);
    }

    #[test]
    fn respects_word_boundaries() {
        assert!(check("// TODOS and XXXL\n", &RuleOptions::new()).is_empty());
    }

    #[test]
    fn custom_markers() {
        let options = RuleOptions::new().with("markers", vec!["HACK"]);
        let violations = check("// HACK: TODO\n", &options);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "HACK comment");
    }
}
