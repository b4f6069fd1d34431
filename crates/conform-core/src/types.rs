//! Core value types: severities, locations, fixes and violations.

use miette::{Diagnostic, SourceSpan};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Severity level for violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message, does not fail a run.
    Info,
    /// Warning that should be addressed.
    Warning,
    /// Error that must be fixed.
    Error,
}

impl Severity {
    /// Parses one of the recognized level names (`info`, `warning`, `error`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Rule category, used for grouping and preset construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// General code quality.
    Quality,
    /// Formatting and layout.
    Style,
    /// Runtime performance.
    Performance,
    /// Security-sensitive patterns.
    Security,
    /// Structural and layering constraints.
    Architecture,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Quality => "quality",
            Self::Style => "style",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Architecture => "architecture",
        };
        f.write_str(name)
    }
}

/// Half-open byte range `[start, end)` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// First byte of the range.
    pub start: usize,
    /// One past the last byte of the range.
    pub end: usize,
}

impl Span {
    /// Creates a span from a start offset and a length.
    #[must_use]
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true for an empty (insertion point) span.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the two spans touch the same bytes.
    ///
    /// Two empty spans overlap when they share a position; an empty span
    /// overlaps a non-empty one when it sits strictly inside it.
    #[must_use]
    pub fn overlaps(&self, other: &Span) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => self.start == other.start,
            (true, false) => self.start > other.start && self.start < other.end,
            (false, true) => other.start > self.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }
}

/// Source location of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed, in characters).
    pub column: usize,
    /// Byte range, when the rule can provide one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Location {
    /// Creates a location with line and column only.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            span: None,
        }
    }

    /// Attaches a byte range to this location.
    #[must_use]
    pub fn with_span(mut self, start: usize, len: usize) -> Self {
        self.span = Some(Span::new(start, len));
        self
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
            .then(self.span.cmp(&other.span))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Replaces the bytes of `span` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replacement {
    /// Range to replace.
    pub span: Span,
    /// New text to insert.
    pub new_text: String,
}

impl Replacement {
    /// Creates a new replacement.
    #[must_use]
    pub fn new(span: Span, new_text: impl Into<String>) -> Self {
        Self {
            span,
            new_text: new_text.into(),
        }
    }

    /// Applies the replacement to `content`.
    ///
    /// Returns `None` when the span falls outside the content or does not
    /// sit on character boundaries.
    #[must_use]
    pub fn apply(&self, content: &str) -> Option<String> {
        let Span { start, end } = self.span;
        if start > end
            || end > content.len()
            || !content.is_char_boundary(start)
            || !content.is_char_boundary(end)
        {
            return None;
        }
        let mut out = String::with_capacity(content.len() - (end - start) + self.new_text.len());
        out.push_str(&content[..start]);
        out.push_str(&self.new_text);
        out.push_str(&content[end..]);
        Some(out)
    }
}

/// Machine-readable fix descriptor attached to a violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fix {
    /// Human-readable description of the fix.
    pub message: String,
    /// Automatic replacement, if the fix is a plain text edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<Replacement>,
}

impl Fix {
    /// Creates a fix hint without an automatic edit.
    #[must_use]
    pub fn hint(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            replacement: None,
        }
    }

    /// Creates a fix carrying an automatic edit.
    #[must_use]
    pub fn replace(message: impl Into<String>, replacement: Replacement) -> Self {
        Self {
            message: message.into(),
            replacement: Some(replacement),
        }
    }
}

/// A single finding reported by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Id of the rule that produced this violation.
    pub rule: String,
    /// Severity after configuration overrides.
    pub severity: Severity,
    /// File the violation was found in.
    pub path: PathBuf,
    /// Location inside the file.
    pub location: Location,
    /// Human-readable message.
    pub message: String,
    /// Optional fix descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        rule: impl Into<String>,
        severity: Severity,
        path: impl Into<PathBuf>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            path: path.into(),
            location,
            message: message.into(),
            fix: None,
        }
    }

    /// Attaches a fix descriptor.
    #[must_use]
    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Returns the same violation reported against another path.
    #[must_use]
    pub fn rehomed(mut self, path: &Path) -> Self {
        if self.path != path {
            self.path = path.to_path_buf();
        }
        self
    }

    /// Canonical report order: path, rule id, location, then message.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.severity.cmp(&other.severity))
    }

    /// Formats the violation for terminal output.
    #[must_use]
    pub fn format(&self) -> String {
        use std::fmt::Write;
        let mut output = format!(
            "{} at {}:{}:{}\n",
            self.rule,
            self.path.display(),
            self.location.line,
            self.location.column,
        );
        let _ = writeln!(output, "  {}: {}", self.severity, self.message);
        if let Some(fix) = &self.fix {
            let _ = writeln!(output, "  = help: {}", fix.message);
        }
        output
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.path.display(),
            self.location.line,
            self.location.column,
            self.severity,
            self.rule,
            self.message
        )
    }
}

/// A violation rendered as a miette diagnostic.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("[{rule}] {message}")]
pub struct ViolationDiagnostic {
    rule: String,
    message: String,
    #[help]
    help: Option<String>,
    #[label("{severity}")]
    span: SourceSpan,
    severity: Severity,
}

impl From<&Violation> for ViolationDiagnostic {
    fn from(v: &Violation) -> Self {
        let span = v
            .location
            .span
            .map_or_else(|| SourceSpan::from((0, 0)), |s| SourceSpan::from((s.start, s.len())));
        Self {
            rule: v.rule.clone(),
            message: v.message.clone(),
            help: v.fix.as_ref().map(|f| f.message.clone()),
            span,
            severity: v.severity,
        }
    }
}

/// Sorts violations into canonical report order.
pub fn sort_canonical(violations: &mut [Violation]) {
    violations.sort_by(Violation::canonical_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_violation(path: &str, rule: &str, line: usize) -> Violation {
        Violation::new(
            rule,
            Severity::Warning,
            path,
            Location::new(line, 1),
            "something is off",
        )
    }

    #[test]
    fn severity_parse_accepts_known_levels() {
        assert_eq!(Severity::parse("info"), Some(Severity::Info));
        assert_eq!(Severity::parse("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse(" error "), Some(Severity::Error));
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn severity_orders_by_level() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn span_overlap_rules() {
        let a = Span::new(2, 4);
        assert!(a.overlaps(&Span::new(5, 3)));
        assert!(!a.overlaps(&Span::new(6, 1)));
        assert!(Span::new(3, 0).overlaps(&a));
        assert!(!Span::new(2, 0).overlaps(&a));
        assert!(Span::new(9, 0).overlaps(&Span::new(9, 0)));
    }

    #[test]
    fn replacement_apply_edits_bytes() {
        let r = Replacement::new(Span::new(5, 2), "");
        assert_eq!(r.apply("hello  \n").as_deref(), Some("hello\n"));
    }

    #[test]
    fn replacement_apply_rejects_out_of_range() {
        let r = Replacement::new(Span::new(10, 2), "x");
        assert!(r.apply("short").is_none());
    }

    #[test]
    fn replacement_apply_rejects_split_char() {
        let r = Replacement::new(Span::new(1, 1), "x");
        assert!(r.apply("é").is_none());
    }

    #[test]
    fn canonical_order_is_path_rule_location() {
        let mut vs = vec![
            make_violation("b.txt", "alpha", 1),
            make_violation("a.txt", "beta", 1),
            make_violation("a.txt", "alpha", 3),
            make_violation("a.txt", "alpha", 2),
        ];
        sort_canonical(&mut vs);
        let keys: Vec<(String, String, usize)> = vs
            .iter()
            .map(|v| (v.path.display().to_string(), v.rule.clone(), v.location.line))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a.txt".into(), "alpha".into(), 2),
                ("a.txt".into(), "alpha".into(), 3),
                ("a.txt".into(), "beta".into(), 1),
                ("b.txt".into(), "alpha".into(), 1),
            ]
        );
    }

    #[test]
    fn violation_display_is_compact() {
        let v = make_violation("src/a.txt", "no-tabs", 4);
        assert_eq!(
            v.to_string(),
            "src/a.txt:4:1: warning [no-tabs] something is off"
        );
    }

    #[test]
    fn violation_format_includes_fix_hint() {
        let v = make_violation("a.txt", "no-tabs", 1).with_fix(Fix::hint("use spaces"));
        assert!(v.format().contains("= help: use spaces"));
    }

    #[test]
    fn rehomed_changes_path_only() {
        let v = make_violation("a.txt", "no-tabs", 1).rehomed(Path::new("b.txt"));
        assert_eq!(v.path, PathBuf::from("b.txt"));
        assert_eq!(v.location.line, 1);
    }
}
