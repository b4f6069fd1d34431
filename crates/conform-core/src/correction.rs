//! Correction: applies auto-fixes in bounded rounds and re-verifies.
//!
//! Each round plans a non-conflicting set of fixes for one file, applies
//! them in location order while rebasing the rest onto the edited text,
//! then re-runs verification on that file alone. Rounds stop when nothing
//! fixable is left, when every remaining candidate has failed or
//! oscillated, or when the round budget is spent.

use crate::cache::ResultCache;
use crate::config::{EffectiveConfiguration, Strategy};
use crate::context::{location_at, offset_for};
use crate::executor::{panic_cause, sleep_until, DetachedRuntime, Executor, FileInput, RunControl};
use crate::registry::RuleRegistry;
use crate::result::{RunStatus, VerificationResult};
use crate::rule::{RuleError, RuleRef};
use crate::types::{Span, Violation};
use crate::vfs::FileTree;
use crate::EngineError;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a violation survived correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ResidualReason {
    /// The rule offers no correction.
    NotAutoFixable,
    /// Correction is switched off in the configuration.
    AutoFixDisabled,
    /// Still present after the last permitted round.
    MaxRoundsExceeded,
    /// Reappeared after its fix was applied.
    OscillationDetected,
    /// Applying the fix failed.
    FixFailed {
        /// Error or panic message from the fix.
        cause: String,
    },
    /// The run was cancelled before the file was corrected.
    Cancelled,
}

impl fmt::Display for ResidualReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAutoFixable => f.write_str("not auto-fixable"),
            Self::AutoFixDisabled => f.write_str("auto-fix disabled"),
            Self::MaxRoundsExceeded => f.write_str("max rounds exceeded"),
            Self::OscillationDetected => f.write_str("oscillation detected"),
            Self::FixFailed { cause } => write!(f, "fix failed: {cause}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A violation left after correction, with the reason it remains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualViolation {
    /// The violation as last observed.
    pub violation: Violation,
    /// Why it was not corrected.
    #[serde(flatten)]
    pub reason: ResidualReason,
}

/// Per-file correction summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCorrection {
    /// File that was corrected.
    pub path: PathBuf,
    /// Rounds run.
    pub rounds: usize,
    /// Fixes that changed the content.
    pub fixes_applied: usize,
    /// Whether the content was written back.
    pub changed: bool,
}

/// Outcome of a correction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionReport {
    /// Verification state after correction.
    pub verification: VerificationResult,
    /// Violations that remain, with reasons, in canonical order.
    pub residual: Vec<ResidualViolation>,
    /// Files that had fixable violations.
    pub files: Vec<FileCorrection>,
}

impl CorrectionReport {
    /// Total fixes applied across files.
    #[must_use]
    pub fn fixes_applied(&self) -> usize {
        self.files.iter().map(|f| f.fixes_applied).sum()
    }

    /// Paths whose content changed.
    pub fn changed_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|f| f.changed)
            .map(|f| f.path.as_path())
    }

    /// Returns true if nothing remains.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.residual.is_empty()
    }
}

/// The fixes chosen for one round on one file.
///
/// Candidates are ranked by severity (highest first), then by rule
/// registration order, then by location. A candidate whose edit range
/// overlaps an already accepted one is deferred to a later round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionPlan {
    path: PathBuf,
    accepted: Vec<Violation>,
    deferred: Vec<Violation>,
}

impl CorrectionPlan {
    /// Builds a plan from fixable candidates of a single file.
    #[must_use]
    pub fn build(path: &Path, mut candidates: Vec<Violation>, registry: &RuleRegistry) -> Self {
        let position = |id: &str| registry.position(id).unwrap_or(usize::MAX);
        candidates.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| position(&a.rule).cmp(&position(&b.rule)))
                .then_with(|| a.location.cmp(&b.location))
                .then_with(|| a.message.cmp(&b.message))
        });

        let mut accepted: Vec<Violation> = Vec::new();
        let mut deferred = Vec::new();
        for candidate in candidates {
            if accepted.iter().any(|a| conflicts(a, &candidate)) {
                debug!(
                    "Deferring {} at {}:{}: overlaps a higher-ranked fix",
                    candidate.rule, candidate.location.line, candidate.location.column
                );
                deferred.push(candidate);
            } else {
                accepted.push(candidate);
            }
        }
        accepted.sort_by(|a, b| a.location.cmp(&b.location).then_with(|| a.rule.cmp(&b.rule)));

        Self {
            path: path.to_path_buf(),
            accepted,
            deferred,
        }
    }

    /// File the plan applies to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fixes to apply this round, in location order.
    #[must_use]
    pub fn accepted(&self) -> &[Violation] {
        &self.accepted
    }

    /// Fixes held back because they conflict with an accepted one.
    #[must_use]
    pub fn deferred(&self) -> &[Violation] {
        &self.deferred
    }

    /// Returns true if nothing is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Byte range a fix would touch, when known.
fn edit_range(violation: &Violation) -> Option<Span> {
    violation
        .fix
        .as_ref()
        .and_then(|f| f.replacement.as_ref())
        .map(|r| r.span)
        .or(violation.location.span)
}

fn conflicts(a: &Violation, b: &Violation) -> bool {
    match (edit_range(a), edit_range(b)) {
        (Some(x), Some(y)) => x.overlaps(&y),
        _ => a.location.line == b.location.line,
    }
}

/// Identity of a violation across rounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViolationKey {
    rule: String,
    line: usize,
    column: usize,
    message: String,
}

impl From<&Violation> for ViolationKey {
    fn from(v: &Violation) -> Self {
        Self {
            rule: v.rule.clone(),
            line: v.location.line,
            column: v.location.column,
            message: v.message.clone(),
        }
    }
}

/// The single changed region between two versions of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextEdit {
    start: usize,
    old_end: usize,
    new_end: usize,
}

impl TextEdit {
    fn between(before: &str, after: &str) -> Self {
        let (b, a) = (before.as_bytes(), after.as_bytes());
        let mut prefix = b.iter().zip(a).take_while(|(x, y)| x == y).count();
        while !before.is_char_boundary(prefix) {
            prefix -= 1;
        }
        let room = b.len().min(a.len()) - prefix;
        let mut suffix = b
            .iter()
            .rev()
            .zip(a.iter().rev())
            .take(room)
            .take_while(|(x, y)| x == y)
            .count();
        while !before.is_char_boundary(b.len() - suffix) || !after.is_char_boundary(a.len() - suffix) {
            suffix -= 1;
        }
        Self {
            start: prefix,
            old_end: b.len() - suffix,
            new_end: a.len() - suffix,
        }
    }

    /// Maps a span of the old text into the new one, or `None` if the edit
    /// touches it.
    fn map(&self, span: Span) -> Option<Span> {
        if span.end <= self.start && span.start < self.start {
            Some(span)
        } else if span.start >= self.old_end && span.start != self.start {
            Some(Span {
                start: span.start - self.old_end + self.new_end,
                end: span.end - self.old_end + self.new_end,
            })
        } else {
            None
        }
    }

    /// Moves a pending violation onto the new text.
    fn rebase(&self, mut violation: Violation, before: &str, after: &str) -> Option<Violation> {
        let anchor = violation.location.span.unwrap_or_else(|| {
            let offset = offset_for(before, violation.location.line, violation.location.column);
            Span {
                start: offset,
                end: offset,
            }
        });
        let moved = self.map(anchor)?;
        if let Some(replacement) = violation.fix.as_mut().and_then(|f| f.replacement.as_mut()) {
            replacement.span = self.map(replacement.span)?;
        }
        if moved != anchor {
            let mut location = location_at(after, moved.start);
            location.span = violation.location.span.map(|_| moved);
            violation.location = location;
        }
        Some(violation)
    }
}

/// Result of applying one plan.
struct PlanOutcome {
    content: String,
    applied: Vec<ViolationKey>,
    failed: Vec<(ViolationKey, String)>,
    /// Cancellation or the run deadline cut the plan short.
    stopped: bool,
}

/// How one fix call ended.
enum FixAttempt {
    Returned(Result<Option<String>, RuleError>),
    Panicked(String),
    TimedOut(Duration),
    Stopped,
}

/// Drives correction for one engine call.
pub(crate) struct Corrector<'a> {
    pub(crate) registry: &'a RuleRegistry,
    pub(crate) rules: &'a [RuleRef],
    pub(crate) executor: &'a Executor,
    pub(crate) cache: &'a ResultCache,
    pub(crate) config: &'a EffectiveConfiguration,
    pub(crate) control: &'a RunControl,
}

impl Corrector<'_> {
    /// Corrects every file of `initial` that has fixable violations.
    pub(crate) fn run(
        &self,
        tree: &mut dyn FileTree,
        mut verification: VerificationResult,
    ) -> Result<CorrectionReport, EngineError> {
        let rule_order: Vec<String> = self.rules.iter().map(|r| r.id().to_string()).collect();

        if verification.is_cancelled() {
            let residual = with_reason(&verification.violations, |_| ResidualReason::Cancelled);
            return Ok(CorrectionReport {
                verification,
                residual,
                files: Vec::new(),
            });
        }
        if !self.config.auto_fix() {
            let residual = with_reason(&verification.violations, |v| {
                if self.is_fixable(v) {
                    ResidualReason::AutoFixDisabled
                } else {
                    ResidualReason::NotAutoFixable
                }
            });
            return Ok(CorrectionReport {
                verification,
                residual,
                files: Vec::new(),
            });
        }

        let mut by_file: BTreeMap<PathBuf, Vec<Violation>> = BTreeMap::new();
        for violation in &verification.violations {
            by_file
                .entry(violation.path.clone())
                .or_default()
                .push(violation.clone());
        }

        let mut residual = Vec::new();
        let mut files = Vec::new();
        for (path, violations) in by_file {
            if !violations.iter().any(|v| self.is_fixable(v)) {
                residual.extend(with_reason(&violations, |_| ResidualReason::NotAutoFixable));
                continue;
            }
            if self.control.should_stop() {
                verification.status = RunStatus::Cancelled;
                residual.extend(with_reason(&violations, |_| ResidualReason::Cancelled));
                continue;
            }
            let outcome = self.correct_file(tree, &path, violations)?;
            if let Some(result) = outcome.verification {
                verification.replace_file(&path, result, &rule_order);
            }
            residual.extend(outcome.residual);
            files.push(outcome.summary);
        }

        residual.sort_by(|a, b| a.violation.canonical_cmp(&b.violation));
        info!(
            "Correction finished: {} fix(es) applied, {} violation(s) remain",
            files.iter().map(|f: &FileCorrection| f.fixes_applied).sum::<usize>(),
            residual.len()
        );
        Ok(CorrectionReport {
            verification,
            residual,
            files,
        })
    }

    fn is_fixable(&self, violation: &Violation) -> bool {
        self.registry
            .get(&violation.rule)
            .is_some_and(|rule| rule.is_fixable())
    }

    fn correct_file(
        &self,
        tree: &mut dyn FileTree,
        path: &Path,
        initial: Vec<Violation>,
    ) -> Result<FileOutcome, EngineError> {
        let original = tree.read(path)?;
        let mut content = original.clone();
        let mut current = initial;
        let mut attempted: HashSet<ViolationKey> = HashSet::new();
        let mut oscillating: HashSet<ViolationKey> = HashSet::new();
        let mut failed: HashMap<ViolationKey, String> = HashMap::new();
        let mut latest: Option<VerificationResult> = None;
        let mut rounds = 0;
        let mut fixes_applied = 0;
        let mut interrupted = false;
        let runtime = DetachedRuntime::new(Strategy::Sequential, 1)?;

        loop {
            let mut fresh = Vec::new();
            for violation in current.iter().filter(|v| self.is_fixable(v)) {
                let key = ViolationKey::from(violation);
                if failed.contains_key(&key) || oscillating.contains(&key) {
                    continue;
                }
                if attempted.contains(&key) {
                    warn!(
                        "{} at {}:{} reappeared after its fix; giving up on it",
                        violation.rule,
                        path.display(),
                        violation.location.line
                    );
                    oscillating.insert(key);
                    continue;
                }
                fresh.push(violation.clone());
            }
            if fresh.is_empty() || rounds >= self.config.max_fix_rounds() {
                break;
            }
            if self.control.should_stop() {
                interrupted = true;
                break;
            }

            rounds += 1;
            let plan = CorrectionPlan::build(path, fresh, self.registry);
            debug!(
                "Round {rounds} on {}: {} fix(es) planned, {} deferred",
                path.display(),
                plan.accepted().len(),
                plan.deferred().len()
            );
            let outcome = self.apply(&runtime, &content, &plan);
            fixes_applied += outcome.applied.len();
            attempted.extend(outcome.applied);
            failed.extend(outcome.failed);

            if outcome.content != content {
                content = outcome.content;
                self.cache.invalidate(path);
            }
            if outcome.stopped {
                interrupted = true;
                break;
            }

            let result = self.executor.run(
                self.rules,
                vec![FileInput::new(path.to_path_buf(), content.as_str())],
                Vec::new(),
                self.config,
                self.control,
            )?;
            current.clone_from(&result.violations);
            let cancelled = result.is_cancelled();
            latest = Some(result);
            if cancelled {
                interrupted = true;
                break;
            }
        }

        let changed = content != original;
        if changed {
            tree.write(path, content)?;
        }

        let residual = current
            .into_iter()
            .map(|violation| {
                let key = ViolationKey::from(&violation);
                let reason = if !self.is_fixable(&violation) {
                    ResidualReason::NotAutoFixable
                } else if let Some(cause) = failed.get(&key) {
                    ResidualReason::FixFailed {
                        cause: cause.clone(),
                    }
                } else if oscillating.contains(&key) {
                    ResidualReason::OscillationDetected
                } else if interrupted {
                    ResidualReason::Cancelled
                } else {
                    ResidualReason::MaxRoundsExceeded
                };
                ResidualViolation { violation, reason }
            })
            .collect();

        Ok(FileOutcome {
            verification: latest,
            residual,
            summary: FileCorrection {
                path: path.to_path_buf(),
                rounds,
                fixes_applied,
                changed,
            },
        })
    }

    /// Applies a plan's fixes to `content`, rebasing later fixes after each
    /// edit. Fixes the edit touched are dropped and picked up next round.
    fn apply(&self, runtime: &DetachedRuntime, content: &str, plan: &CorrectionPlan) -> PlanOutcome {
        let mut content = content.to_string();
        let mut applied = Vec::new();
        let mut failed = Vec::new();
        let mut stopped = false;
        let mut pending: Vec<Violation> = plan.accepted().to_vec();
        pending.reverse();

        while let Some(violation) = pending.pop() {
            let key = ViolationKey::from(&violation);
            let Some(rule) = self.registry.get(&violation.rule) else {
                continue;
            };
            let next = match self.attempt_fix(runtime, rule, &content, &violation) {
                FixAttempt::Returned(Ok(Some(next))) if next != content => next,
                FixAttempt::Returned(Ok(Some(_))) => {
                    failed.push((key, "fix made no change".to_string()));
                    continue;
                }
                FixAttempt::Returned(Ok(None)) => {
                    failed.push((key, "rule offered no fix for this violation".to_string()));
                    continue;
                }
                FixAttempt::Returned(Err(e)) => {
                    warn!("Fix for {} failed: {e}", violation.rule);
                    failed.push((key, e.to_string()));
                    continue;
                }
                FixAttempt::Panicked(cause) => {
                    warn!("Fix for {} panicked", violation.rule);
                    failed.push((key, cause));
                    continue;
                }
                FixAttempt::TimedOut(after) => {
                    warn!(
                        "Fix for {} timed out after {after:?} on {}",
                        violation.rule,
                        violation.path.display()
                    );
                    failed.push((key, format!("fix timed out after {}ms", after.as_millis())));
                    continue;
                }
                FixAttempt::Stopped => {
                    stopped = true;
                    break;
                }
            };

            let edit = TextEdit::between(&content, &next);
            let before = std::mem::replace(&mut content, next);
            applied.push(key);
            pending = pending
                .into_iter()
                .filter_map(|p| edit.rebase(p, &before, &content))
                .collect();
        }

        PlanOutcome {
            content,
            applied,
            failed,
            stopped,
        }
    }

    /// Runs one fix on the blocking pool under the rule timeout.
    fn attempt_fix(
        &self,
        runtime: &DetachedRuntime,
        rule: &RuleRef,
        content: &str,
        violation: &Violation,
    ) -> FixAttempt {
        let limit = self.config.rule_timeout();
        let rule = Arc::clone(rule);
        let content = content.to_string();
        let violation = violation.clone();
        let options = self.config.options_for(&violation.rule);
        let control = self.control;

        runtime.block_on(async move {
            let handle =
                tokio::task::spawn_blocking(move || rule.fix(&content, &violation, &options));
            tokio::select! {
                biased;
                () = control.cancel.cancelled() => FixAttempt::Stopped,
                () = sleep_until(control.deadline) => FixAttempt::Stopped,
                joined = tokio::time::timeout(limit, handle) => match joined {
                    Err(_) => FixAttempt::TimedOut(limit),
                    Ok(Err(join_error)) => FixAttempt::Panicked(panic_cause(join_error, "fix")),
                    Ok(Ok(result)) => FixAttempt::Returned(result),
                },
            }
        })
    }
}

struct FileOutcome {
    verification: Option<VerificationResult>,
    residual: Vec<ResidualViolation>,
    summary: FileCorrection,
}

fn with_reason(
    violations: &[Violation],
    reason: impl Fn(&Violation) -> ResidualReason,
) -> Vec<ResidualViolation> {
    violations
        .iter()
        .map(|v| ResidualViolation {
            violation: v.clone(),
            reason: reason(v),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileContext;
    use crate::options::RuleOptions;
    use crate::rule::{Rule, RuleError};
    use crate::types::{Category, Fix, Location, Replacement, Severity};

    struct Dummy(&'static str);

    impl Rule for Dummy {
        fn id(&self) -> &str {
            self.0
        }
        fn category(&self) -> Category {
            Category::Style
        }
        fn check(
            &self,
            _ctx: &FileContext<'_>,
            _options: &RuleOptions,
        ) -> Result<Vec<Violation>, RuleError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        registry.register(Dummy("first")).unwrap();
        registry.register(Dummy("second")).unwrap();
        registry
    }

    fn spanned(rule: &str, severity: Severity, start: usize, len: usize) -> Violation {
        let replacement = Replacement::new(Span::new(start, len), "");
        Violation::new(rule, severity, "f.txt", Location::new(1, start + 1).with_span(start, len), "m")
            .with_fix(Fix::replace("remove", replacement))
    }

    #[test]
    fn plan_prefers_higher_severity_on_overlap() {
        let plan = CorrectionPlan::build(
            Path::new("f.txt"),
            vec![
                spanned("first", Severity::Warning, 0, 4),
                spanned("second", Severity::Error, 2, 4),
            ],
            &registry(),
        );
        assert_eq!(plan.accepted().len(), 1);
        assert_eq!(plan.accepted()[0].rule, "second");
        assert_eq!(plan.deferred()[0].rule, "first");
    }

    #[test]
    fn plan_breaks_severity_ties_by_registration_order() {
        let plan = CorrectionPlan::build(
            Path::new("f.txt"),
            vec![
                spanned("second", Severity::Warning, 0, 4),
                spanned("first", Severity::Warning, 2, 4),
            ],
            &registry(),
        );
        assert_eq!(plan.accepted()[0].rule, "first");
    }

    #[test]
    fn plan_keeps_disjoint_fixes_in_location_order() {
        let plan = CorrectionPlan::build(
            Path::new("f.txt"),
            vec![
                spanned("first", Severity::Info, 10, 2),
                spanned("second", Severity::Error, 0, 2),
            ],
            &registry(),
        );
        let starts: Vec<usize> = plan
            .accepted()
            .iter()
            .filter_map(|v| v.location.span.map(|s| s.start))
            .collect();
        assert_eq!(starts, vec![0, 10]);
        assert!(plan.deferred().is_empty());
    }

    #[test]
    fn text_edit_finds_changed_region() {
        let edit = TextEdit::between("abc  \ndef", "abc\ndef");
        assert_eq!(
            edit,
            TextEdit {
                start: 3,
                old_end: 5,
                new_end: 3
            }
        );
    }

    #[test]
    fn rebase_shifts_later_violations() {
        let before = "a  \nb  \n";
        let after = "a\nb  \n";
        let edit = TextEdit::between(before, after);
        let later = spanned("first", Severity::Warning, 5, 2);
        let later = Violation {
            location: location_at(before, 5).with_span(5, 2),
            ..later
        };
        let moved = edit.rebase(later, before, after).unwrap();
        assert_eq!(moved.location.line, 2);
        assert_eq!(moved.location.span, Some(Span::new(3, 2)));
        let replacement = moved.fix.unwrap().replacement.unwrap();
        assert_eq!(replacement.span, Span::new(3, 2));
        assert_eq!(replacement.apply(after).unwrap(), "a\nb\n");
    }

    #[test]
    fn rebase_defers_touched_violations() {
        let edit = TextEdit::between("abcdef", "abXYef");
        let touched = spanned("first", Severity::Warning, 3, 1);
        assert!(edit.rebase(touched, "abcdef", "abXYef").is_none());
    }

    #[test]
    fn residual_reason_display() {
        assert_eq!(
            ResidualReason::FixFailed {
                cause: "boom".into()
            }
            .to_string(),
            "fix failed: boom"
        );
        assert_eq!(ResidualReason::OscillationDetected.to_string(), "oscillation detected");
    }
}
