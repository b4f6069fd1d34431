//! Verification results and run metadata.

use crate::config::Strategy;
use crate::types::{Severity, Violation};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of one rule×file unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    /// The rule ran and returned normally.
    Completed {
        /// Violations the rule returned.
        violations: usize,
    },
    /// A cached result was reused.
    CacheHit {
        /// Violations in the cached result.
        violations: usize,
    },
    /// The rule did not return within the configured timeout.
    TimedOut {
        /// The timeout that elapsed.
        after: Duration,
    },
    /// The rule returned an error or panicked.
    Fault {
        /// Error message or panic payload.
        cause: String,
    },
}

impl UnitStatus {
    /// Returns true for timeouts and faults.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Fault { .. })
    }
}

/// Record of one executed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Rule id.
    pub rule: String,
    /// File path.
    pub path: PathBuf,
    /// Outcome.
    #[serde(flatten)]
    pub status: UnitStatus,
    /// Wall-clock time spent on the unit.
    pub duration: Duration,
}

/// A file of the target set that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// File path.
    pub path: PathBuf,
    /// Reason it could not be read.
    pub message: String,
}

/// Whether the run finished or was cut short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every unit was dispatched.
    #[default]
    Complete,
    /// Dispatch stopped early; the result is partial.
    Cancelled,
}

/// Per-rule aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    /// Rule id.
    pub rule: String,
    /// Total time across the rule's units.
    pub duration: Duration,
    /// Units executed or served from cache.
    pub units: usize,
    /// Units that ran to completion.
    pub completed: usize,
    /// Units served from cache.
    pub cache_hits: usize,
    /// Units that timed out.
    pub timed_out: usize,
    /// Units that faulted.
    pub faults: usize,
    /// Violations reported (after severity floor).
    pub violations: usize,
}

/// Aggregated run metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Strategy the run used.
    pub strategy: Strategy,
    /// Whether the cache was consulted.
    pub cache_enabled: bool,
    /// Per-rule aggregates, in rule registration order.
    pub rules: Vec<RuleStats>,
    /// Cache hits across all units.
    pub cache_hits: usize,
    /// Cache misses across all units (zero when the cache is disabled).
    pub cache_misses: usize,
    /// Units planned for the run.
    pub units_planned: usize,
    /// Units never dispatched because the run was cancelled.
    pub units_skipped: usize,
    /// Files that could not be read.
    pub file_errors: Vec<FileError>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunMetadata {
    /// Number of units that timed out.
    #[must_use]
    pub fn timed_out(&self) -> usize {
        self.rules.iter().map(|r| r.timed_out).sum()
    }

    /// Number of units that faulted.
    #[must_use]
    pub fn faults(&self) -> usize {
        self.rules.iter().map(|r| r.faults).sum()
    }
}

/// Result of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the run completed or was cancelled.
    pub status: RunStatus,
    /// Violations in canonical order.
    pub violations: Vec<Violation>,
    /// Unit outcomes, ordered by path then rule.
    pub units: Vec<UnitReport>,
    /// Aggregates.
    pub metadata: RunMetadata,
    /// Number of files read and checked.
    pub files_checked: usize,
}

impl VerificationResult {
    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Returns true if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.has_violations_at(Severity::Error)
    }

    /// Checks if any violations meet or exceed the given severity threshold.
    #[must_use]
    pub fn has_violations_at(&self, severity: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= severity)
    }

    /// Counts violations by severity as `(errors, warnings, infos)`.
    #[must_use]
    pub fn count_by_severity(&self) -> (usize, usize, usize) {
        let count = |s: Severity| self.violations.iter().filter(|v| v.severity == s).count();
        (
            count(Severity::Error),
            count(Severity::Warning),
            count(Severity::Info),
        )
    }

    /// Units that timed out or faulted.
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.status.is_failure())
    }

    /// Violations reported for one file.
    pub fn violations_for<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.path == path)
    }

    /// Violations with timing stripped, for comparing runs.
    #[must_use]
    pub fn outcome_signature(&self) -> (Vec<Violation>, Vec<(String, PathBuf, UnitStatus)>) {
        let units = self
            .units
            .iter()
            .map(|u| {
                let status = match &u.status {
                    UnitStatus::CacheHit { violations } => UnitStatus::Completed {
                        violations: *violations,
                    },
                    other => other.clone(),
                };
                (u.rule.clone(), u.path.clone(), status)
            })
            .collect();
        (self.violations.clone(), units)
    }

    /// Replaces everything recorded for `path` with `other`'s findings.
    ///
    /// Used after correction re-verifies a single file.
    pub fn replace_file(&mut self, path: &Path, other: VerificationResult, rule_order: &[String]) {
        self.violations.retain(|v| v.path != path);
        self.violations.extend(other.violations);
        crate::types::sort_canonical(&mut self.violations);

        self.units.retain(|u| u.path != path);
        self.units.extend(other.units);
        sort_units(&mut self.units, rule_order);

        self.metadata.file_errors.retain(|e| e.path != path);
        self.metadata.file_errors.extend(other.metadata.file_errors);
        self.metadata.units_skipped += other.metadata.units_skipped;
        if other.status == RunStatus::Cancelled {
            self.status = RunStatus::Cancelled;
        }
        self.recompute(rule_order);
    }

    /// Rebuilds the per-rule aggregates and cache counters from `units`.
    ///
    /// `files_checked` is left alone: it counts inputs, not units.
    pub(crate) fn recompute(&mut self, rule_order: &[String]) {
        let mut stats: BTreeMap<&str, RuleStats> = BTreeMap::new();
        for unit in &self.units {
            let entry = stats.entry(unit.rule.as_str()).or_insert_with(|| RuleStats {
                rule: unit.rule.clone(),
                ..RuleStats::default()
            });
            entry.units += 1;
            entry.duration += unit.duration;
            match unit.status {
                UnitStatus::Completed { .. } => entry.completed += 1,
                UnitStatus::CacheHit { .. } => entry.cache_hits += 1,
                UnitStatus::TimedOut { .. } => entry.timed_out += 1,
                UnitStatus::Fault { .. } => entry.faults += 1,
            }
        }
        for violation in &self.violations {
            if let Some(entry) = stats.get_mut(violation.rule.as_str()) {
                entry.violations += 1;
            }
        }

        let hits: usize = stats.values().map(|s| s.cache_hits).sum();
        let ran: usize = stats.values().map(|s| s.completed + s.timed_out + s.faults).sum();
        self.metadata.cache_hits = hits;
        self.metadata.cache_misses = if self.metadata.cache_enabled { ran } else { 0 };
        self.metadata.rules = rule_order
            .iter()
            .filter_map(|id| stats.remove(id.as_str()))
            .collect();
        self.metadata.rules.extend(stats.into_values());
    }
}

/// Sorts units by path, then by rule registration order.
pub(crate) fn sort_units(units: &mut [UnitReport], rule_order: &[String]) {
    let position = |id: &str| rule_order.iter().position(|r| r == id).unwrap_or(usize::MAX);
    units.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| position(&a.rule).cmp(&position(&b.rule)))
            .then_with(|| a.rule.cmp(&b.rule))
    });
}
