//! Configuration sources and their resolution into an immutable snapshot.
//!
//! Sources are merged lowest to highest precedence: built-in preset,
//! project file, environment overrides, inline call-site options.

use crate::options::RuleOptions;
use crate::registry::RuleRegistry;
use crate::types::Severity;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default per-rule timeout.
pub const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on correction rounds per file.
pub const DEFAULT_MAX_FIX_ROUNDS: usize = 5;

/// How rule×file units are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Units run concurrently on a bounded worker pool.
    #[default]
    Parallel,
    /// Units run one at a time, rule by rule in registration order.
    Sequential,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parallel => f.write_str("parallel"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

/// One partial configuration source.
///
/// Every field is optional; unset fields defer to lower-precedence sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialConfig {
    /// Preset whose rules join the enabled set.
    #[serde(default)]
    pub preset: Option<String>,

    /// Rule ids to enable.
    #[serde(default)]
    pub enable: Vec<String>,

    /// Rule ids to disable.
    #[serde(default)]
    pub disable: Vec<String>,

    /// Violations below this level are dropped ("info", "warning", "error").
    #[serde(default)]
    pub severity_floor: Option<String>,

    /// Level at which a run counts as failed.
    #[serde(default)]
    pub fail_on: Option<String>,

    /// Execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Correction settings.
    #[serde(default)]
    pub fix: FixConfig,

    /// Per-rule settings.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

impl PartialConfig {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that only names a preset.
    #[must_use]
    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            preset: Some(name.into()),
            ..Self::default()
        }
    }

    /// Loads a source from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses a source from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Reads overrides from `CONFORM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds overrides from an explicit set of variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a malformed value.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "CONFORM_PRESET" => config.preset = Some(value.trim().to_string()),
                "CONFORM_ENABLE" => config.enable = split_list(value),
                "CONFORM_DISABLE" => config.disable = split_list(value),
                "CONFORM_SEVERITY_FLOOR" => config.severity_floor = Some(value.trim().to_string()),
                "CONFORM_FAIL_ON" => config.fail_on = Some(value.trim().to_string()),
                "CONFORM_STRATEGY" => {
                    config.execution.strategy = Some(parse_env(key, value, "parallel|sequential")?);
                }
                "CONFORM_RULE_TIMEOUT_MS" => {
                    config.execution.rule_timeout_ms = Some(parse_env(key, value, "milliseconds")?);
                }
                "CONFORM_RUN_TIMEOUT_MS" => {
                    config.execution.run_timeout_ms = Some(parse_env(key, value, "milliseconds")?);
                }
                "CONFORM_MAX_WORKERS" => {
                    config.execution.max_workers = Some(parse_env(key, value, "worker count")?);
                }
                "CONFORM_CACHE" => config.execution.cache = Some(parse_flag(key, value)?),
                "CONFORM_FIX" => config.fix.enabled = Some(parse_flag(key, value)?),
                "CONFORM_FIX_MAX_ROUNDS" => {
                    config.fix.max_rounds = Some(parse_env(key, value, "round count")?);
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// Returns true if this source sets nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_env<T: std::str::FromStr>(
    var: &str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            value: value.to_string(),
            expected: "boolean",
        }),
    }
}

/// Execution settings of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Scheduling strategy.
    #[serde(default)]
    pub strategy: Option<Strategy>,

    /// Per-rule timeout in milliseconds.
    #[serde(default)]
    pub rule_timeout_ms: Option<u64>,

    /// Whole-run timeout in milliseconds; the run is cancelled when it elapses.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,

    /// Maximum number of units in flight (parallel strategy).
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Whether the result cache is consulted.
    #[serde(default)]
    pub cache: Option<bool>,
}

/// Correction settings of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixConfig {
    /// Whether auto-fixable violations are corrected.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Bound on correction rounds per file.
    #[serde(default)]
    pub max_rounds: Option<usize>,
}

/// Per-rule settings of a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Explicit enable (`true`) or disable (`false`).
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Severity override for this rule.
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Rule-specific options as key-value pairs.
    #[serde(flatten)]
    pub options: BTreeMap<String, toml::Value>,
}

/// The resolved, immutable configuration for one run.
///
/// Only [`ConfigResolver::resolve`] builds these; re-resolving produces a
/// new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfiguration {
    enabled_rules: Vec<String>,
    rule_options: BTreeMap<String, RuleOptions>,
    severity_overrides: BTreeMap<String, Severity>,
    severity_floor: Severity,
    fail_on: Severity,
    strategy: Strategy,
    rule_timeout: Duration,
    run_timeout: Option<Duration>,
    max_workers: Option<usize>,
    cache_enabled: bool,
    auto_fix: bool,
    max_fix_rounds: usize,
}

impl EffectiveConfiguration {
    /// Enabled rule ids in registration order.
    #[must_use]
    pub fn enabled_rules(&self) -> &[String] {
        &self.enabled_rules
    }

    /// Returns true if the rule is enabled.
    #[must_use]
    pub fn is_enabled(&self, rule_id: &str) -> bool {
        self.enabled_rules.iter().any(|id| id == rule_id)
    }

    /// Options for a rule (empty if none were configured).
    #[must_use]
    pub fn options_for(&self, rule_id: &str) -> RuleOptions {
        self.rule_options.get(rule_id).cloned().unwrap_or_default()
    }

    /// Severity override for a rule.
    #[must_use]
    pub fn severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.severity_overrides.get(rule_id).copied()
    }

    /// Violations below this severity are not reported.
    #[must_use]
    pub fn severity_floor(&self) -> Severity {
        self.severity_floor
    }

    /// Severity at which a run counts as failed.
    #[must_use]
    pub fn fail_on(&self) -> Severity {
        self.fail_on
    }

    /// Scheduling strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Per-rule timeout.
    #[must_use]
    pub fn rule_timeout(&self) -> Duration {
        self.rule_timeout
    }

    /// Whole-run timeout, if any.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }

    /// Worker bound for the parallel strategy.
    #[must_use]
    pub fn max_workers(&self) -> Option<usize> {
        self.max_workers
    }

    /// Whether the result cache is consulted.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Whether auto-fixable violations are corrected.
    #[must_use]
    pub fn auto_fix(&self) -> bool {
        self.auto_fix
    }

    /// Bound on correction rounds per file.
    #[must_use]
    pub fn max_fix_rounds(&self) -> usize {
        self.max_fix_rounds
    }
}

/// One problem found while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    /// A referenced rule id is not registered.
    UnknownRule(String),
    /// A referenced preset is not registered.
    UnknownPreset(String),
    /// An option is not declared by the rule.
    UnknownOption {
        /// Rule id.
        rule: String,
        /// Option name.
        option: String,
    },
    /// An option value has the wrong type.
    OptionType {
        /// Rule id.
        rule: String,
        /// Option name.
        option: String,
        /// Declared type.
        expected: String,
    },
    /// A required option of an enabled rule is not set.
    MissingOption {
        /// Rule id.
        rule: String,
        /// Option name.
        option: String,
    },
    /// A severity field holds an unrecognized level.
    InvalidSeverity {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A numeric setting is out of range.
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Explanation.
        detail: &'static str,
    },
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownRule(id) => write!(f, "unknown rule '{id}'"),
            Self::UnknownPreset(name) => write!(f, "unknown preset '{name}'"),
            Self::UnknownOption { rule, option } => {
                write!(f, "rule '{rule}' has no option '{option}'")
            }
            Self::OptionType {
                rule,
                option,
                expected,
            } => write!(f, "option '{option}' of rule '{rule}' must be a {expected}"),
            Self::MissingOption { rule, option } => {
                write!(f, "rule '{rule}' requires option '{option}'")
            }
            Self::InvalidSeverity { field, value } => write!(
                f,
                "{field} '{value}' is not one of info, warning, error"
            ),
            Self::OutOfRange { field, detail } => write!(f, "{field} {detail}"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parse error message.
        message: String,
    },

    /// Malformed environment override.
    #[error("Invalid value '{value}' for {var}: expected {expected}")]
    Env {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
        /// What was expected.
        expected: &'static str,
    },

    /// The merged configuration is invalid.
    #[error("Invalid configuration: {}", join_problems(.problems))]
    Invalid {
        /// Every problem found, in discovery order.
        problems: Vec<ConfigProblem>,
    },
}

impl ConfigError {
    /// Problems carried by an [`ConfigError::Invalid`] error.
    #[must_use]
    pub fn problems(&self) -> &[ConfigProblem] {
        match self {
            Self::Invalid { problems } => problems,
            _ => &[],
        }
    }
}

fn join_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merges configuration sources into an [`EffectiveConfiguration`].
///
/// Resolution is pure: the same registry and sources always give the same
/// snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    registry: &'a RuleRegistry,
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver validating against `registry`.
    #[must_use]
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self { registry }
    }

    /// Resolves sources, lowest precedence first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every problem found: unknown
    /// rules or presets, option schema mismatches, unrecognized severities.
    pub fn resolve(&self, sources: &[PartialConfig]) -> Result<EffectiveConfiguration, ConfigError> {
        let mut problems = Vec::new();
        let mut enabled: BTreeSet<String> = BTreeSet::new();
        let mut options: BTreeMap<String, RuleOptions> = BTreeMap::new();
        let mut severity_overrides = BTreeMap::new();
        let mut severity_floor = None;
        let mut fail_on = None;
        let mut execution = ExecutionConfig::default();
        let mut fix = FixConfig::default();

        for source in sources {
            if let Some(name) = &source.preset {
                match self.registry.preset(name) {
                    Some(ids) => enabled.extend(ids.iter().cloned()),
                    None => push_unique(&mut problems, ConfigProblem::UnknownPreset(name.clone())),
                }
            }

            let mut additions: Vec<&String> = source.enable.iter().collect();
            let mut removals: Vec<&String> = source.disable.iter().collect();
            for (id, rule_config) in &source.rules {
                match rule_config.enabled {
                    Some(true) => additions.push(id),
                    Some(false) => removals.push(id),
                    None => {}
                }
                if let Some(severity) = rule_config.severity {
                    severity_overrides.insert(id.clone(), severity);
                }
                if !rule_config.options.is_empty() {
                    let layer: RuleOptions = rule_config.options.clone().into_iter().collect();
                    options.entry(id.clone()).or_default().merge(&layer);
                }
            }
            for id in additions.iter().chain(removals.iter()) {
                if !self.registry.contains(id) {
                    push_unique(&mut problems, ConfigProblem::UnknownRule((*id).clone()));
                }
            }
            enabled.extend(additions.into_iter().cloned());
            for id in removals {
                enabled.remove(id);
            }

            severity_floor = source.severity_floor.clone().or(severity_floor);
            fail_on = source.fail_on.clone().or(fail_on);
            execution.strategy = source.execution.strategy.or(execution.strategy);
            execution.rule_timeout_ms = source.execution.rule_timeout_ms.or(execution.rule_timeout_ms);
            execution.run_timeout_ms = source.execution.run_timeout_ms.or(execution.run_timeout_ms);
            execution.max_workers = source.execution.max_workers.or(execution.max_workers);
            execution.cache = source.execution.cache.or(execution.cache);
            fix.enabled = source.fix.enabled.or(fix.enabled);
            fix.max_rounds = source.fix.max_rounds.or(fix.max_rounds);
        }

        for id in options.keys().chain(severity_overrides.keys()) {
            if !self.registry.contains(id) {
                push_unique(&mut problems, ConfigProblem::UnknownRule(id.clone()));
            }
        }

        self.validate_options(&enabled, &options, &mut problems);

        let severity_floor = parse_severity("severity_floor", severity_floor, Severity::Info, &mut problems);
        let fail_on = parse_severity("fail_on", fail_on, Severity::Error, &mut problems);

        if execution.rule_timeout_ms == Some(0) {
            problems.push(ConfigProblem::OutOfRange {
                field: "rule_timeout_ms",
                detail: "must be greater than zero",
            });
        }
        if execution.max_workers == Some(0) {
            problems.push(ConfigProblem::OutOfRange {
                field: "max_workers",
                detail: "must be greater than zero",
            });
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid { problems });
        }

        let mut enabled_rules: Vec<String> = enabled.into_iter().collect();
        enabled_rules.sort_by_key(|id| self.registry.position(id));

        let config = EffectiveConfiguration {
            enabled_rules,
            rule_options: options,
            severity_overrides,
            severity_floor,
            fail_on,
            strategy: execution.strategy.unwrap_or_default(),
            rule_timeout: execution
                .rule_timeout_ms
                .map_or(DEFAULT_RULE_TIMEOUT, Duration::from_millis),
            run_timeout: execution.run_timeout_ms.map(Duration::from_millis),
            max_workers: execution.max_workers,
            cache_enabled: execution.cache.unwrap_or(true),
            auto_fix: fix.enabled.unwrap_or(true),
            max_fix_rounds: fix.max_rounds.unwrap_or(DEFAULT_MAX_FIX_ROUNDS),
        };
        debug!(
            "Resolved configuration: {} rule(s), strategy {}",
            config.enabled_rules.len(),
            config.strategy
        );
        Ok(config)
    }

    fn validate_options(
        &self,
        enabled: &BTreeSet<String>,
        options: &BTreeMap<String, RuleOptions>,
        problems: &mut Vec<ConfigProblem>,
    ) {
        for (id, values) in options {
            let Some(rule) = self.registry.get(id) else {
                continue;
            };
            for (key, value) in values.iter() {
                match rule.options().iter().find(|spec| spec.name == key) {
                    None => problems.push(ConfigProblem::UnknownOption {
                        rule: id.clone(),
                        option: key.to_string(),
                    }),
                    Some(spec) if !spec.kind.accepts(value) => {
                        problems.push(ConfigProblem::OptionType {
                            rule: id.clone(),
                            option: key.to_string(),
                            expected: spec.kind.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        for id in enabled {
            let Some(rule) = self.registry.get(id) else {
                continue;
            };
            for spec in rule.options().iter().filter(|s| s.required) {
                let set = options.get(id).is_some_and(|o| o.get(spec.name).is_some());
                if !set {
                    problems.push(ConfigProblem::MissingOption {
                        rule: id.clone(),
                        option: spec.name.to_string(),
                    });
                }
            }
        }
    }
}

fn push_unique(problems: &mut Vec<ConfigProblem>, problem: ConfigProblem) {
    if !problems.contains(&problem) {
        problems.push(problem);
    }
}

fn parse_severity(
    field: &'static str,
    value: Option<String>,
    default: Severity,
    problems: &mut Vec<ConfigProblem>,
) -> Severity {
    match value {
        None => default,
        Some(raw) => Severity::parse(&raw).unwrap_or_else(|| {
            problems.push(ConfigProblem::InvalidSeverity { field, value: raw });
            default
        }),
    }
}
