//! Rule executor: schedules rule×file units, enforces timeouts, isolates faults.
//!
//! Each unit is one rule call on one file. Calls run on tokio's blocking
//! pool under `tokio::time::timeout`; a semaphore bounds how many are in
//! flight. The runtime is shut down in the background once all dispatched
//! units have reported, so a rule that never returns cannot hold the run.

use crate::cache::{CacheKey, ResultCache};
use crate::cancel::CancellationToken;
use crate::config::{EffectiveConfiguration, Strategy};
use crate::context::FileContext;
use crate::fingerprint::Fingerprint;
use crate::options::RuleOptions;
use crate::result::{
    sort_units, FileError, RunMetadata, RunStatus, UnitReport, UnitStatus, VerificationResult,
};
use crate::rule::RuleRef;
use crate::types::{sort_canonical, Violation};
use crate::EngineError;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// One file of the target set, read and fingerprinted.
#[derive(Debug, Clone)]
pub(crate) struct FileInput {
    pub(crate) path: PathBuf,
    pub(crate) content: Arc<str>,
    pub(crate) fingerprint: Fingerprint,
}

impl FileInput {
    pub(crate) fn new(path: PathBuf, content: impl Into<Arc<str>>) -> Self {
        let content: Arc<str> = content.into();
        let fingerprint = Fingerprint::of_content(&content);
        Self {
            path,
            content,
            fingerprint,
        }
    }
}

/// Cancellation inputs for a run.
#[derive(Debug, Clone)]
pub(crate) struct RunControl {
    pub(crate) cancel: CancellationToken,
    pub(crate) deadline: Option<Instant>,
}

impl RunControl {
    pub(crate) fn new(cancel: &CancellationToken, run_timeout: Option<Duration>) -> Self {
        Self {
            cancel: cancel.clone(),
            deadline: run_timeout.map(|t| Instant::now() + t),
        }
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Everything a unit needs, owned so it can move onto a worker.
struct UnitJob {
    rule: RuleRef,
    rule_id: String,
    options: Arc<RuleOptions>,
    options_fingerprint: Fingerprint,
    file: FileInput,
    timeout: Duration,
    cache: Option<Arc<ResultCache>>,
}

struct UnitOutput {
    report: UnitReport,
    violations: Vec<Violation>,
}

/// Runs enabled rules over a set of files.
pub(crate) struct Executor {
    cache: Arc<ResultCache>,
}

impl Executor {
    pub(crate) fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }

    /// Runs every rule against every input and returns the canonical result.
    pub(crate) fn run(
        &self,
        rules: &[RuleRef],
        inputs: Vec<FileInput>,
        file_errors: Vec<FileError>,
        config: &EffectiveConfiguration,
        control: &RunControl,
    ) -> Result<VerificationResult, EngineError> {
        let started = Instant::now();
        let strategy = config.strategy();
        let rule_order: Vec<String> = rules.iter().map(|r| r.id().to_string()).collect();
        let cache = config.cache_enabled().then(|| Arc::clone(&self.cache));

        let jobs = plan_jobs(rules, &inputs, config, cache.as_ref());
        let units_planned = jobs.len();
        let files_checked = inputs.len();
        let workers = match strategy {
            Strategy::Sequential => 1,
            Strategy::Parallel => config.max_workers().unwrap_or_else(default_workers),
        };

        info!(
            "Running {} rule(s) over {} file(s): {} unit(s), {} strategy, {} worker(s)",
            rules.len(),
            inputs.len(),
            units_planned,
            strategy,
            workers
        );

        let runtime = DetachedRuntime::new(strategy, workers)?;
        let (outputs, skipped, cancelled) = runtime.block_on(dispatch(jobs, workers, control));
        drop(runtime);

        let mut violations = Vec::new();
        let mut units = Vec::with_capacity(outputs.len());
        for output in outputs {
            let rule_id = output.report.rule.as_str();
            let severity = config.severity_override(rule_id);
            violations.extend(
                output
                    .violations
                    .into_iter()
                    .map(|mut v| {
                        if let Some(severity) = severity {
                            v.severity = severity;
                        }
                        v
                    })
                    .filter(|v| v.severity >= config.severity_floor()),
            );
            units.push(output.report);
        }
        sort_canonical(&mut violations);
        sort_units(&mut units, &rule_order);

        let mut result = VerificationResult {
            status: if cancelled {
                RunStatus::Cancelled
            } else {
                RunStatus::Complete
            },
            violations,
            units,
            metadata: RunMetadata {
                strategy,
                cache_enabled: config.cache_enabled(),
                units_planned,
                units_skipped: skipped,
                file_errors,
                ..RunMetadata::default()
            },
            files_checked,
        };
        result.recompute(&rule_order);
        result.metadata.elapsed = started.elapsed();

        if result.is_cancelled() {
            warn!(
                "Run cancelled: {} of {} unit(s) never dispatched",
                skipped, units_planned
            );
        }
        info!(
            "Verification finished: {} violation(s), {} timeout(s), {} fault(s) in {:?}",
            result.violations.len(),
            result.metadata.timed_out(),
            result.metadata.faults(),
            result.metadata.elapsed
        );
        Ok(result)
    }
}

/// Orders units for dispatch.
///
/// Sequential runs go rule by rule over the whole file set; parallel runs
/// go file by file so one file's units tend to run together.
fn plan_jobs(
    rules: &[RuleRef],
    inputs: &[FileInput],
    config: &EffectiveConfiguration,
    cache: Option<&Arc<ResultCache>>,
) -> Vec<UnitJob> {
    let prepared: Vec<(Arc<RuleOptions>, Fingerprint)> = rules
        .iter()
        .map(|rule| {
            let options = config.options_for(rule.id());
            let fingerprint = options.fingerprint();
            (Arc::new(options), fingerprint)
        })
        .collect();

    let job = |rule_index: usize, file: &FileInput| {
        let rule = &rules[rule_index];
        let (options, options_fingerprint) = &prepared[rule_index];
        UnitJob {
            rule: Arc::clone(rule),
            rule_id: rule.id().to_string(),
            options: Arc::clone(options),
            options_fingerprint: *options_fingerprint,
            file: file.clone(),
            timeout: config.rule_timeout(),
            cache: cache.cloned(),
        }
    };

    let mut jobs = Vec::with_capacity(rules.len() * inputs.len());
    match config.strategy() {
        Strategy::Sequential => {
            for rule_index in 0..rules.len() {
                for file in inputs {
                    jobs.push(job(rule_index, file));
                }
            }
        }
        Strategy::Parallel => {
            for file in inputs {
                for rule_index in 0..rules.len() {
                    jobs.push(job(rule_index, file));
                }
            }
        }
    }
    jobs
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn build_runtime(strategy: Strategy, workers: usize) -> std::io::Result<tokio::runtime::Runtime> {
    match strategy {
        Strategy::Sequential => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build(),
        Strategy::Parallel => tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.clamp(1, 8))
            .thread_name("conform-unit")
            .enable_all()
            .build(),
    }
}

/// A runtime that is shut down in the background when dropped, so blocking
/// tasks still stuck in a rule never hold up the caller.
pub(crate) struct DetachedRuntime(Option<tokio::runtime::Runtime>);

impl DetachedRuntime {
    pub(crate) fn new(strategy: Strategy, workers: usize) -> Result<Self, EngineError> {
        build_runtime(strategy, workers)
            .map(|runtime| Self(Some(runtime)))
            .map_err(EngineError::Runtime)
    }

    pub(crate) fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        match &self.0 {
            Some(runtime) => runtime.block_on(future),
            None => unreachable!("runtime is only taken on drop"),
        }
    }
}

impl Drop for DetachedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Dispatches jobs until done or stopped; returns outputs, skipped count and
/// whether dispatch was cut short.
async fn dispatch(
    jobs: Vec<UnitJob>,
    workers: usize,
    control: &RunControl,
) -> (Vec<UnitOutput>, usize, bool) {
    let total = jobs.len();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();
    let mut dispatched = 0;
    let mut cancelled = false;

    for job in jobs {
        if control.should_stop() {
            cancelled = true;
            break;
        }
        let permit = tokio::select! {
            biased;
            () = control.cancel.cancelled() => None,
            () = sleep_until(control.deadline) => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            cancelled = true;
            break;
        };
        dispatched += 1;
        set.spawn(async move {
            let output = run_unit(job).await;
            drop(permit);
            output
        });
    }

    let mut outputs = Vec::with_capacity(dispatched);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(output) => outputs.push(output),
            Err(e) => warn!("Unit task failed to report: {e}"),
        }
    }
    (outputs, total - dispatched, cancelled)
}

pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn run_unit(job: UnitJob) -> UnitOutput {
    let started = Instant::now();
    let path = job.file.path.clone();
    let key = job
        .cache
        .as_ref()
        .map(|_| CacheKey::new(job.file.fingerprint, job.rule_id.as_str(), job.options_fingerprint));

    if let (Some(cache), Some(key)) = (&job.cache, &key) {
        if let Some(hit) = cache.get(key) {
            debug!(
                "Cache hit: {} on {} ({})",
                job.rule_id,
                path.display(),
                key.content.short()
            );
            let violations: Vec<Violation> = hit
                .violations
                .iter()
                .cloned()
                .map(|v| v.rehomed(&path))
                .collect();
            return UnitOutput {
                report: UnitReport {
                    rule: job.rule_id,
                    path,
                    status: UnitStatus::CacheHit {
                        violations: violations.len(),
                    },
                    duration: started.elapsed(),
                },
                violations,
            };
        }
    }

    let handle = {
        let rule = Arc::clone(&job.rule);
        let options = Arc::clone(&job.options);
        let content = Arc::clone(&job.file.content);
        let path = path.clone();
        tokio::task::spawn_blocking(move || {
            let syntax = if rule.wants_syntax() && is_rust_source(&path) {
                syn::parse_file(&content).ok()
            } else {
                None
            };
            let ctx = FileContext::new(&path, &content).with_syntax(syntax.as_ref());
            rule.check(&ctx, &options)
        })
    };

    let (status, violations) = match tokio::time::timeout(job.timeout, handle).await {
        Err(_) => {
            warn!(
                "Rule {} timed out after {:?} on {}",
                job.rule_id,
                job.timeout,
                path.display()
            );
            (UnitStatus::TimedOut { after: job.timeout }, Vec::new())
        }
        Ok(Err(join_error)) => {
            let cause = panic_cause(join_error, "rule");
            warn!("Rule {} faulted on {}: {cause}", job.rule_id, path.display());
            (UnitStatus::Fault { cause }, Vec::new())
        }
        Ok(Ok(Err(rule_error))) => {
            warn!(
                "Rule {} faulted on {}: {rule_error}",
                job.rule_id,
                path.display()
            );
            (
                UnitStatus::Fault {
                    cause: rule_error.to_string(),
                },
                Vec::new(),
            )
        }
        Ok(Ok(Ok(violations))) => {
            let violations: Vec<Violation> = violations
                .into_iter()
                .map(|mut v| {
                    if v.rule != job.rule_id {
                        v.rule.clone_from(&job.rule_id);
                    }
                    v.rehomed(&path)
                })
                .collect();
            if let (Some(cache), Some(key)) = (&job.cache, key) {
                cache.put(&path, key, violations.clone());
            }
            debug!(
                "Rule {} found {} violation(s) in {}",
                job.rule_id,
                violations.len(),
                path.display()
            );
            (
                UnitStatus::Completed {
                    violations: violations.len(),
                },
                violations,
            )
        }
    };

    UnitOutput {
        report: UnitReport {
            rule: job.rule_id,
            path,
            status,
            duration: started.elapsed(),
        },
        violations,
    }
}

fn is_rust_source(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "rs")
}

pub(crate) fn panic_cause(error: JoinError, what: &str) -> String {
    if error.is_panic() {
        format!("{what} panicked: {}", panic_message(error.into_panic().as_ref()))
    } else {
        error.to_string()
    }
}

/// Textual cause of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, PartialConfig};
    use crate::registry::RuleRegistry;
    use crate::rule::{Rule, RuleError};
    use crate::types::{Category, Location, Severity};

    struct FlagLines;

    impl Rule for FlagLines {
        fn id(&self) -> &str {
            "flag-lines"
        }
        fn category(&self) -> Category {
            Category::Quality
        }
        fn default_severity(&self) -> Severity {
            Severity::Info
        }
        fn check(
            &self,
            ctx: &FileContext<'_>,
            _options: &RuleOptions,
        ) -> Result<Vec<Violation>, RuleError> {
            Ok(ctx
                .lines()
                .map(|(n, _, _)| {
                    Violation::new(self.id(), self.default_severity(), ctx.path, Location::new(n, 1), "line")
                })
                .collect())
        }
    }

    struct Panics;

    impl Rule for Panics {
        fn id(&self) -> &str {
            "panics"
        }
        fn category(&self) -> Category {
            Category::Quality
        }
        fn check(
            &self,
            _ctx: &FileContext<'_>,
            _options: &RuleOptions,
        ) -> Result<Vec<Violation>, RuleError> {
            panic!("kaboom")
        }
    }

    fn setup(sources: &[PartialConfig]) -> (Vec<RuleRef>, EffectiveConfiguration) {
        let mut registry = RuleRegistry::new();
        registry.register(FlagLines).unwrap();
        registry.register(Panics).unwrap();
        let config = ConfigResolver::new(&registry).resolve(sources).unwrap();
        let rules = registry.resolve(config.enabled_rules()).unwrap();
        (rules, config)
    }

    fn inputs() -> Vec<FileInput> {
        vec![
            FileInput::new("b.txt".into(), "one\ntwo\n"),
            FileInput::new("a.txt".into(), "one\n"),
        ]
    }

    fn control() -> RunControl {
        RunControl::new(&CancellationToken::new(), None)
    }

    #[test]
    fn violations_come_back_in_canonical_order() {
        let (rules, config) = setup(&[PartialConfig {
            enable: vec!["flag-lines".into()],
            ..PartialConfig::default()
        }]);
        let executor = Executor::new(Arc::new(ResultCache::new(16)));
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &control())
            .unwrap();
        let keys: Vec<(String, usize)> = result
            .violations
            .iter()
            .map(|v| (v.path.display().to_string(), v.location.line))
            .collect();
        assert_eq!(
            keys,
            vec![("a.txt".into(), 1), ("b.txt".into(), 1), ("b.txt".into(), 2)]
        );
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.status, RunStatus::Complete);
    }

    #[test]
    fn panic_becomes_fault() {
        let (rules, config) = setup(&[PartialConfig {
            enable: vec!["flag-lines".into(), "panics".into()],
            ..PartialConfig::default()
        }]);
        let executor = Executor::new(Arc::new(ResultCache::new(16)));
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &control())
            .unwrap();
        assert_eq!(result.violations.len(), 3);
        let faults: Vec<&UnitReport> = result.failed_units().collect();
        assert_eq!(faults.len(), 2);
        assert!(matches!(
            &faults[0].status,
            UnitStatus::Fault { cause } if cause.contains("kaboom")
        ));
    }

    #[test]
    fn severity_floor_and_override_apply_after_cache() {
        let source = PartialConfig::parse(
            r#"
enable = ["flag-lines"]
severity_floor = "warning"
"#,
        )
        .unwrap();
        let (rules, config) = setup(&[source]);
        let cache = Arc::new(ResultCache::new(16));
        let executor = Executor::new(Arc::clone(&cache));
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &control())
            .unwrap();
        assert!(result.violations.is_empty());
        assert_eq!(cache.len(), 2);

        let raised = PartialConfig::parse(
            r#"
enable = ["flag-lines"]
severity_floor = "warning"
[rules.flag-lines]
severity = "error"
"#,
        )
        .unwrap();
        let (rules, config) = setup(&[raised]);
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &control())
            .unwrap();
        assert_eq!(result.violations.len(), 3);
        assert!(result.violations.iter().all(|v| v.severity == Severity::Error));
        assert_eq!(result.metadata.cache_hits, 2);
    }

    #[test]
    fn cancelled_before_start_dispatches_nothing() {
        let (rules, config) = setup(&[PartialConfig {
            enable: vec!["flag-lines".into()],
            ..PartialConfig::default()
        }]);
        let token = CancellationToken::new();
        token.cancel();
        let executor = Executor::new(Arc::new(ResultCache::new(16)));
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &RunControl::new(&token, None))
            .unwrap();
        assert!(result.is_cancelled());
        assert!(result.units.is_empty());
        assert_eq!(result.metadata.units_skipped, 2);
        assert_eq!(result.files_checked, 2);
    }

    #[test]
    fn files_are_counted_with_no_rules_enabled() {
        let (rules, config) = setup(&[PartialConfig::default()]);
        assert!(rules.is_empty());
        let executor = Executor::new(Arc::new(ResultCache::new(16)));
        let result = executor
            .run(&rules, inputs(), Vec::new(), &config, &control())
            .unwrap();
        assert!(result.units.is_empty());
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.status, RunStatus::Complete);
    }

    #[test]
    fn sequential_plan_is_rule_major() {
        let (rules, config) = setup(&[PartialConfig::parse(
            r#"
enable = ["flag-lines", "panics"]
[execution]
strategy = "sequential"
"#,
        )
        .unwrap()]);
        let jobs = plan_jobs(&rules, &inputs(), &config, None);
        let order: Vec<(&str, &Path)> = jobs
            .iter()
            .map(|j| (j.rule_id.as_str(), j.file.path.as_path()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("flag-lines", Path::new("b.txt")),
                ("flag-lines", Path::new("a.txt")),
                ("panics", Path::new("b.txt")),
                ("panics", Path::new("a.txt")),
            ]
        );
    }

    #[test]
    fn panic_message_reads_payloads() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
    }
}
