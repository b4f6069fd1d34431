//! Rules and helpers shared by the integration tests.

#![allow(dead_code)]

use conform_core::{
    Category, EffectiveConfiguration, Engine, FileContext, Fix, Location, MemoryTree, OptionKind,
    OptionSpec, PartialConfig, Replacement, Rule, RuleError, RuleOptions, RuleRegistry, Severity,
    Span, Violation,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Flags trailing spaces; fixable by deleting them.
pub struct TrailingSpace;

impl Rule for TrailingSpace {
    fn id(&self) -> &str {
        "trailing-space"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn default_severity(&self) -> Severity {
        Severity::Warning
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .lines()
            .filter_map(|(_, start, text)| {
                let trimmed = text.trim_end_matches(' ');
                (trimmed.len() < text.len()).then(|| {
                    let offset = start + trimmed.len();
                    let len = text.len() - trimmed.len();
                    Violation::new(
                        self.id(),
                        Severity::Warning,
                        ctx.path,
                        ctx.span_at(offset, len),
                        "trailing space",
                    )
                    .with_fix(Fix::replace(
                        "remove trailing space",
                        Replacement::new(Span::new(offset, len), ""),
                    ))
                })
            })
            .collect())
    }
}

/// Flags every line longer than `max` characters. Not fixable.
pub struct LongLine;

const LONG_LINE_OPTIONS: &[OptionSpec] =
    &[OptionSpec::optional("max", OptionKind::Integer, "longest allowed line")];

impl Rule for LongLine {
    fn id(&self) -> &str {
        "long-line"
    }
    fn category(&self) -> Category {
        Category::Quality
    }
    fn options(&self) -> &[OptionSpec] {
        LONG_LINE_OPTIONS
    }
    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let max = usize::try_from(options.get_int("max", 3)).unwrap_or(usize::MAX);
        Ok(ctx
            .lines()
            .filter(|(_, _, text)| text.chars().count() > max)
            .map(|(_, start, text)| {
                Violation::new(
                    self.id(),
                    Severity::Error,
                    ctx.path,
                    ctx.span_at(start, text.len()),
                    format!("line longer than {max}"),
                )
            })
            .collect())
    }
}

/// Flags uppercase ASCII letters; fixable by lowercasing each one.
pub struct Uppercase;

impl Rule for Uppercase {
    fn id(&self) -> &str {
        "uppercase"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn default_severity(&self) -> Severity {
        Severity::Warning
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .content
            .char_indices()
            .filter(|(_, c)| c.is_ascii_uppercase())
            .map(|(offset, c)| {
                Violation::new(
                    self.id(),
                    Severity::Warning,
                    ctx.path,
                    ctx.span_at(offset, 1),
                    format!("uppercase '{c}'"),
                )
                .with_fix(Fix::replace(
                    "lowercase",
                    Replacement::new(Span::new(offset, 1), c.to_ascii_lowercase().to_string()),
                ))
            })
            .collect())
    }
}

/// Panics on every file.
pub struct Panicky;

impl Rule for Panicky {
    fn id(&self) -> &str {
        "panicky"
    }
    fn category(&self) -> Category {
        Category::Quality
    }
    fn check(&self, _: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        panic!("panicky rule exploded")
    }
}

/// Returns an error on every file.
pub struct Failing;

impl Rule for Failing {
    fn id(&self) -> &str {
        "failing"
    }
    fn category(&self) -> Category {
        Category::Quality
    }
    fn check(&self, _: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Err(RuleError::new("cannot evaluate"))
    }
}

/// Sleeps for `ms` milliseconds, then reports nothing.
pub struct Sleepy;

const SLEEPY_OPTIONS: &[OptionSpec] =
    &[OptionSpec::optional("ms", OptionKind::Integer, "how long to sleep")];

impl Rule for Sleepy {
    fn id(&self) -> &str {
        "sleepy"
    }
    fn category(&self) -> Category {
        Category::Performance
    }
    fn options(&self) -> &[OptionSpec] {
        SLEEPY_OPTIONS
    }
    fn check(&self, _: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let ms = u64::try_from(options.get_int("ms", 2_000)).unwrap_or(0);
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Vec::new())
    }
}

/// Always flags line 1; its fix changes the file without resolving it.
pub struct Flapper;

impl Rule for Flapper {
    fn id(&self) -> &str {
        "flapper"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Ok(vec![Violation::new(
            self.id(),
            Severity::Error,
            ctx.path,
            Location::new(1, 1),
            "always wrong",
        )])
    }
    fn fix(&self, content: &str, _: &Violation, _: &RuleOptions) -> Result<Option<String>, RuleError> {
        Ok(Some(format!("{content}x")))
    }
}

/// Flags files shorter than 100 lines; each fix adds one line.
pub struct Grower;

impl Rule for Grower {
    fn id(&self) -> &str {
        "grower"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let lines = ctx.lines().count();
        Ok((lines < 100)
            .then(|| {
                Violation::new(
                    self.id(),
                    Severity::Warning,
                    ctx.path,
                    Location::new(1, 1),
                    format!("only {lines} line(s)"),
                )
            })
            .into_iter()
            .collect())
    }
    fn fix(&self, content: &str, _: &Violation, _: &RuleOptions) -> Result<Option<String>, RuleError> {
        Ok(Some(format!("{content}\n")))
    }
}

/// Fixable rule whose fix always errors.
pub struct BrokenFix;

impl Rule for BrokenFix {
    fn id(&self) -> &str {
        "broken-fix"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Ok(vec![Violation::new(
            self.id(),
            Severity::Info,
            ctx.path,
            Location::new(1, 1),
            "cannot be fixed after all",
        )])
    }
    fn fix(&self, _: &str, _: &Violation, _: &RuleOptions) -> Result<Option<String>, RuleError> {
        Err(RuleError::new("fixer crashed"))
    }
}

/// Fixable rule whose fix never returns.
pub struct StuckFix;

impl Rule for StuckFix {
    fn id(&self) -> &str {
        "stuck-fix"
    }
    fn category(&self) -> Category {
        Category::Style
    }
    fn is_fixable(&self) -> bool {
        true
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        Ok(vec![Violation::new(
            self.id(),
            Severity::Warning,
            ctx.path,
            Location::new(1, 1),
            "waiting on a fix",
        )])
    }
    fn fix(&self, _: &str, _: &Violation, _: &RuleOptions) -> Result<Option<String>, RuleError> {
        loop {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Counts how often it is invoked.
pub struct Counting {
    pub calls: Arc<AtomicUsize>,
}

impl Rule for Counting {
    fn id(&self) -> &str {
        "counting"
    }
    fn category(&self) -> Category {
        Category::Quality
    }
    fn check(&self, ctx: &FileContext<'_>, _: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ctx
            .content
            .match_indices("TODO")
            .map(|(offset, m)| {
                Violation::new(self.id(), Severity::Info, ctx.path, ctx.span_at(offset, m.len()), "todo")
            })
            .collect())
    }
}

/// Registry holding every test rule, plus a counter for `counting`.
pub fn registry() -> (RuleRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = RuleRegistry::new();
    registry.register(TrailingSpace).unwrap();
    registry.register(LongLine).unwrap();
    registry.register(Uppercase).unwrap();
    registry.register(Panicky).unwrap();
    registry.register(Failing).unwrap();
    registry.register(Sleepy).unwrap();
    registry.register(Flapper).unwrap();
    registry.register(Grower).unwrap();
    registry.register(BrokenFix).unwrap();
    registry.register(StuckFix).unwrap();
    registry
        .register(Counting {
            calls: Arc::clone(&calls),
        })
        .unwrap();
    registry
        .register_preset("style", ["trailing-space", "uppercase"])
        .unwrap();
    (registry, calls)
}

pub fn engine() -> Engine {
    Engine::new(registry().0)
}

pub fn config(engine: &Engine, toml: &str) -> EffectiveConfiguration {
    let source = PartialConfig::parse(toml).expect("test config should parse");
    engine.resolve(&[source]).expect("test config should resolve")
}

/// A small tree with a mix of clean and dirty files.
pub fn sample_tree() -> (MemoryTree, Vec<PathBuf>) {
    let tree = MemoryTree::new()
        .with_file("src/a.txt", "ok\nTODO here \n")
        .with_file("src/b.txt", "Hello world\nbye \n")
        .with_file("src/c.txt", "")
        .with_file("docs/readme.txt", "all fine\n")
        .with_file("docs/notes.txt", "TODO TODO\n  \n");
    let files = tree.paths();
    (tree, files)
}
