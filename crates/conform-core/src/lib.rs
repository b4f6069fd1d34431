//! # conform-core
//!
//! Engine for executable specifications: sets of rules checked against a
//! tree of files, with optional automatic correction.
//!
//! This crate provides:
//!
//! - [`Rule`] trait every rule implements, and the [`RuleRegistry`] holding them
//! - [`ConfigResolver`] merging layered [`PartialConfig`] sources into an
//!   [`EffectiveConfiguration`]
//! - [`ResultCache`] memoizing rule outcomes by content fingerprint
//! - [`Engine`] running verification (parallel or sequential, with per-rule
//!   timeouts and fault isolation) and bounded correction rounds
//! - [`FileTree`] abstraction over the files being checked, with an
//!   in-memory [`MemoryTree`]
//!
//! ## Example
//!
//! ```ignore
//! use conform_core::{Engine, MemoryTree, PartialConfig, RuleRegistry};
//!
//! let mut registry = RuleRegistry::new();
//! registry.register(MyRule)?;
//! let engine = Engine::new(registry);
//!
//! let config = engine.resolve(&[PartialConfig::parse(r#"enable = ["my-rule"]"#)?])?;
//! let tree = MemoryTree::new().with_file("src/lib.rs", "fn main() {}\n");
//! let result = engine.run_verification(&tree, &["src/lib.rs".into()], &config)?;
//! for violation in &result.violations {
//!     println!("{violation}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod cancel;
mod config;
mod context;
mod correction;
mod engine;
mod executor;
mod fingerprint;
mod options;
mod registry;
mod result;
mod rule;
mod types;
mod vfs;

pub use cache::{CacheKey, CacheStats, CachedResult, ResultCache, DEFAULT_CACHE_CAPACITY};
pub use cancel::CancellationToken;
pub use config::{
    ConfigError, ConfigProblem, ConfigResolver, EffectiveConfiguration, ExecutionConfig, FixConfig,
    PartialConfig, RuleConfig, Strategy, DEFAULT_MAX_FIX_ROUNDS, DEFAULT_RULE_TIMEOUT,
};
pub use context::{location_at, offset_for, FileContext};
pub use correction::{
    CorrectionPlan, CorrectionReport, FileCorrection, ResidualReason, ResidualViolation,
};
pub use engine::{Engine, EngineError};
pub use fingerprint::Fingerprint;
pub use options::{OptionKind, OptionSpec, RuleOptions};
pub use registry::{RegistryError, RuleRegistry};
pub use result::{
    FileError, RuleStats, RunMetadata, RunStatus, UnitReport, UnitStatus, VerificationResult,
};
pub use rule::{Rule, RuleError, RuleRef};
pub use types::{
    sort_canonical, Category, Fix, Location, Replacement, Severity, Span, Violation,
    ViolationDiagnostic,
};
pub use vfs::{FileTree, MemoryTree, VfsError};
