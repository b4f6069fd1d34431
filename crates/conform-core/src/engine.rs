//! Entry points: verification and correction over a file tree.

use crate::cache::{ResultCache, DEFAULT_CACHE_CAPACITY};
use crate::cancel::CancellationToken;
use crate::config::{ConfigError, ConfigResolver, EffectiveConfiguration, PartialConfig};
use crate::correction::{CorrectionReport, Corrector};
use crate::executor::{Executor, FileInput, RunControl};
use crate::registry::{RegistryError, RuleRegistry};
use crate::result::{FileError, VerificationResult};
use crate::rule::RuleRef;
use crate::vfs::{FileTree, VfsError};

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort an engine call.
///
/// Rule failures never show up here; they are recorded per unit in the
/// result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration names rules the registry does not hold.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The configuration sources could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading or writing the file tree failed.
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// The worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Verification and correction engine.
///
/// Holds the rule registry and the result cache; both are shared across
/// calls. Calls are synchronous and start their own worker runtime, so
/// they must not be made from inside an async runtime.
///
/// # Example
///
/// ```ignore
/// use conform_core::{Engine, MemoryTree, PartialConfig};
///
/// let engine = Engine::new(registry);
/// let config = engine.resolve(&[PartialConfig::preset("recommended")])?;
/// let tree = MemoryTree::new().with_file("a.txt", "hello \n");
/// let result = engine.run_verification(&tree, &["a.txt".into()], &config)?;
/// assert_eq!(result.violations.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<RuleRegistry>,
    cache: Arc<ResultCache>,
}

impl Engine {
    /// Creates an engine with a cache of default capacity.
    #[must_use]
    pub fn new(registry: RuleRegistry) -> Self {
        Self::with_cache(
            Arc::new(registry),
            Arc::new(ResultCache::new(DEFAULT_CACHE_CAPACITY)),
        )
    }

    /// Creates an engine over shared parts.
    #[must_use]
    pub fn with_cache(registry: Arc<RuleRegistry>, cache: Arc<ResultCache>) -> Self {
        Self { registry, cache }
    }

    /// The rule registry.
    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// The result cache.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Resolves configuration sources against this engine's registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any source is inconsistent with
    /// the registry.
    pub fn resolve(&self, sources: &[PartialConfig]) -> Result<EffectiveConfiguration, ConfigError> {
        ConfigResolver::new(&self.registry).resolve(sources)
    }

    /// Runs every enabled rule over `files`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration names unknown rules or the
    /// worker runtime cannot start. Unreadable files are recorded in the
    /// result metadata instead.
    pub fn run_verification(
        &self,
        tree: &dyn FileTree,
        files: &[PathBuf],
        config: &EffectiveConfiguration,
    ) -> Result<VerificationResult, EngineError> {
        self.run_verification_with(tree, files, config, &CancellationToken::new())
    }

    /// Like [`Engine::run_verification`], stopping dispatch once `cancel`
    /// fires. The partial result is marked cancelled.
    ///
    /// # Errors
    ///
    /// See [`Engine::run_verification`].
    pub fn run_verification_with(
        &self,
        tree: &dyn FileTree,
        files: &[PathBuf],
        config: &EffectiveConfiguration,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, EngineError> {
        let rules = self.registry.resolve(config.enabled_rules())?;
        let control = RunControl::new(cancel, config.run_timeout());
        self.verify(tree, files, config, &rules, &control)
    }

    /// Verifies `files`, applies auto-fixes and writes corrected content
    /// back through `tree`.
    ///
    /// # Errors
    ///
    /// Returns an error if verification cannot start or the tree rejects
    /// a read or write.
    pub fn run_correction(
        &self,
        tree: &mut dyn FileTree,
        files: &[PathBuf],
        config: &EffectiveConfiguration,
    ) -> Result<CorrectionReport, EngineError> {
        self.run_correction_with(tree, files, config, &CancellationToken::new())
    }

    /// Like [`Engine::run_correction`], honouring `cancel`.
    ///
    /// # Errors
    ///
    /// See [`Engine::run_correction`].
    pub fn run_correction_with(
        &self,
        tree: &mut dyn FileTree,
        files: &[PathBuf],
        config: &EffectiveConfiguration,
        cancel: &CancellationToken,
    ) -> Result<CorrectionReport, EngineError> {
        let rules = self.registry.resolve(config.enabled_rules())?;
        let control = RunControl::new(cancel, config.run_timeout());
        let initial = self.verify(&*tree, files, config, &rules, &control)?;
        let executor = Executor::new(Arc::clone(&self.cache));
        Corrector {
            registry: &self.registry,
            rules: &rules,
            executor: &executor,
            cache: &self.cache,
            config,
            control: &control,
        }
        .run(tree, initial)
    }

    fn verify(
        &self,
        tree: &dyn FileTree,
        files: &[PathBuf],
        config: &EffectiveConfiguration,
        rules: &[RuleRef],
        control: &RunControl,
    ) -> Result<VerificationResult, EngineError> {
        let (inputs, file_errors) = read_inputs(tree, files);
        Executor::new(Arc::clone(&self.cache)).run(rules, inputs, file_errors, config, control)
    }
}

/// Reads each distinct path once; failures become file errors.
fn read_inputs(tree: &dyn FileTree, files: &[PathBuf]) -> (Vec<FileInput>, Vec<FileError>) {
    let mut seen = BTreeSet::new();
    let mut inputs = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for path in files {
        if !seen.insert(path.as_path()) {
            continue;
        }
        match tree.read(path) {
            Ok(content) => inputs.push(FileInput::new(path.clone(), content)),
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                errors.push(FileError {
                    path: path.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
    debug!("Read {} file(s), {} unreadable", inputs.len(), errors.len());
    (inputs, errors)
}
