//! The virtual file tree the core reads from and writes corrections to.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by file tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// No file at this path.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The glob pattern could not be parsed.
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Parser message.
        message: String,
    },

    /// Backend-specific failure.
    #[error("{op} failed for {}: {message}", .path.display())]
    Backend {
        /// Operation name.
        op: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Backend message.
        message: String,
    },
}

/// Abstract path → content mapping.
///
/// Writes are staged: they are visible to later reads through the same
/// tree, and it is up to the owner to persist them.
pub trait FileTree {
    /// Reads the current content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::NotFound`] if no such file exists.
    fn read(&self, path: &Path) -> Result<String, VfsError>;

    /// Stages new content for a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn write(&mut self, path: &Path, content: String) -> Result<(), VfsError>;

    /// Lists paths matching a glob pattern, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::Pattern`] if the pattern is invalid.
    fn list(&self, pattern: &str) -> Result<Vec<PathBuf>, VfsError>;
}

/// In-memory file tree with a base layer and a staged-write overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTree {
    base: BTreeMap<PathBuf, String>,
    staged: BTreeMap<PathBuf, String>,
}

impl MemoryTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the base layer, returning the tree.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file in the base layer.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.base.insert(path.into(), content.into());
    }

    /// Staged writes, in path order.
    pub fn staged(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.staged.iter().map(|(p, c)| (p.as_path(), c.as_str()))
    }

    /// Returns true if any write is staged.
    #[must_use]
    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Folds staged writes into the base layer.
    pub fn commit(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        self.base.extend(staged);
    }

    /// All paths in the tree, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.base.keys().chain(self.staged.keys()).cloned().collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Number of files in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths().len()
    }

    /// Returns true if the tree holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.staged.is_empty()
    }
}

impl FileTree for MemoryTree {
    fn read(&self, path: &Path) -> Result<String, VfsError> {
        self.staged
            .get(path)
            .or_else(|| self.base.get(path))
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_path_buf()))
    }

    fn write(&mut self, path: &Path, content: String) -> Result<(), VfsError> {
        self.staged.insert(path.to_path_buf(), content);
        Ok(())
    }

    fn list(&self, pattern: &str) -> Result<Vec<PathBuf>, VfsError> {
        let glob = glob::Pattern::new(pattern).map_err(|e| VfsError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..glob::MatchOptions::new()
        };
        Ok(self
            .paths()
            .into_iter()
            .filter(|p| glob.matches_path_with(p, options))
            .collect())
    }
}
