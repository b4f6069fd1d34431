//! Loading a directory into a file tree, resolving its configuration,
//! and writing corrected files back to disk.

use anyhow::{Context, Result};
use conform_core::{EffectiveConfiguration, Engine, FileTree, MemoryTree, PartialConfig};
use conform_rules::Preset;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config_resolver;
use crate::RunArgs;

/// Preset used when no source selects rules.
pub(crate) const DEFAULT_PRESET: Preset = Preset::Recommended;

/// The files under one checked path.
#[derive(Debug)]
pub struct Workspace {
    /// Directory that tree paths are relative to.
    pub root: PathBuf,
    /// Every text file found under the checked path.
    pub tree: MemoryTree,
    /// Files selected for the run, sorted.
    pub files: Vec<PathBuf>,
}

impl Workspace {
    /// Walks `path` (a directory or a single file), honouring ignore files.
    ///
    /// Files that are not valid UTF-8 are skipped. When `includes` is
    /// non-empty only files matching at least one glob are selected.
    pub fn load(path: &Path, includes: &[String]) -> Result<Self> {
        let root = if path.is_file() {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        } else {
            path.to_path_buf()
        };

        let mut tree = MemoryTree::new();
        let walker = WalkBuilder::new(path).require_git(false).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or_else(|_| entry.path())
                .to_path_buf();
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => tree.insert(relative, content),
                Err(e) => tracing::debug!("Skipping {}: {e}", entry.path().display()),
            }
        }

        let files = if includes.is_empty() {
            tree.paths()
        } else {
            let mut selected = Vec::new();
            for pattern in includes {
                selected.extend(tree.list(pattern).context("Invalid --include pattern")?);
            }
            selected.sort();
            selected.dedup();
            selected
        };

        tracing::debug!(
            "Loaded {} file(s) from {}, {} selected",
            tree.len(),
            root.display(),
            files.len()
        );

        Ok(Self { root, tree, files })
    }

    /// Resolves the effective configuration for this workspace.
    ///
    /// Sources, lowest precedence first: the default preset (only when no
    /// other source selects rules), the discovered config file, `CONFORM_*`
    /// environment variables, then command-line flags.
    pub fn resolve_config(
        &self,
        engine: &Engine,
        explicit: Option<&Path>,
        args: &RunArgs,
    ) -> Result<EffectiveConfiguration> {
        let file = config_resolver::resolve(&self.root, explicit).load()?;
        let env = PartialConfig::from_env().context("Invalid environment override")?;
        let flags = cli_overrides(args);

        let mut sources = Vec::with_capacity(4);
        let selects_rules = file
            .iter()
            .chain([&env, &flags])
            .any(|s| s.preset.is_some() || !s.enable.is_empty());
        if !selects_rules {
            sources.push(PartialConfig::preset(DEFAULT_PRESET.name()));
        }
        sources.extend(file);
        sources.push(env);
        sources.push(flags);

        engine.resolve(&sources).context("Failed to resolve configuration")
    }

    /// Writes staged files to disk, returning how many were written.
    pub fn persist(&self) -> Result<usize> {
        let mut written = 0;
        for (path, content) in self.tree.staged() {
            let target = self.root.join(path);
            std::fs::write(&target, content)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            written += 1;
        }
        Ok(written)
    }
}

/// The configuration source built from command-line flags.
fn cli_overrides(args: &RunArgs) -> PartialConfig {
    let mut config = PartialConfig::new();
    if let Some(rules) = &args.rules {
        config.enable = split_ids(rules);
    }
    if let Some(disable) = &args.disable {
        config.disable = split_ids(disable);
    }
    config.execution.strategy = args.strategy;
    if args.no_cache {
        config.execution.cache = Some(false);
    }
    config
}

fn split_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conform_core::Strategy;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn a() {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        fs::write(dir.path().join("logo.bin"), [0xff_u8, 0xfe, 0x00]).unwrap();
        dir
    }

    #[test]
    fn load_collects_text_files_relative_to_root() {
        let dir = project();
        let ws = Workspace::load(dir.path(), &[]).unwrap();
        assert_eq!(
            ws.files,
            vec![PathBuf::from("README.md"), PathBuf::from("src/lib.rs")]
        );
    }

    #[test]
    fn load_honours_gitignore() {
        let dir = project();
        fs::write(dir.path().join(".gitignore"), "README.md\n").unwrap();
        let ws = Workspace::load(dir.path(), &[]).unwrap();
        assert_eq!(ws.files, vec![PathBuf::from("src/lib.rs")]);
    }

    #[test]
    fn include_globs_select_a_subset() {
        let dir = project();
        let ws = Workspace::load(dir.path(), &["**/*.rs".to_string()]).unwrap();
        assert_eq!(ws.files, vec![PathBuf::from("src/lib.rs")]);
        assert_eq!(ws.tree.len(), 2);
    }

    #[test]
    fn single_file_is_relative_to_its_directory() {
        let dir = project();
        let ws = Workspace::load(&dir.path().join("src/lib.rs"), &[]).unwrap();
        assert_eq!(ws.root, dir.path().join("src"));
        assert_eq!(ws.files, vec![PathBuf::from("lib.rs")]);
    }

    #[test]
    fn persist_writes_only_staged_files() {
        let dir = project();
        let mut ws = Workspace::load(dir.path(), &[]).unwrap();
        ws.tree
            .write(Path::new("src/lib.rs"), "pub fn b() {}\n".to_string())
            .unwrap();

        assert_eq!(ws.persist().unwrap(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
            "pub fn b() {}\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# demo\n"
        );
    }

    #[test]
    fn flags_become_a_config_source() {
        let args = RunArgs {
            rules: Some("no-tabs, final-newline".to_string()),
            disable: Some("no-todo-macro".to_string()),
            strategy: Some(Strategy::Sequential),
            no_cache: true,
            ..RunArgs::default()
        };
        let config = cli_overrides(&args);
        assert_eq!(config.enable, vec!["no-tabs", "final-newline"]);
        assert_eq!(config.disable, vec!["no-todo-macro"]);
        assert_eq!(config.execution.strategy, Some(Strategy::Sequential));
        assert_eq!(config.execution.cache, Some(false));
    }

    #[test]
    fn project_config_replaces_default_preset() {
        let dir = project();
        fs::write(
            dir.path().join("conform.toml"),
            "enable = [\"final-newline\"]\n",
        )
        .unwrap();
        let engine = super::super::engine().unwrap();
        let ws = Workspace::load(dir.path(), &[]).unwrap();

        let config = ws
            .resolve_config(&engine, None, &RunArgs::default())
            .unwrap();

        assert_eq!(config.enabled_rules(), ["final-newline".to_string()]);
    }

    #[test]
    fn default_preset_applies_without_config() {
        let dir = project();
        let engine = super::super::engine().unwrap();
        let ws = Workspace::load(dir.path(), &[]).unwrap();
        let explicit = dir.path().join("missing.toml");

        assert!(ws
            .resolve_config(&engine, Some(&explicit), &RunArgs::default())
            .is_err());

        let rules = RunArgs {
            disable: Some("no-tabs".to_string()),
            ..RunArgs::default()
        };
        let config = ws.resolve_config(&engine, None, &rules).unwrap();
        assert!(config.is_enabled("no-todo-macro"));
        assert!(!config.is_enabled("no-tabs"));
    }
}
