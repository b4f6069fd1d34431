//! Locating and loading the configuration file.
//!
//! First match wins:
//!
//! 1. `--config <path>` (used as-is, a missing file is an error)
//! 2. `conform.toml`, then `.conform.toml`, in the checked directory
//! 3. `config.toml` in `$CONFORM_CONFIG_DIR`, else in `~/.conform/`
//! 4. nothing: built-in defaults apply

use anyhow::{Context, Result};
use conform_core::PartialConfig;
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["conform.toml", ".conform.toml"];
const GLOBAL_FILE: &str = "config.toml";

/// Where the configuration file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line.
    Explicit(PathBuf),
    /// Found in the checked directory.
    Project(PathBuf),
    /// Found in the user-wide config directory.
    Global(PathBuf),
    /// No file; built-in defaults apply.
    Default,
}

impl ConfigSource {
    /// The file behind this source.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p) | Self::Project(p) | Self::Global(p) => Some(p),
            Self::Default => None,
        }
    }

    /// Parses the file behind this source; `None` for [`ConfigSource::Default`].
    pub fn load(&self) -> Result<Option<PartialConfig>> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        if let Self::Global(_) = self {
            tracing::info!("Using global config: {}", path.display());
        }
        PartialConfig::from_file(path)
            .map(Some)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }
}

/// Finds the configuration file for `project_dir`.
#[must_use]
pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> ConfigSource {
    discover(project_dir, explicit, global_config_dir().as_deref())
}

fn discover(project_dir: &Path, explicit: Option<&Path>, global_dir: Option<&Path>) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    let project = PROJECT_FILES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|candidate| candidate.is_file());
    if let Some(path) = project {
        tracing::debug!("Project config: {}", path.display());
        return ConfigSource::Project(path);
    }

    match global_dir.map(|dir| dir.join(GLOBAL_FILE)) {
        Some(path) if path.is_file() => {
            tracing::debug!("Global config: {}", path.display());
            ConfigSource::Global(path)
        }
        _ => ConfigSource::Default,
    }
}

/// The user-wide config directory: `$CONFORM_CONFIG_DIR`, else `~/.conform`.
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    match std::env::var_os("CONFORM_CONFIG_DIR") {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home::home_dir().map(|home| home.join(".conform")),
    }
}
