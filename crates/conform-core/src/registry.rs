//! The rule registry: a lookup table of known rules and presets.

use crate::rule::{Rule, RuleRef};
use crate::types::Category;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by registry lookups and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A rule with this id is already registered.
    #[error("duplicate rule id: {id}")]
    Duplicate {
        /// The conflicting id.
        id: String,
    },

    /// One or more ids are not registered.
    #[error("unknown rule id(s): {}", .ids.join(", "))]
    Unknown {
        /// Every id that failed to resolve, in request order.
        ids: Vec<String>,
    },

    /// A preset with this name is already registered.
    #[error("duplicate preset: {name}")]
    DuplicatePreset {
        /// The conflicting preset name.
        name: String,
    },
}

/// Holds the set of known rules in registration order.
///
/// Registration happens once at startup; afterwards the registry is
/// read-only and shared behind an [`Arc`].
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<RuleRef>,
    index: HashMap<String, usize>,
    presets: BTreeMap<String, Vec<String>>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the id is already taken.
    pub fn register<R: Rule + 'static>(&mut self, rule: R) -> Result<(), RegistryError> {
        self.register_ref(Arc::new(rule))
    }

    /// Registers a shared rule handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the id is already taken.
    pub fn register_ref(&mut self, rule: RuleRef) -> Result<(), RegistryError> {
        let id = rule.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RegistryError::Duplicate { id });
        }
        debug!("Registered rule: {id}");
        self.index.insert(id, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Registers a named preset listing rule ids.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or any id is unknown.
    pub fn register_preset<I, S>(&mut self, name: &str, ids: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.presets.contains_key(name) {
            return Err(RegistryError::DuplicatePreset {
                name: name.to_string(),
            });
        }
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        self.resolve(&ids)?;
        self.presets.insert(name.to_string(), ids);
        Ok(())
    }

    /// Resolves ids to rules, preserving request order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] listing every id that is not
    /// registered.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<RuleRef>, RegistryError> {
        let mut resolved = Vec::with_capacity(ids.len());
        let mut unknown = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match self.get(id) {
                Some(rule) => resolved.push(Arc::clone(rule)),
                None => {
                    if !unknown.iter().any(|u| u == id) {
                        unknown.push(id.to_string());
                    }
                }
            }
        }
        if unknown.is_empty() {
            Ok(resolved)
        } else {
            Err(RegistryError::Unknown { ids: unknown })
        }
    }

    /// Looks up a single rule.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RuleRef> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// Returns true if the id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registration position of a rule.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Rules of one category, in registration order.
    #[must_use]
    pub fn list_by_category(&self, category: Category) -> Vec<&RuleRef> {
        self.rules
            .iter()
            .filter(|r| r.category() == category)
            .collect()
    }

    /// Rule ids listed by a preset.
    #[must_use]
    pub fn preset(&self, name: &str) -> Option<&[String]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    /// Names of all registered presets, sorted.
    pub fn preset_names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// All rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RuleRef> {
        self.rules.iter()
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("presets", &self.presets)
            .finish()
    }
}
