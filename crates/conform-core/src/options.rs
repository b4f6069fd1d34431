//! Rule option schemas and resolved option maps.

use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type accepted by a rule option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `true` / `false`.
    Bool,
    /// Signed integer.
    Integer,
    /// String.
    String,
    /// Array of strings.
    StringList,
}

impl OptionKind {
    /// Returns true if `value` has this kind.
    #[must_use]
    pub fn accepts(self, value: &toml::Value) -> bool {
        match self {
            Self::Bool => value.is_bool(),
            Self::Integer => value.is_integer(),
            Self::String => value.is_str(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(toml::Value::is_str)),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::String => "string",
            Self::StringList => "string list",
        };
        f.write_str(name)
    }
}

/// Declaration of one configurable rule option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Option name as written in configuration.
    pub name: &'static str,
    /// Expected value type.
    pub kind: OptionKind,
    /// Whether the option must be set when the rule is enabled.
    pub required: bool,
    /// Short description for `list-rules`.
    pub description: &'static str,
}

impl OptionSpec {
    /// Declares an optional option.
    #[must_use]
    pub const fn optional(name: &'static str, kind: OptionKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }

    /// Declares a required option.
    #[must_use]
    pub const fn required(name: &'static str, kind: OptionKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }
}

/// Resolved options for one rule, keyed by option name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleOptions {
    values: BTreeMap<String, toml::Value>,
}

impl RuleOptions {
    /// Creates an empty option map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, returning the updated map.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Merges `other` into `self`, with `other` winning per key.
    pub fn merge(&mut self, other: &RuleOptions) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Raw value of an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(key)
    }

    /// Iterates over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &toml::Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Gets a boolean option with a default value.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    /// Gets an integer option with a default value.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(toml::Value::as_integer)
            .unwrap_or(default)
    }

    /// Gets a string option with a default value.
    #[must_use]
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
    }

    /// Gets a string array option.
    #[must_use]
    pub fn get_str_array(&self, key: &str) -> Option<Vec<String>> {
        self.values.get(key).and_then(|v| v.as_array()).map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
    }

    /// Stable fingerprint of the serialized option map.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        // BTreeMap keys and toml tables serialize in sorted order.
        let encoded = serde_json::to_vec(&self.values).unwrap_or_default();
        Fingerprint::of_bytes(&encoded)
    }
}

impl FromIterator<(String, toml::Value)> for RuleOptions {
    fn from_iter<T: IntoIterator<Item = (String, toml::Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_accept_matching_values() {
        assert!(OptionKind::Bool.accepts(&toml::Value::Boolean(true)));
        assert!(OptionKind::Integer.accepts(&toml::Value::Integer(3)));
        assert!(!OptionKind::Integer.accepts(&toml::Value::String("3".into())));
        let list = toml::Value::Array(vec!["a".into(), "b".into()]);
        assert!(OptionKind::StringList.accepts(&list));
        let mixed = toml::Value::Array(vec!["a".into(), 1.into()]);
        assert!(!OptionKind::StringList.accepts(&mixed));
    }

    #[test]
    fn merge_is_shallow_and_later_wins() {
        let mut base = RuleOptions::new().with("max", 80).with("strict", true);
        base.merge(&RuleOptions::new().with("max", 120));
        assert_eq!(base.get_int("max", 0), 120);
        assert!(base.get_bool("strict", false));
    }

    #[test]
    fn typed_getters_fall_back_to_defaults() {
        let opts = RuleOptions::new().with("name", "x");
        assert_eq!(opts.get_int("name", 7), 7);
        assert_eq!(opts.get_str("name", "y"), "x");
        assert_eq!(opts.get_str_array("missing"), None);
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = RuleOptions::new().with("a", 1).with("b", "two");
        let b = RuleOptions::new().with("b", "two").with("a", 1);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), RuleOptions::new().fingerprint());
    }
}
