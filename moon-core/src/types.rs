//! Domain types for the desired-state configuration.
//!
//! The `compose` descriptor is kept as an opaque [`serde_yaml::Value`]; the
//! daemon never interprets it, it only re-serializes it into the workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for an app entry in the configuration.
///
/// The name doubles as the app's workspace directory under the apps root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppName(pub String);

impl AppName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AppName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Desired state of one app: which branch of which repository to check out,
/// and the compose descriptor to deploy it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    pub url: String,
    pub branch: String,
    #[serde(default = "empty_compose")]
    pub compose: Value,
}

impl AppSpec {
    pub fn new(url: impl Into<String>, branch: impl Into<String>, compose: Value) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            compose,
        }
    }

    /// Canonical YAML text of the compose descriptor.
    ///
    /// Mapping keys are sorted at every nesting level, so documents that only
    /// differ in key order serialize identically.
    pub fn canonical_compose(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&canonicalize(&self.compose))
    }
}

fn empty_compose() -> Value {
    Value::Mapping(Mapping::new())
}

/// The parsed desired-state document. Apps keep their declaration order,
/// which is also the order they are started in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    pub apps: Vec<(AppName, AppSpec)>,
}

impl Configuration {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }
}

/// Recursively sort mapping keys. Sequences keep their order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<(Value, Value)> = map
                .iter()
                .map(|(k, v)| (canonicalize(k), canonicalize(v)))
                .collect();
            entries.sort_by_cached_key(|(k, _)| key_text(k));
            Value::Mapping(entries.into_iter().collect())
        }
        Value::Sequence(items) => Value::Sequence(items.iter().map(canonicalize).collect()),
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: canonicalize(&tagged.value),
        })),
        other => other.clone(),
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).expect("yaml")
    }

    #[test]
    fn newtype_display() {
        assert_eq!(AppName::from("app1").to_string(), "app1");
        assert_eq!(AppName::from(String::from("app1")).as_str(), "app1");
    }

    #[test]
    fn canonical_compose_ignores_key_order() {
        let a = AppSpec::new("u", "main", yaml("b: 2\na: {y: 1, x: 0}\n"));
        let b = AppSpec::new("u", "main", yaml("a: {x: 0, y: 1}\nb: 2\n"));
        assert_eq!(
            a.canonical_compose().expect("a"),
            b.canonical_compose().expect("b")
        );
    }

    #[test]
    fn canonical_compose_keeps_sequence_order() {
        let a = AppSpec::new("u", "main", yaml("ports: [80, 443]\n"));
        let b = AppSpec::new("u", "main", yaml("ports: [443, 80]\n"));
        assert_ne!(
            a.canonical_compose().expect("a"),
            b.canonical_compose().expect("b")
        );
    }

    #[test]
    fn canonical_compose_sorts_top_level_keys() {
        let spec = AppSpec::new("u", "main", yaml("version: '3'\nservices: {}\n"));
        let text = spec.canonical_compose().expect("serialize");
        let services = text.find("services").expect("services key");
        let version = text.find("version").expect("version key");
        assert!(services < version, "keys should be sorted: {text}");
    }

    #[test]
    fn missing_compose_defaults_to_empty_mapping() {
        let spec: AppSpec = serde_yaml::from_str("url: u1\nbranch: main\n").expect("parse");
        assert_eq!(spec.compose, Value::Mapping(Mapping::new()));
    }
}
