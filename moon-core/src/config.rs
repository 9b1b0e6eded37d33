//! Desired-state document loading.
//!
//! # Format
//!
//! ```yaml
//! apps:
//!   app1:
//!     url: https://example.com/app1.git
//!     branch: main
//!     compose:
//!       version: "3"
//!       services: { ... }
//! ```
//!
//! The file is re-read on every reconciliation pass; nothing here caches.
//! A missing or null `apps` key is an empty desired state, not an error.

use std::io::ErrorKind;
use std::path::{Component, Path};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::ConfigurationError;
use crate::types::{AppName, AppSpec, Configuration};

#[derive(Debug, Default, Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    apps: Option<Mapping>,
}

/// Read and parse the configuration file at `path`.
///
/// Returns [`ConfigurationError::NotFound`] if absent and
/// [`ConfigurationError::Parse`] (with path + line context) if malformed.
pub fn load_at(path: &Path) -> Result<Configuration, ConfigurationError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConfigurationError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => {
            return Err(ConfigurationError::Io {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };
    parse(path, &contents)
}

/// Parse configuration text. `origin` is only used for error messages.
pub fn parse(origin: &Path, contents: &str) -> Result<Configuration, ConfigurationError> {
    let parse_err = |source| ConfigurationError::Parse {
        path: origin.to_path_buf(),
        source,
    };

    let document: Value = serde_yaml::from_str(contents).map_err(parse_err)?;
    if document.is_null() {
        return Ok(Configuration::default());
    }
    let raw: RawConfiguration = serde_yaml::from_value(document).map_err(parse_err)?;

    let mut apps = Vec::new();
    for (key, value) in raw.apps.unwrap_or_default() {
        let name = app_name(&key)?;
        let spec: AppSpec =
            serde_yaml::from_value(value).map_err(|source| ConfigurationError::InvalidApp {
                name: name.0.clone(),
                source,
            })?;
        apps.push((name, spec));
    }
    Ok(Configuration { apps })
}

/// Validate that an `apps` key is usable as a single workspace directory name.
pub fn app_name(key: &Value) -> Result<AppName, ConfigurationError> {
    let Value::String(raw) = key else {
        return Err(ConfigurationError::InvalidAppName {
            name: serde_yaml::to_string(key)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
            reason: "app names must be strings",
        });
    };

    let invalid = |reason| ConfigurationError::InvalidAppName {
        name: raw.clone(),
        reason,
    };
    if raw.is_empty() {
        return Err(invalid("app names must not be empty"));
    }
    if raw.contains('/') || raw.contains('\\') {
        return Err(invalid("app names must not contain path separators"));
    }
    let mut components = Path::new(raw).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(AppName::from(raw.as_str())),
        _ => Err(invalid("app names must be a plain directory name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("/var/moon/configuration.yml")
    }

    #[test]
    fn empty_document_is_empty_configuration() {
        let config = parse(origin(), "").expect("parse");
        assert!(config.is_empty());
    }

    #[test]
    fn null_apps_is_empty_configuration() {
        let config = parse(origin(), "apps:\n").expect("parse");
        assert!(config.is_empty());
    }

    #[test]
    fn missing_apps_key_is_empty_configuration() {
        let config = parse(origin(), "other: 1\n").expect("parse");
        assert!(config.is_empty());
    }

    #[test]
    fn apps_keep_declaration_order() {
        let config = parse(
            origin(),
            "apps:\n  zeta: {url: u1, branch: main}\n  alpha: {url: u2, branch: dev}\n",
        )
        .expect("parse");
        let names: Vec<&str> = config.apps.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(config.apps[1].1.branch, "dev");
    }

    #[test]
    fn missing_branch_names_the_app() {
        let err = parse(origin(), "apps:\n  app1: {url: u1}\n").unwrap_err();
        match err {
            ConfigurationError::InvalidApp { name, .. } => assert_eq!(name, "app1"),
            other => panic!("expected invalid app, got {other:?}"),
        }
    }

    #[test]
    fn apps_must_be_a_mapping() {
        let err = parse(origin(), "apps: [a, b]\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }), "got: {err}");
    }

    #[test]
    fn app_name_rejects_traversal() {
        for bad in ["..", ".", "a/b", "a\\b", ""] {
            let err = app_name(&Value::String(bad.to_string())).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::InvalidAppName { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn app_name_rejects_non_string_keys() {
        let err = app_name(&Value::Number(7.into())).unwrap_err();
        match err {
            ConfigurationError::InvalidAppName { name, .. } => assert_eq!(name, "7"),
            other => panic!("expected invalid app name, got {other:?}"),
        }
    }
}
