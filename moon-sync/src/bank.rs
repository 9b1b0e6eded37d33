//! Ordered sets of app records and the diff between two of them.
//!
//! An [`AppBank`] is either the desired state derived from one read of the
//! configuration, or the reconciler's view of what is currently running.
//! Membership is a linear scan using record equality, i.e. fingerprints.

use std::path::Path;

use moon_core::Configuration;

use crate::error::SyncError;
use crate::record::AppRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppBank {
    apps: Vec<AppRecord>,
}

impl AppBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// One record per configured app, in configuration order.
    pub fn from_configuration(
        apps_root: &Path,
        configuration: &Configuration,
    ) -> Result<Self, SyncError> {
        let apps = configuration
            .apps
            .iter()
            .map(|(name, spec)| AppRecord::new(apps_root, name.clone(), spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { apps })
    }

    pub fn contains(&self, record: &AppRecord) -> bool {
        self.apps.iter().any(|app| app == record)
    }

    /// Append `record` unless an equal one is already present.
    pub fn insert(&mut self, record: AppRecord) {
        if !self.contains(&record) {
            self.apps.push(record);
        }
    }

    /// Remove the record equal to `record`, if any.
    pub fn remove(&mut self, record: &AppRecord) -> bool {
        let before = self.apps.len();
        self.apps.retain(|app| app != record);
        self.apps.len() != before
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppRecord> {
        self.apps.iter()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// What it takes to go from `self` (running) to `desired`.
    pub fn plan(&self, desired: &AppBank) -> Plan {
        Plan {
            to_kill: self
                .iter()
                .filter(|app| !desired.contains(app))
                .cloned()
                .collect(),
            to_start: desired
                .iter()
                .filter(|app| !self.contains(app))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AppBank {
    type Item = &'a AppRecord;
    type IntoIter = std::slice::Iter<'a, AppRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.apps.iter()
    }
}

impl FromIterator<AppRecord> for AppBank {
    fn from_iter<I: IntoIterator<Item = AppRecord>>(iter: I) -> Self {
        let mut bank = AppBank::new();
        for record in iter {
            bank.insert(record);
        }
        bank
    }
}

/// Records to kill (running, no longer desired) and to start (desired, not
/// running). Kills are applied before starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_kill: Vec<AppRecord>,
    pub to_start: Vec<AppRecord>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.to_kill.is_empty() && self.to_start.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use moon_core::{AppName, AppSpec};
    use serde_yaml::Value;

    use super::*;

    fn app(name: &str, compose: &str) -> AppRecord {
        let spec = AppSpec::new(
            format!("https://git.example.com/{name}.git"),
            "main",
            serde_yaml::from_str::<Value>(compose).unwrap(),
        );
        AppRecord::new(&PathBuf::from("/apps"), AppName::from(name), &spec).unwrap()
    }

    fn names(records: &[AppRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name().as_str()).collect()
    }

    #[test]
    fn plan_kills_removed_and_starts_added() {
        let running: AppBank = [app("a", "{}"), app("b", "{}")].into_iter().collect();
        let desired: AppBank = [app("b", "{}"), app("c", "{}")].into_iter().collect();

        let plan = running.plan(&desired);
        assert_eq!(names(&plan.to_kill), ["a"]);
        assert_eq!(names(&plan.to_start), ["c"]);
    }

    #[test]
    fn plan_against_identical_bank_is_empty() {
        let running: AppBank = [app("a", "{x: 1}"), app("b", "{}")].into_iter().collect();
        let desired = running.clone();
        assert!(running.plan(&desired).is_empty());
    }

    #[test]
    fn changed_descriptor_is_kill_plus_start() {
        let running: AppBank = [app("a", "{x: 1}")].into_iter().collect();
        let desired: AppBank = [app("a", "{x: 2}")].into_iter().collect();

        let plan = running.plan(&desired);
        assert_eq!(names(&plan.to_kill), ["a"]);
        assert_eq!(names(&plan.to_start), ["a"]);
        assert_eq!(plan.to_start[0].descriptor(), "x: 2\n");
    }

    #[test]
    fn starts_follow_desired_order() {
        let running = AppBank::new();
        let desired: AppBank = [app("z", "{}"), app("m", "{}"), app("a", "{}")]
            .into_iter()
            .collect();
        assert_eq!(names(&running.plan(&desired).to_start), ["z", "m", "a"]);
    }

    #[test]
    fn from_configuration_preserves_order() {
        let configuration = moon_core::config::parse(
            std::path::Path::new("configuration.yml"),
            "apps:\n  web: {url: u1, branch: main}\n  api: {url: u2, branch: main}\n",
        )
        .unwrap();
        let bank = AppBank::from_configuration(Path::new("/apps"), &configuration).unwrap();
        let order: Vec<_> = bank.iter().map(|r| r.workspace().path().to_path_buf()).collect();
        assert_eq!(order, [PathBuf::from("/apps/web"), PathBuf::from("/apps/api")]);
    }

    #[test]
    fn insert_and_remove_use_fingerprint_equality() {
        let mut bank = AppBank::new();
        bank.insert(app("a", "{x: 1}"));
        bank.insert(app("a", "{x: 1}"));
        assert_eq!(bank.len(), 1);

        assert!(!bank.remove(&app("a", "{x: 2}")));
        assert!(bank.remove(&app("a", "{x: 1}")));
        assert!(bank.is_empty());
    }
}
