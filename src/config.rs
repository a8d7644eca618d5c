use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::datasource::{DEFAULT_FETCH_TIMEOUT, DatasourceKind, FetchTarget};
use crate::layout::{ForceOptions, StyleKind};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between scheduler runs over the datasources.
    pub scheduler_interval: f64,
    /// Per-kind overrides of the datasource update interval, in seconds.
    pub update_intervals: BTreeMap<DatasourceKind, f64>,
    /// Per-kind replacements for the default fetch url and params.
    pub fetch_targets: BTreeMap<DatasourceKind, FetchTarget>,
    /// Seconds a `--fetch-command` program may run before it is killed.
    pub fetch_timeout_secs: f64,
    pub default_style: StyleKind,
    /// Energy injected after every data swap or layout change.
    pub restart_alpha: f32,
    pub force: ForceOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler_interval: 10.0,
            update_intervals: BTreeMap::new(),
            fetch_targets: BTreeMap::new(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs_f64(),
            default_style: StyleKind::Hierarchy,
            restart_alpha: 0.5,
            force: ForceOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Negative or non-finite settings fall back to the default.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.fetch_timeout_secs).unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn update_interval(&self, kind: DatasourceKind) -> f64 {
        self.update_intervals
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_interval_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nodevis.json");
        fs::write(
            &path,
            r#"{"default_style": "radial", "update_intervals": {"aggregations": 5}, "force": {"center_force": 8}}"#,
        )
        .expect("write config");

        let config = EngineConfig::load(&path).expect("valid config");

        assert_eq!(config.default_style, StyleKind::Radial);
        assert_eq!(config.scheduler_interval, 10.0);
        assert_eq!(config.restart_alpha, 0.5);
        assert_eq!(config.update_interval(DatasourceKind::Aggregations), 5.0);
        assert_eq!(config.update_interval(DatasourceKind::Topology), 30.0);
        assert_eq!(config.force.center_force, 8.0);
        assert_eq!(config.force.force_node, -300.0);
        assert!(config.fetch_targets.is_empty());
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn unusable_fetch_timeout_falls_back() {
        let mut config = EngineConfig {
            fetch_timeout_secs: 2.5,
            ..EngineConfig::default()
        };
        assert_eq!(config.fetch_timeout(), Duration::from_millis(2500));

        config.fetch_timeout_secs = -1.0;
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
        config.fetch_timeout_secs = f64::NAN;
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn fetch_targets_are_keyed_by_kind() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"fetch_targets": {"topology": {"url": "topology_v2.py", "params": {"depth": 2}}}}"#,
        )
        .expect("valid config");

        let target = &config.fetch_targets[&DatasourceKind::Topology];
        assert_eq!(target.url, "topology_v2.py");
        assert_eq!(target.params["depth"], 2);
        assert!(!config.fetch_targets.contains_key(&DatasourceKind::Aggregations));
    }

    #[test]
    fn unreadable_or_malformed_config_reports_the_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.json");

        let missing = EngineConfig::load(&path).expect_err("no file");
        assert!(format!("{missing:#}").contains("broken.json"));

        fs::write(&path, "{ not json").expect("write config");
        let malformed = EngineConfig::load(&path).expect_err("bad json");
        assert!(malformed.to_string().contains("failed to parse config"));
    }

    #[test]
    fn no_path_means_defaults() {
        let config = EngineConfig::load_or_default(None).expect("defaults");
        assert_eq!(config, EngineConfig::default());
    }
}
