/**
 * ENVIRONMENT STORE - authoritative state of every monitored service
 *
 * ROLE : holds environment -> host -> service state, loaded once from a
 * directory of YAML files (one file per environment, file stem = name).
 * Only the sync hub mutates it, one command at a time.
 */

use crate::models::{to_view, EnvironmentView, HostsMap};
use bpdash_core::{AttrChange, Command};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid environment file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ApplyError {
    #[error("environment {0} unknown")]
    UnknownEnvironment(String),
    #[error("host {host} not found in environment {env}")]
    UnknownHost { env: String, host: String },
    #[error("service {service} not found on host {host}")]
    UnknownService { host: String, service: String },
    #[error("invalid value {value} for '{field}'")]
    InvalidValue { field: String, value: String },
    #[error("command carries no attributes")]
    Empty,
}

#[derive(Debug, Default)]
pub struct EnvironmentStore {
    envs: BTreeMap<String, HostsMap>,
}

impl EnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every file of `dir` ending with `suffix`. A missing directory
    /// yields an empty store.
    pub fn load_dir(dir: &Path, suffix: &str) -> Result<Self, StoreError> {
        let mut store = Self::new();
        if !dir.exists() {
            info!("[store] no environments directory at {}", dir.display());
            return Ok(store);
        }

        let io_err = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(suffix) else {
                continue;
            };
            let txt = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let hosts: HostsMap = if txt.trim().is_empty() {
                HostsMap::new()
            } else {
                serde_yaml::from_str(&txt).map_err(|source| StoreError::Yaml {
                    path: path.clone(),
                    source,
                })?
            };
            info!("[store] loaded environment {} ({} hosts)", name, hosts.len());
            store.envs.insert(name.to_string(), hosts);
        }
        Ok(store)
    }

    pub fn insert_environment(&mut self, name: impl Into<String>, hosts: HostsMap) {
        self.envs.insert(name.into(), hosts);
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.envs.keys().cloned().collect()
    }

    pub fn environment(&self, name: &str) -> Option<&HostsMap> {
        self.envs.get(name)
    }

    pub fn environment_view(&self, name: &str) -> Option<EnvironmentView> {
        self.environment(name).map(to_view)
    }

    pub fn object_count(&self) -> usize {
        self.envs
            .values()
            .flat_map(|hosts| hosts.values())
            .map(|services| services.len())
            .sum()
    }

    /// Applies every recognized attribute of `cmd`, all or nothing.
    ///
    /// A recognized field with a wrong value rejects the whole command.
    /// Unrecognized fields are skipped and returned so the caller can still
    /// forward them.
    pub fn apply(&mut self, cmd: &Command) -> Result<Vec<String>, ApplyError> {
        if cmd.attrs.is_empty() {
            return Err(ApplyError::Empty);
        }
        let changes = cmd.changes();
        let mut ignored = Vec::new();
        for change in &changes {
            if let AttrChange::Unknown { field, value } = change {
                if AttrChange::is_recognized_field(field) {
                    return Err(ApplyError::InvalidValue {
                        field: field.clone(),
                        value: value.to_string(),
                    });
                }
                ignored.push(field.clone());
            }
        }

        let hosts = self
            .envs
            .get_mut(&cmd.env)
            .ok_or_else(|| ApplyError::UnknownEnvironment(cmd.env.clone()))?;
        let services = hosts.get_mut(&cmd.host).ok_or_else(|| ApplyError::UnknownHost {
            env: cmd.env.clone(),
            host: cmd.host.clone(),
        })?;
        let service = services
            .get_mut(&cmd.service)
            .ok_or_else(|| ApplyError::UnknownService {
                host: cmd.host.clone(),
                service: cmd.service.clone(),
            })?;

        for change in &changes {
            service.apply(change);
        }
        Ok(ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceState;
    use bpdash_core::protocol::{FIELD_DOWNTIME, FIELD_STATE};
    use bpdash_core::CheckState;

    fn store() -> EnvironmentStore {
        let mut hosts = HostsMap::new();
        hosts
            .entry("web01".into())
            .or_default()
            .insert("http".into(), ServiceState::default());
        let mut store = EnvironmentStore::new();
        store.insert_environment("prod", hosts);
        store
    }

    #[test]
    fn test_load_dir_reads_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("prod.yaml"),
            "web01:\n  http:\n    check_state: 2\n    check_output: timeout\n    downtime: true\ndb01:\n  pgsql: {}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = EnvironmentStore::load_dir(dir.path(), ".yaml").unwrap();
        assert_eq!(store.environment_names(), vec!["prod".to_string()]);
        assert_eq!(store.object_count(), 2);
        let svc = &store.environment("prod").unwrap()["web01"]["http"];
        assert_eq!(svc.check_state, CheckState::Critical);
        assert!(svc.downtime);
        assert!(!svc.acknowledgement);
    }

    #[test]
    fn test_load_dir_rejects_out_of_range_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prod.yaml"), "web01:\n  http:\n    check_state: 7\n").unwrap();
        assert!(matches!(
            EnvironmentStore::load_dir(dir.path(), ".yaml"),
            Err(StoreError::Yaml { .. })
        ));
    }

    #[test]
    fn test_apply_known_fields() {
        let mut store = store();
        let cmd = Command::new("prod", "web01", "http")
            .with_attr(FIELD_STATE, 3)
            .with_attr(FIELD_DOWNTIME, true);
        assert_eq!(store.apply(&cmd), Ok(vec![]));
        let view = store.environment_view("prod").unwrap();
        assert_eq!(view["web01"]["http"].check_state, CheckState::Unknown);
        assert!(view["web01"]["http"].downtime);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut store = store();
        let cmd = Command::new("prod", "web01", "http")
            .with_attr(FIELD_DOWNTIME, true)
            .with_attr(FIELD_STATE, "broken");
        assert!(matches!(store.apply(&cmd), Err(ApplyError::InvalidValue { .. })));
        assert!(!store.environment("prod").unwrap()["web01"]["http"].downtime);
    }

    #[test]
    fn test_apply_skips_unrecognized_fields() {
        let mut store = store();
        let cmd = Command::new("prod", "web01", "http")
            .with_attr("mystery", true)
            .with_attr(FIELD_STATE, 1);
        assert_eq!(store.apply(&cmd), Ok(vec!["mystery".to_string()]));
        assert_eq!(
            store.environment("prod").unwrap()["web01"]["http"].check_state,
            CheckState::Warn
        );
    }

    #[test]
    fn test_apply_unknown_entities() {
        let mut store = store();
        let cmd = |env: &str, host: &str, svc: &str| Command::new(env, host, svc).with_attr(FIELD_STATE, 1);
        assert_eq!(
            store.apply(&cmd("qa", "web01", "http")),
            Err(ApplyError::UnknownEnvironment("qa".into()))
        );
        assert!(matches!(store.apply(&cmd("prod", "web02", "http")), Err(ApplyError::UnknownHost { .. })));
        assert!(matches!(store.apply(&cmd("prod", "web01", "smtp")), Err(ApplyError::UnknownService { .. })));
        assert_eq!(store.apply(&Command::new("prod", "web01", "http")), Err(ApplyError::Empty));
    }
}
