use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HubConfig {
    pub listener: ListenerConf,
    /// Directory holding one YAML file per environment.
    pub environments_dir: PathBuf,
    /// File suffix selecting environment files in `environments_dir`.
    pub environments_suffix: String,
    pub timelines_file: PathBuf,
    /// Deltas buffered per viewer before a slow viewer gets disconnected.
    pub broadcast_capacity: usize,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ListenerConf {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConf {
                address: "0.0.0.0".into(),
                port: 8080,
            },
            environments_dir: PathBuf::from("./environments"),
            environments_suffix: ".yaml".into(),
            timelines_file: PathBuf::from("./data/timelines.json"),
            broadcast_capacity: 256,
            mqtt: None,
        }
    }
}

impl HubConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listener.address, self.listener.port)
    }
}

pub async fn load_config() -> HubConfig {
    let path = std::env::var("BPDASH_HUB_CONFIG").unwrap_or_else(|_| "hub.yaml".into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> HubConfig {
    if !path.exists() {
        warn!("[hub] no config at {}, using defaults", path.display());
        return HubConfig::default();
    }
    let txt = fs::read_to_string(path).await.unwrap_or_default();
    if txt.trim().is_empty() {
        return HubConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        error!("[hub] invalid config {}: {e}", path.display());
        HubConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.yaml");
        std::fs::write(&path, "listener:\n  address: 127.0.0.1\n  port: 9090\nmqtt:\n  host: broker\n  port: 1883\n").unwrap();

        let cfg = load_config_from(&path).await;
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9090");
        assert_eq!(cfg.broadcast_capacity, 256);
        assert_eq!(cfg.mqtt.unwrap().host, "broker");
    }

    #[tokio::test]
    async fn test_missing_or_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config_from(&dir.path().join("nope.yaml")).await;
        assert_eq!(missing.listener.port, 8080);

        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "listener: [1, 2").unwrap();
        let invalid = load_config_from(&path).await;
        assert_eq!(invalid.environments_suffix, ".yaml");
    }
}
