use crate::config::MqttConf;
use crate::hub::SyncHub;
use crate::store::EnvironmentStore;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::task;
use tracing::{debug, warn};

pub const HEALTH_TOPIC: &str = "bpdash/hub/health@v1";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HubHealth {
    pub uptime_seconds: u64,
    pub started_at: String,
    pub environments_loaded: usize,
    pub objects_tracked: usize,
    pub viewers_connected: usize,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    started_at: OffsetDateTime,
    viewers: Arc<AtomicUsize>,
    applied: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<String>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
            viewers: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new("disabled".to_string())),
        }
    }

    pub fn viewer_connected(&self) {
        self.viewers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn viewer_disconnected(&self) {
        self.viewers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn viewers(&self) -> usize {
        self.viewers.load(Ordering::Relaxed)
    }

    pub fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn snapshot(&self, store: &EnvironmentStore) -> HubHealth {
        HubHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            started_at: self.started_at.format(&Rfc3339).unwrap_or_default(),
            environments_loaded: store.environment_names().len(),
            objects_tracked: store.object_count(),
            viewers_connected: self.viewers(),
            commands_applied: self.applied.load(Ordering::Relaxed),
            commands_rejected: self.rejected.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }

    /// Publishes the health snapshot every 30s on its own MQTT connection.
    pub fn spawn_health_publisher(&self, mqtt: MqttConf, hub: SyncHub) {
        let tracker = self.clone();
        *tracker.mqtt_status.lock() = "connecting".to_string();

        task::spawn(async move {
            let mut opts = MqttOptions::new("bpdash-hub-health", &mqtt.host, mqtt.port);
            opts.set_keep_alive(Duration::from_secs(15));
            let (client, mut eventloop) = AsyncClient::new(opts, 10);
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let health = hub.health();
                        match serde_json::to_string(&health) {
                            Ok(payload) => {
                                if let Err(e) = client.publish(HEALTH_TOPIC, QoS::AtLeastOnce, false, payload).await {
                                    warn!(target: "health", "failed to publish: {e:?}");
                                } else {
                                    debug!(target: "health", "published (uptime: {}s, viewers: {})",
                                        health.uptime_seconds, health.viewers_connected);
                                }
                            }
                            Err(e) => warn!(target: "health", "cannot encode snapshot: {e}"),
                        }
                    },
                    event = eventloop.poll() => {
                        match event {
                            Ok(rumqttc::Event::Incoming(rumqttc::Incoming::ConnAck(_))) => tracker.mark_mqtt_connected(),
                            Ok(_) => {}
                            Err(e) => {
                                warn!(target: "health", "MQTT error: {e:?}");
                                tracker.increment_reconnects();
                                tokio::time::sleep(Duration::from_secs(2)).await;
                            }
                        }
                    }
                }
            }
        });
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}
