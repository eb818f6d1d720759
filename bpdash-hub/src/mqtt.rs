use crate::config::MqttConf;
use crate::hub::SyncHub;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task;
use tracing::{debug, error, warn};

pub const DELTA_TOPIC: &str = "bpdash/objects/delta@v1";

/// Mirrors every applied delta onto MQTT for consumers outside the dashboard.
pub fn spawn_delta_bridge(mqtt: MqttConf, hub: SyncHub) {
    let mut deltas = hub.subscribe();

    task::spawn(async move {
        let mut opts = MqttOptions::new("bpdash-hub", &mqtt.host, mqtt.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        // rumqttc only makes progress while the event loop is polled
        task::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    warn!(target: "mqtt", "connection error: {e:?}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        });

        loop {
            match deltas.recv().await {
                Ok(delta) => {
                    let payload = match serde_json::to_vec(&delta) {
                        Ok(p) => p,
                        Err(e) => {
                            error!(target: "mqtt", "cannot encode delta: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = client.publish(DELTA_TOPIC, QoS::AtLeastOnce, false, payload).await {
                        warn!(target: "mqtt", "publish failed: {e:?}");
                    } else {
                        debug!(target: "mqtt", "published delta for {}", delta.key());
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(target: "mqtt", "bridge skipped {n} deltas"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
