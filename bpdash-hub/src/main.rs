/**
 * BPDASH HUB - authoritative state and read model of the dashboard
 *
 * ROLE : loads environments and timelines, serves the read-model API and the
 * state-sync WebSocket, and keeps every connected viewer converged on the
 * same object state.
 *
 * Optional MQTT: applied deltas and periodic health snapshots are mirrored
 * to a broker when `mqtt` is configured.
 */

mod config;
mod health;
mod http;
mod hub;
mod models;
mod mqtt;
mod ports;
mod state;
mod store;
mod ws;

#[cfg(test)]
mod test_support;

use crate::config::load_config;
use crate::health::HealthTracker;
use crate::hub::SyncHub;
use crate::ports::FileTimelineStore;
use crate::state::AppState;
use crate::store::EnvironmentStore;
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;

    let store = EnvironmentStore::load_dir(&cfg.environments_dir, &cfg.environments_suffix)
        .context("loading environments")?;
    info!(target: "hub", "{} environment(s), {} object(s)",
        store.environment_names().len(), store.object_count());

    let timelines = FileTimelineStore::new(&cfg.timelines_file)
        .with_context(|| format!("loading timelines from {}", cfg.timelines_file.display()))?;

    let health = HealthTracker::new();
    let hub = SyncHub::new(store, cfg.broadcast_capacity, health.clone());

    if let Some(mqtt) = cfg.mqtt.clone() {
        mqtt::spawn_delta_bridge(mqtt.clone(), hub.clone());
        health.spawn_health_publisher(mqtt, hub.clone());
    }

    let app_state = AppState {
        hub,
        timelines: Arc::new(timelines),
    };
    let app = http::build_router(app_state);

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(target: "hub", "listening on http://{addr}");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
