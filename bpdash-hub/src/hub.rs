/**
 * SYNC HUB - applies viewer commands and fans the result out
 *
 * Every command goes through `submit`: applied to the authoritative store,
 * then broadcast to every open channel. Both happen under the store lock,
 * so all viewers receive deltas in the order they were applied and converge
 * on the same state. Rejected commands are logged and never broadcast.
 */

use crate::health::{HealthTracker, HubHealth};
use crate::models::EnvironmentView;
use crate::state::{new_state, Shared};
use crate::store::{ApplyError, EnvironmentStore};
use bpdash_core::{Command, Delta};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SyncHub {
    store: Shared<EnvironmentStore>,
    tx: broadcast::Sender<Delta>,
    health: HealthTracker,
}

impl SyncHub {
    pub fn new(store: EnvironmentStore, capacity: usize, health: HealthTracker) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            store: new_state(store),
            tx,
            health,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delta> {
        self.tx.subscribe()
    }

    pub fn submit(&self, cmd: &Command) -> Result<Delta, ApplyError> {
        let mut store = self.store.lock();
        match store.apply(cmd) {
            Ok(ignored) => {
                if !ignored.is_empty() {
                    warn!(target: "hub", "{}/{}: forwarding unrecognized fields {:?}", cmd.env, cmd.key(), ignored);
                }
                let delta = cmd.to_delta();
                // no receiver is not an error: nobody is watching yet
                let receivers = self.tx.send(delta.clone()).unwrap_or(0);
                self.health.record_applied();
                info!(target: "hub", "{}/{} applied {:?} -> {} viewer(s)", cmd.env, cmd.key(), cmd.attrs, receivers);
                Ok(delta)
            }
            Err(e) => {
                self.health.record_rejected();
                warn!(target: "hub", "rejected command for {}/{}: {e}", cmd.env, cmd.key());
                Err(e)
            }
        }
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.store.lock().environment_names()
    }

    pub fn environment_view(&self, name: &str) -> Option<EnvironmentView> {
        self.store.lock().environment_view(name)
    }

    pub fn health_tracker(&self) -> &HealthTracker {
        &self.health
    }

    pub fn health(&self) -> HubHealth {
        self.health.snapshot(&self.store.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostsMap, ServiceState};
    use bpdash_core::protocol::{FIELD_ACKNOWLEDGEMENT, FIELD_STATE};
    use bpdash_core::CheckState;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn hub(capacity: usize) -> SyncHub {
        let mut hosts = HostsMap::new();
        hosts
            .entry("web01".into())
            .or_default()
            .insert("http".into(), ServiceState::default());
        let mut store = EnvironmentStore::new();
        store.insert_environment("prod", hosts);
        SyncHub::new(store, capacity, HealthTracker::new())
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_the_delta() {
        let hub = hub(16);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let cmd = Command::new("prod", "web01", "http")
            .with_attr(FIELD_STATE, 2)
            .with_id("req-1");
        hub.submit(&cmd).unwrap();

        for rx in [&mut a, &mut b] {
            let delta = rx.recv().await.unwrap();
            assert_eq!(delta.host, "web01");
            assert_eq!(delta.id.as_deref(), Some("req-1"));
            assert_eq!(delta.attrs[FIELD_STATE], 2);
        }
        let view = hub.environment_view("prod").unwrap();
        assert_eq!(view["web01"]["http"].check_state, CheckState::Critical);
    }

    #[tokio::test]
    async fn test_rejected_command_is_not_broadcast() {
        let hub = hub(16);
        let mut rx = hub.subscribe();
        let cmd = Command::new("prod", "web01", "smtp").with_attr(FIELD_ACKNOWLEDGEMENT, true);

        assert!(hub.submit(&cmd).is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.health().commands_rejected, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins_in_order() {
        let hub = hub(16);
        let mut rx = hub.subscribe();
        for code in [1, 3, 0, 2] {
            hub.submit(&Command::new("prod", "web01", "http").with_attr(FIELD_STATE, code))
                .unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv().await.unwrap().attrs[FIELD_STATE].as_i64().unwrap());
        }
        assert_eq!(seen, vec![1, 3, 0, 2]);
        let view = hub.environment_view("prod").unwrap();
        assert_eq!(view["web01"]["http"].check_state, CheckState::Critical);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let hub = hub(1);
        let mut rx = hub.subscribe();
        for code in [1, 2] {
            hub.submit(&Command::new("prod", "web01", "http").with_attr(FIELD_STATE, code))
                .unwrap();
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(1))));
    }
}
