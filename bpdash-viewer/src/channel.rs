/*!
StateSyncChannel: the viewer's end of the duplex link to the hub.

Commands are serialized onto the outbound sink and forgotten: no waiting,
no local mutation, the hub's broadcast is the only confirmation. Each
command carries a request id; the echoed id clears it from the pending set,
and `sweep_unconfirmed` reports the ones the hub never echoed. There is no
retry.

Lifecycle is one-way: `Open` until the transport fails or the hub closes
it, then `Closed` for good. Commands sent on a closed channel are dropped.
*/

use bpdash_core::{Attrs, Command, ObjectKey};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Open,
    Closed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub id: String,
    pub key: ObjectKey,
    pub attrs: Attrs,
    pub sent_at: Instant,
}

pub struct StateSyncChannel {
    env: String,
    outbound: mpsc::UnboundedSender<String>,
    status: ChannelStatus,
    pending: BTreeMap<String, PendingCommand>,
}

impl StateSyncChannel {
    pub fn new(env: impl Into<String>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            env: env.into(),
            outbound,
            status: ChannelStatus::Open,
            pending: BTreeMap::new(),
        }
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn status(&self) -> &ChannelStatus {
        &self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ChannelStatus::Open
    }

    /// Fire-and-forget. Returns the request id when the command left, `None`
    /// when it was dropped.
    pub fn send_command(&mut self, host: &str, service: &str, attrs: Attrs) -> Option<String> {
        self.send_command_at(Instant::now(), host, service, attrs)
    }

    pub fn send_command_at(&mut self, now: Instant, host: &str, service: &str, attrs: Attrs) -> Option<String> {
        if !self.is_open() {
            debug!(target: "channel", "dropping command for {host}!{service}: channel closed");
            return None;
        }

        let id = Uuid::new_v4().to_string();
        let mut cmd = Command::new(self.env.clone(), host, service).with_id(id.clone());
        cmd.attrs = attrs;
        let text = match serde_json::to_string(&cmd) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "channel", "cannot encode command: {e}");
                return None;
            }
        };

        if self.outbound.send(text).is_err() {
            self.close("transport gone");
            return None;
        }
        self.pending.insert(
            id.clone(),
            PendingCommand {
                id: id.clone(),
                key: cmd.key(),
                attrs: cmd.attrs,
                sent_at: now,
            },
        );
        Some(id)
    }

    /// Moves the channel to `Closed`. Returns `false` if it already was.
    pub fn close(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        let reason = reason.into();
        warn!(target: "channel", "channel to {} closed: {reason}", self.env);
        self.status = ChannelStatus::Closed { reason };
        true
    }

    /// Clears a pending command once its echo arrived.
    pub fn confirm(&mut self, id: &str) -> Option<PendingCommand> {
        self.pending.remove(id)
    }

    /// Removes and returns every command older than `timeout`.
    pub fn sweep_unconfirmed(&mut self, now: Instant, timeout: Duration) -> Vec<PendingCommand> {
        let expired: Vec<String> = self
            .pending
            .values()
            .filter(|p| now.saturating_duration_since(p.sent_at) >= timeout)
            .map(|p| p.id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingCommand> {
        self.pending.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpdash_core::protocol::FIELD_STATE;
    use bpdash_devkit::MockTransport;
    use serde_json::json;

    fn attrs(field: &str, value: serde_json::Value) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert(field.to_string(), value);
        attrs
    }

    #[test]
    fn test_send_serializes_command_with_id() {
        let (mock, ends) = MockTransport::new();
        let mut channel = StateSyncChannel::new("prod", ends.outbound);

        let id = channel.send_command("web01", "http", attrs(FIELD_STATE, json!(1))).unwrap();
        let cmd = mock.last_command().unwrap();
        assert_eq!(cmd.env, "prod");
        assert_eq!(cmd.key(), ObjectKey::new("web01", "http"));
        assert_eq!(cmd.attrs[FIELD_STATE], 1);
        assert_eq!(cmd.id.as_deref(), Some(id.as_str()));
        assert_eq!(channel.pending().count(), 1);
    }

    #[test]
    fn test_unrecognized_fields_forwarded_as_is() {
        let (mock, ends) = MockTransport::new();
        let mut channel = StateSyncChannel::new("prod", ends.outbound);
        channel.send_command("web01", "http", attrs("mystery", json!({"a": 1})));
        assert_eq!(mock.last_command().unwrap().attrs["mystery"], json!({"a": 1}));
    }

    #[test]
    fn test_closed_channel_drops_commands() {
        let (mock, ends) = MockTransport::new();
        let mut channel = StateSyncChannel::new("prod", ends.outbound);
        assert!(channel.close("hub went away"));
        assert!(!channel.close("again"));

        assert!(channel.send_command("web01", "http", attrs(FIELD_STATE, json!(1))).is_none());
        assert!(mock.sent_messages().is_empty());
        assert_eq!(
            channel.status(),
            &ChannelStatus::Closed { reason: "hub went away".into() }
        );
    }

    #[test]
    fn test_send_failure_closes_channel() {
        let (mock, ends) = MockTransport::new();
        let mut channel = StateSyncChannel::new("prod", ends.outbound);
        mock.sever_outbound();
        assert!(channel.send_command("web01", "http", attrs(FIELD_STATE, json!(1))).is_none());
        assert!(!channel.is_open());
        assert_eq!(channel.pending().count(), 0);
    }

    #[test]
    fn test_sweep_and_confirm() {
        let (_mock, ends) = MockTransport::new();
        let mut channel = StateSyncChannel::new("prod", ends.outbound);
        let t0 = Instant::now();
        let first = channel.send_command_at(t0, "web01", "http", attrs(FIELD_STATE, json!(1))).unwrap();
        let second = channel
            .send_command_at(t0 + Duration::from_secs(5), "web01", "ssh", attrs(FIELD_STATE, json!(2)))
            .unwrap();

        assert!(channel.confirm(&second).is_some());
        assert!(channel.confirm(&second).is_none());

        let timeout = Duration::from_secs(10);
        assert!(channel.sweep_unconfirmed(t0 + Duration::from_secs(9), timeout).is_empty());
        let expired = channel.sweep_unconfirmed(t0 + Duration::from_secs(10), timeout);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, first);
        assert_eq!(channel.pending().count(), 0);
    }
}
