/*!
ViewerSession: one viewer's live view of an environment.

Owns the channel, the mirror and the notifier, and is passed around by
reference. Inbound transport events go through [`ViewerSession::handle`];
toggles read the mirror to compute the next value but never write to it.
*/

use crate::channel::{ChannelStatus, StateSyncChannel};
use crate::mirror::ObjectMirror;
use crate::notify::{NotificationKind, Notifier};
use bpdash_core::protocol::{FIELD_ACKNOWLEDGEMENT, FIELD_DOWNTIME, FIELD_STATE};
use bpdash_core::{Attrs, ChannelEvent, Delta, ObjectKey};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub ack_timeout: Duration,
    pub notification_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            notification_ttl: Duration::from_secs(8),
        }
    }
}

pub struct ViewerSession {
    pub channel: StateSyncChannel,
    pub mirror: ObjectMirror,
    pub notifier: Notifier,
    config: SessionConfig,
}

impl ViewerSession {
    pub fn new(channel: StateSyncChannel, mirror: ObjectMirror, config: SessionConfig) -> Self {
        Self {
            channel,
            mirror,
            notifier: Notifier::new(config.notification_ttl),
            config,
        }
    }

    pub fn send_command(&mut self, host: &str, service: &str, attrs: Attrs) -> Option<String> {
        let was_open = self.channel.is_open();
        let sent = self.channel.send_command(host, service, attrs);
        if was_open && !self.channel.is_open() {
            self.notify_closed();
        }
        sent
    }

    /// Advances the check state `(state + 1) mod 4`.
    pub fn toggle_state(&mut self, key: &ObjectKey) -> Option<String> {
        let next = self.mirror.state(key)?.check_state.next();
        self.send_one(key, FIELD_STATE, Value::from(next.code()))
    }

    pub fn toggle_downtime(&mut self, key: &ObjectKey) -> Option<String> {
        let next = !self.mirror.state(key)?.downtime;
        self.send_one(key, FIELD_DOWNTIME, Value::Bool(next))
    }

    pub fn toggle_acknowledgement(&mut self, key: &ObjectKey) -> Option<String> {
        let next = !self.mirror.state(key)?.acknowledgement;
        self.send_one(key, FIELD_ACKNOWLEDGEMENT, Value::Bool(next))
    }

    fn send_one(&mut self, key: &ObjectKey, field: &str, value: Value) -> Option<String> {
        let mut attrs = Attrs::new();
        attrs.insert(field.to_string(), value);
        self.send_command(&key.host, &key.service, attrs)
    }

    /// Processes one transport event. Returns the delta when one was applied.
    pub fn handle(&mut self, event: ChannelEvent) -> Option<Delta> {
        match event {
            ChannelEvent::Message(text) => self.on_delta(&text),
            ChannelEvent::Closed(reason) => {
                if self.channel.close(reason.unwrap_or_else(|| "closed by hub".into())) {
                    self.notify_closed();
                }
                None
            }
        }
    }

    fn on_delta(&mut self, text: &str) -> Option<Delta> {
        if !self.channel.is_open() {
            return None;
        }
        let delta = match Delta::decode(text) {
            Ok(delta) => delta,
            Err(e) => {
                self.notifier.protocol_error(&e, text);
                return None;
            }
        };
        if !delta.concerns(self.channel.env()) {
            debug!(target: "channel", "skipping delta for {:?}/{}", delta.env, delta.key());
            return None;
        }
        if let Some(id) = &delta.id {
            if self.channel.confirm(id).is_some() {
                debug!(target: "channel", "request {id} confirmed");
            }
        }
        for err in self.mirror.apply_delta(&delta, text) {
            self.notifier.protocol_error(&err, text);
        }
        Some(delta)
    }

    fn notify_closed(&mut self) {
        let ChannelStatus::Closed { reason } = self.channel.status() else {
            return;
        };
        let message = format!("channel closed ({reason}), reload to resume live updates");
        self.notifier.push(
            NotificationKind::ChannelClosed,
            message,
            None,
        );
    }

    /// Turns commands the hub never echoed into notifications and drops
    /// expired notifications. Returns how many commands went unconfirmed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.channel.sweep_unconfirmed(now, self.config.ack_timeout);
        for cmd in &expired {
            self.notifier.push_at(
                now,
                NotificationKind::Unconfirmed,
                format!("change to {} was not confirmed by the hub", cmd.key),
                None,
            );
        }
        self.notifier.prune(now);
        expired.len()
    }

    /// Consumes transport events until the channel closes. `on_delta` sees
    /// every applied delta with the session already updated.
    pub async fn run<F>(&mut self, mut inbound: mpsc::UnboundedReceiver<ChannelEvent>, mut on_delta: F)
    where
        F: FnMut(&ViewerSession, &Delta),
    {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        while self.channel.is_open() {
            tokio::select! {
                event = inbound.recv() => {
                    let event = event.unwrap_or(ChannelEvent::Closed(Some("transport ended".into())));
                    if let Some(delta) = self.handle(event) {
                        on_delta(self, &delta);
                    }
                }
                _ = ticker.tick() => {
                    self.sweep(Instant::now());
                }
            }
        }
        info!(target: "channel", "session for {} ended", self.channel.env());
    }
}
