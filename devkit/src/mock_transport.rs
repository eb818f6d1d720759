/*!
In-memory channel transport for development without a running hub.

`MockTransport` hands a viewer session the same two ends a WebSocket
connection would (outbound text sink, inbound event stream), records every
frame the session sends, and lets tests inject deltas or a closure.
*/

use bpdash_core::{ChannelEvent, Command, Delta, ObjectKey, ObjectState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// The ends a session consumes: where it writes commands, where events arrive.
pub struct TransportEnds {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

#[derive(Clone)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<String>>>,
    outbound_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<String>>>>,
    inbound_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl MockTransport {
    pub fn new() -> (Self, TransportEnds) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let mock = Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            outbound_rx: Arc::new(Mutex::new(Some(outbound_rx))),
            inbound_tx,
        };
        let ends = TransportEnds {
            outbound: outbound_tx,
            inbound: inbound_rx,
        };
        (mock, ends)
    }

    /// Moves everything the session wrote so far into the record.
    fn drain(&self) {
        let mut rx = self.outbound_rx.lock().unwrap();
        if let Some(rx) = rx.as_mut() {
            let mut sent = self.sent.lock().unwrap();
            while let Ok(text) = rx.try_recv() {
                log::info!("[MOCK] outbound: {} bytes", text.len());
                sent.push(text);
            }
        }
    }

    /// Simulates a delta arriving from the hub.
    pub fn simulate_incoming(&self, text: impl Into<String>) {
        let text = text.into();
        log::info!("[MOCK] simulated incoming: {}", text);
        let _ = self.inbound_tx.send(ChannelEvent::Message(text));
    }

    pub fn simulate_delta(&self, delta: &Delta) {
        self.simulate_incoming(serde_json::to_string(delta).unwrap_or_default());
    }

    /// Simulates the hub closing or the socket erroring.
    pub fn simulate_close(&self, reason: Option<&str>) {
        let _ = self
            .inbound_tx
            .send(ChannelEvent::Closed(reason.map(str::to_string)));
    }

    /// Drops the outbound receiver so further writes from the session fail.
    pub fn sever_outbound(&self) {
        self.drain();
        *self.outbound_rx.lock().unwrap() = None;
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.drain();
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames that decode as commands.
    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent_messages()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    pub fn last_command(&self) -> Option<Command> {
        self.sent_commands().pop()
    }

    pub fn clear(&self) {
        self.drain();
        self.sent.lock().unwrap().clear();
    }
}

/// Minimal stand-in for the hub: applies commands to its own store and
/// fans every applied delta out to all connected mock viewers.
#[derive(Default)]
pub struct LoopbackHub {
    viewers: Vec<(mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<ChannelEvent>)>,
    objects: HashMap<ObjectKey, ObjectState>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, key: ObjectKey, state: ObjectState) {
        self.objects.insert(key, state);
    }

    pub fn connect(&mut self) -> TransportEnds {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.viewers.push((outbound_rx, inbound_tx));
        TransportEnds {
            outbound: outbound_tx,
            inbound: inbound_rx,
        }
    }

    /// Applies every pending command, viewer after viewer in connection
    /// order, broadcasting each one as soon as it is applied. Returns the
    /// number of commands applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = Vec::new();
        for (outbound_rx, _) in self.viewers.iter_mut() {
            while let Ok(text) = outbound_rx.try_recv() {
                match serde_json::from_str::<Command>(&text) {
                    Ok(cmd) => applied.push(cmd),
                    Err(e) => log::warn!("[MOCK] loopback dropped invalid command: {}", e),
                }
            }
        }

        for cmd in &applied {
            let state = self.objects.entry(cmd.key()).or_default();
            for change in cmd.changes() {
                state.apply(&change);
            }
            let text = serde_json::to_string(&cmd.to_delta()).unwrap_or_default();
            for (_, inbound_tx) in &self.viewers {
                let _ = inbound_tx.send(ChannelEvent::Message(text.clone()));
            }
        }
        applied.len()
    }

    pub fn state(&self, key: &ObjectKey) -> Option<ObjectState> {
        self.objects.get(key).copied()
    }
}
