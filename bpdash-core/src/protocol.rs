/*!
Wire protocol between viewers and the sync hub.

- `Command` : one toggle intent, viewer -> hub
- `Delta` : one applied change, hub -> every viewer (originator included)
- `AttrChange` : decoded attribute, dispatched by `match` on both sides

Attribute maps stay `serde_json::Map` on the wire so fields this version does
not know travel through the hub untouched; the receiver decides what to do
with them.
*/

use crate::object::ObjectKey;
use crate::status::CheckState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_STATE: &str = "state";
pub const FIELD_DOWNTIME: &str = "downtime";
pub const FIELD_ACKNOWLEDGEMENT: &str = "acknowledgement";

pub type Attrs = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unrecognized attribute '{field}' in {payload}")]
    UnknownField { field: String, payload: String },
    #[error("invalid value for '{field}' in {payload}")]
    InvalidValue { field: String, payload: String },
}

/// State-change intent sent by a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub env: String,
    pub host: String,
    pub service: String,
    #[serde(default)]
    pub attrs: Attrs,
    /// Request id echoed back in the resulting delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Command {
    pub fn new(env: impl Into<String>, host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            host: host.into(),
            service: service.into(),
            attrs: Attrs::new(),
            id: None,
        }
    }

    pub fn with_attr(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(field.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.host.clone(), self.service.clone())
    }

    pub fn changes(&self) -> Vec<AttrChange> {
        decode_attrs(&self.attrs)
    }

    /// The broadcast form of this command once it has been applied.
    pub fn to_delta(&self) -> Delta {
        Delta {
            env: Some(self.env.clone()),
            host: self.host.clone(),
            service: self.service.clone(),
            attrs: self.attrs.clone(),
            id: self.id.clone(),
        }
    }
}

/// Applied change broadcast by the hub to every open channel.
///
/// The hub has a single broadcast stream for all environments, so a delta
/// names the environment it was applied to. Deltas without one come from
/// older hubs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    pub host: String,
    pub service: String,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Delta {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.host.clone(), self.service.clone())
    }

    pub fn changes(&self) -> Vec<AttrChange> {
        decode_attrs(&self.attrs)
    }

    /// False only for deltas tagged with another environment.
    pub fn concerns(&self, env: &str) -> bool {
        self.env.as_deref().map_or(true, |e| e == env)
    }
}

/// One decoded attribute of a command or delta.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrChange {
    State(CheckState),
    Downtime(bool),
    Acknowledgement(bool),
    /// Field this version does not understand, or a recognized field with a
    /// value of the wrong type.
    Unknown { field: String, value: Value },
}

impl AttrChange {
    pub fn parse(field: &str, value: &Value) -> Self {
        let decoded = match field {
            FIELD_STATE => integer(value)
                .and_then(CheckState::from_code)
                .map(AttrChange::State),
            FIELD_DOWNTIME => value.as_bool().map(AttrChange::Downtime),
            FIELD_ACKNOWLEDGEMENT => value.as_bool().map(AttrChange::Acknowledgement),
            _ => None,
        };
        decoded.unwrap_or_else(|| AttrChange::Unknown {
            field: field.to_string(),
            value: value.clone(),
        })
    }

    pub fn is_recognized_field(field: &str) -> bool {
        matches!(field, FIELD_STATE | FIELD_DOWNTIME | FIELD_ACKNOWLEDGEMENT)
    }
}

pub fn decode_attrs(attrs: &Attrs) -> Vec<AttrChange> {
    attrs
        .iter()
        .map(|(field, value)| AttrChange::parse(field, value))
        .collect()
}

// Older checkers emit states as floats (`2.0`)
fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// What a transport hands to the session consuming a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(String),
    Closed(Option<String>),
}
