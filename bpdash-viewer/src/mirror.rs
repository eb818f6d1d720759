/*!
Local mirror of the hub's object state.

Entries are keyed by the structured `(host, service)` key, so hosts like
`a.b` and `a_b` never collide. The mirror is seeded from the read model and
afterwards changes only through deltas broadcast by the hub.
*/

use bpdash_core::{AttrChange, Delta, ObjectKey, ObjectState, ProtocolError};
use std::collections::{BTreeMap, BTreeSet};

pub const DOWNTIME_ON: &str = "downtime-on";
pub const DOWNTIME_OFF: &str = "downtime-off";
pub const ACK_ON: &str = "ack-on";
pub const ACK_OFF: &str = "ack-off";

/// What a front end shows for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedObject {
    pub label: &'static str,
    pub status_class: &'static str,
    pub flag_classes: BTreeSet<&'static str>,
}

impl RenderedObject {
    pub fn of(state: &ObjectState) -> Self {
        let mut view = Self {
            label: state.check_state.label(),
            status_class: state.check_state.css_class(),
            flag_classes: BTreeSet::new(),
        };
        view.set_flag(DOWNTIME_ON, DOWNTIME_OFF, state.downtime);
        view.set_flag(ACK_ON, ACK_OFF, state.acknowledgement);
        view
    }

    fn set_flag(&mut self, on: &'static str, off: &'static str, value: bool) {
        let (stale, fresh) = if value { (off, on) } else { (on, off) };
        self.flag_classes.remove(stale);
        self.flag_classes.insert(fresh);
    }

    /// Brings the view in line with one applied change.
    fn update(&mut self, change: &AttrChange) {
        match change {
            AttrChange::State(state) => {
                self.label = state.label();
                self.status_class = state.css_class();
            }
            AttrChange::Downtime(on) => self.set_flag(DOWNTIME_ON, DOWNTIME_OFF, *on),
            AttrChange::Acknowledgement(on) => self.set_flag(ACK_ON, ACK_OFF, *on),
            AttrChange::Unknown { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub state: ObjectState,
    pub view: RenderedObject,
}

impl MirrorEntry {
    pub fn new(state: ObjectState) -> Self {
        Self {
            view: RenderedObject::of(&state),
            state,
        }
    }
}

#[derive(Debug, Default)]
pub struct ObjectMirror {
    entries: BTreeMap<ObjectKey, MirrorEntry>,
}

impl ObjectMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the mirror from `GET /environments/{name}`.
    pub fn from_environment(view: BTreeMap<String, BTreeMap<String, ObjectState>>) -> Self {
        let mut mirror = Self::new();
        for (host, services) in view {
            for (service, state) in services {
                mirror.insert(ObjectKey::new(host.clone(), service), state);
            }
        }
        mirror
    }

    pub fn insert(&mut self, key: ObjectKey, state: ObjectState) {
        self.entries.insert(key, MirrorEntry::new(state));
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&MirrorEntry> {
        self.entries.get(key)
    }

    pub fn state(&self, key: &ObjectKey) -> Option<ObjectState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &MirrorEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a broadcast delta. Re-applying the same delta is a no-op.
    ///
    /// Fields that cannot be applied come back as errors and leave the entry
    /// untouched; the recognized fields of the same delta still apply. An
    /// object seen for the first time is created from defaults, but only
    /// when the delta names its environment: an untagged delta for an
    /// unknown object cannot be attributed to this mirror and is skipped.
    pub fn apply_delta(&mut self, delta: &Delta, raw: &str) -> Vec<ProtocolError> {
        let key = delta.key();
        if delta.env.is_none() && !self.entries.contains_key(&key) {
            return Vec::new();
        }

        let mut errors = Vec::new();
        let mut applicable = Vec::new();
        for change in delta.changes() {
            match change {
                AttrChange::Unknown { field, .. } => {
                    let payload = raw.to_string();
                    errors.push(if AttrChange::is_recognized_field(&field) {
                        ProtocolError::InvalidValue { field, payload }
                    } else {
                        ProtocolError::UnknownField { field, payload }
                    });
                }
                known => applicable.push(known),
            }
        }

        if !applicable.is_empty() {
            let entry = self
                .entries
                .entry(key)
                .or_insert_with(|| MirrorEntry::new(ObjectState::default()));
            for change in &applicable {
                entry.state.apply(change);
                entry.view.update(change);
            }
        }
        errors
    }
}
