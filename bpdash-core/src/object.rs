use crate::protocol::AttrChange;
use crate::status::CheckState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a monitored service.
///
/// Used directly as a map key: `"a.b"/"svc"` and `"a_b"/"svc"` are two
/// different objects, no string sanitizing is involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub host: String,
    pub service: String,
}

impl ObjectKey {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    // same "host!service" notation the checker uses for service names
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.host, self.service)
    }
}

/// Mutable state of one monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectState {
    pub check_state: CheckState,
    #[serde(default)]
    pub downtime: bool,
    #[serde(default)]
    pub acknowledgement: bool,
}

impl ObjectState {
    /// Overwrites the field named by `change`. Returns `false` for
    /// [`AttrChange::Unknown`], which leaves the state untouched.
    pub fn apply(&mut self, change: &AttrChange) -> bool {
        match change {
            AttrChange::State(state) => self.check_state = *state,
            AttrChange::Downtime(downtime) => self.downtime = *downtime,
            AttrChange::Acknowledgement(ack) => self.acknowledgement = *ack,
            AttrChange::Unknown { .. } => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_is_pure_overwrite() {
        let mut state = ObjectState::default();
        let change = AttrChange::State(CheckState::Critical);
        assert!(state.apply(&change));
        let once = state;
        assert!(state.apply(&change));
        assert_eq!(state, once);
        assert_eq!(state.check_state, CheckState::Critical);
    }

    #[test]
    fn test_unknown_change_leaves_state_untouched() {
        let mut state = ObjectState {
            check_state: CheckState::Warn,
            downtime: true,
            acknowledgement: false,
        };
        let before = state;
        let change = AttrChange::Unknown {
            field: "mystery".into(),
            value: json!(true),
        };
        assert!(!state.apply(&change));
        assert_eq!(state, before);
    }

    #[test]
    fn test_colliding_legacy_keys_stay_distinct() {
        let dotted = ObjectKey::new("a.b", "http");
        let underscored = ObjectKey::new("a_b", "http");
        assert_ne!(dotted, underscored);
        assert_eq!(dotted.to_string(), "a.b!http");
    }
}
