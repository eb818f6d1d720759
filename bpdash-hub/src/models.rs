use bpdash_core::{AttrChange, CheckState, ObjectState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authoritative state of one service as held by the hub.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ServiceState {
    #[serde(default)]
    pub check_state: CheckState,
    #[serde(default)]
    pub check_output: String,
    #[serde(default)]
    pub acknowledgement: bool,
    #[serde(default)]
    pub downtime: bool,
}

impl ServiceState {
    pub fn object_state(&self) -> ObjectState {
        ObjectState {
            check_state: self.check_state,
            downtime: self.downtime,
            acknowledgement: self.acknowledgement,
        }
    }

    pub fn apply(&mut self, change: &AttrChange) -> bool {
        let mut state = self.object_state();
        let known = state.apply(change);
        self.check_state = state.check_state;
        self.downtime = state.downtime;
        self.acknowledgement = state.acknowledgement;
        known
    }
}

pub type ServicesMap = BTreeMap<String, ServiceState>;
/// hostname -> service name -> state, the content of one environment file.
pub type HostsMap = BTreeMap<String, ServicesMap>;

/// Read-model view of an environment: hostname -> service -> state.
pub type EnvironmentView = BTreeMap<String, BTreeMap<String, ObjectState>>;

pub fn to_view(hosts: &HostsMap) -> EnvironmentView {
    hosts
        .iter()
        .map(|(host, services)| {
            let services = services
                .iter()
                .map(|(name, svc)| (name.clone(), svc.object_state()))
                .collect();
            (host.clone(), services)
        })
        .collect()
}
