use crate::data::{RlcMode, SecurityIndication, SecurityResult};
use crate::protocols::ngap::QosFlowLevelQosParameters;
use std::collections::{BTreeMap, BTreeSet};
use xxap::{DrbId, FiveQi, GtpTunnel, PduSessionId, PduSessionType, QosFlowId, Snssai};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PdcpConfig {
    pub sn_size: u8,
    pub integrity_protection: bool,
    pub ciphering: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QosFlowContext {
    pub qos_flow_id: QosFlowId,
    pub qos_params: QosFlowLevelQosParameters,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbContext {
    pub drb_id: DrbId,
    pub pdu_session_id: PduSessionId,
    pub snssai: Snssai,
    pub default_drb: bool,
    pub five_qi: FiveQi,
    pub rlc_mode: RlcMode,
    pub pdcp_config: PdcpConfig,
    pub qos_flows: BTreeMap<QosFlowId, QosFlowContext>,
    // F1-U endpoints at the CU-UP.  Filled in from the E1AP response.
    pub ul_up_tnl_information: Vec<GtpTunnel>,
    // F1-U endpoints at the DU.  Filled in from the F1AP response.
    pub dl_up_tnl_information: Vec<GtpTunnel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionContext {
    pub pdu_session_id: PduSessionId,
    pub snssai: Snssai,
    pub pdu_session_type: PduSessionType,
    pub security_indication: SecurityIndication,
    pub security_result: Option<SecurityResult>,
    // N3 endpoint at the UPF.
    pub ul_ngu_tunnel: GtpTunnel,
    // N3 endpoint at the CU-UP.
    pub dl_ngu_tunnel: Option<GtpTunnel>,
    pub drbs: BTreeMap<DrbId, DrbContext>,
}

/// The committed user plane state of one UE.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpContext {
    pub pdu_sessions: BTreeMap<PduSessionId, PduSessionContext>,
    pub drb_map: BTreeMap<DrbId, PduSessionId>,
    pub qos_flow_map: BTreeMap<QosFlowId, DrbId>,
}

impl UpContext {
    pub fn nof_drbs(&self) -> usize {
        self.pdu_sessions.values().map(|s| s.drbs.len()).sum()
    }

    /// Every reverse index entry points at something that exists, every DRB and QoS flow is
    /// indexed, and no QoS flow is mapped to two DRBs.
    pub fn is_consistent(&self) -> bool {
        let mut nof_drbs = 0;
        let mut nof_flows = 0;
        for (session_id, session) in &self.pdu_sessions {
            if session.pdu_session_id != *session_id {
                return false;
            }
            for (drb_id, drb) in &session.drbs {
                nof_drbs += 1;
                if drb.drb_id != *drb_id
                    || drb.pdu_session_id != *session_id
                    || self.drb_map.get(drb_id) != Some(session_id)
                {
                    return false;
                }
                for flow_id in drb.qos_flows.keys() {
                    nof_flows += 1;
                    if self.qos_flow_map.get(flow_id) != Some(drb_id) {
                        return false;
                    }
                }
            }
        }
        nof_drbs == self.drb_map.len() && nof_flows == self.qos_flow_map.len()
    }

    pub(super) fn rebuild_indices(&mut self) {
        self.drb_map.clear();
        self.qos_flow_map.clear();
        for (session_id, session) in &self.pdu_sessions {
            for (drb_id, drb) in &session.drbs {
                self.drb_map.insert(*drb_id, *session_id);
                for flow_id in drb.qos_flows.keys() {
                    self.qos_flow_map.insert(*flow_id, *drb_id);
                }
            }
        }
    }

    pub(super) fn used_drb_ids(&self) -> BTreeSet<DrbId> {
        self.drb_map.keys().copied().collect()
    }
}

/// Proposed change to one PDU session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionUpdate {
    pub pdu_session_id: PduSessionId,
    pub snssai: Snssai,
    pub pdu_session_type: PduSessionType,
    pub security_indication: SecurityIndication,
    pub ul_ngu_tunnel: GtpTunnel,
    pub dl_ngu_tunnel: Option<GtpTunnel>,
    pub security_result: Option<SecurityResult>,
    pub drbs_to_add: BTreeMap<DrbId, DrbContext>,
    pub drbs_to_modify: BTreeMap<DrbId, DrbContext>,
    pub drbs_to_remove: Vec<DrbId>,
}

impl PduSessionUpdate {
    pub(super) fn from_context(session: &PduSessionContext) -> Self {
        PduSessionUpdate {
            pdu_session_id: session.pdu_session_id,
            snssai: session.snssai,
            pdu_session_type: session.pdu_session_type,
            security_indication: session.security_indication,
            ul_ngu_tunnel: session.ul_ngu_tunnel.clone(),
            dl_ngu_tunnel: session.dl_ngu_tunnel.clone(),
            security_result: session.security_result,
            drbs_to_add: BTreeMap::new(),
            drbs_to_modify: BTreeMap::new(),
            drbs_to_remove: vec![],
        }
    }

    pub fn drb_mut(&mut self, drb_id: DrbId) -> Option<&mut DrbContext> {
        match self.drbs_to_add.get_mut(&drb_id) {
            Some(drb) => Some(drb),
            None => self.drbs_to_modify.get_mut(&drb_id),
        }
    }

    /// QoS flows that end up in an added or modified DRB.
    pub fn qos_flows(&self) -> Vec<QosFlowId> {
        self.drbs_to_add
            .values()
            .chain(self.drbs_to_modify.values())
            .flat_map(|drb| drb.qos_flows.keys().copied())
            .collect()
    }
}

/// A proposed, not yet applied, delta against a UE's [`UpContext`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpConfigUpdate {
    // True when the UE has no bearer context at the CU-UP yet.
    pub initial_context_creation: bool,
    pub pdu_sessions_to_setup: BTreeMap<PduSessionId, PduSessionUpdate>,
    pub pdu_sessions_to_modify: BTreeMap<PduSessionId, PduSessionUpdate>,
    pub pdu_sessions_to_remove: Vec<PduSessionId>,
}

impl UpConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.pdu_sessions_to_setup.is_empty()
            && self.pdu_sessions_to_modify.is_empty()
            && self.pdu_sessions_to_remove.is_empty()
    }

    pub fn session_mut(&mut self, id: PduSessionId) -> Option<&mut PduSessionUpdate> {
        match self.pdu_sessions_to_setup.get_mut(&id) {
            Some(s) => Some(s),
            None => self.pdu_sessions_to_modify.get_mut(&id),
        }
    }

    /// Drop a session from the update, e.g. because one of the collaborators rejected it.
    pub fn remove_session(&mut self, id: PduSessionId) -> bool {
        self.pdu_sessions_to_setup.remove(&id).is_some()
            || self.pdu_sessions_to_modify.remove(&id).is_some()
    }

    pub fn session_ids(&self) -> Vec<PduSessionId> {
        self.pdu_sessions_to_setup
            .keys()
            .chain(self.pdu_sessions_to_modify.keys())
            .copied()
            .collect()
    }

    /// Owning session of a DRB that this update adds or modifies.
    pub fn session_of_drb(&self, drb_id: DrbId) -> Option<PduSessionId> {
        self.pdu_sessions_to_setup
            .values()
            .chain(self.pdu_sessions_to_modify.values())
            .find(|s| s.drbs_to_add.contains_key(&drb_id) || s.drbs_to_modify.contains_key(&drb_id))
            .map(|s| s.pdu_session_id)
    }

    pub fn drbs_to_add(&self) -> impl Iterator<Item = &DrbContext> {
        self.pdu_sessions_to_setup
            .values()
            .chain(self.pdu_sessions_to_modify.values())
            .flat_map(|s| s.drbs_to_add.values())
    }

    /// Confirm the update.  Only to be called once every collaborator has accepted its part.
    pub fn into_result(self) -> UpConfigUpdateResult {
        UpConfigUpdateResult {
            pdu_sessions_added: self.pdu_sessions_to_setup.into_values().collect(),
            pdu_sessions_modified: self.pdu_sessions_to_modify.into_values().collect(),
            pdu_sessions_removed: self.pdu_sessions_to_remove,
        }
    }
}

/// The confirmed outcome of an [`UpConfigUpdate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpConfigUpdateResult {
    pub pdu_sessions_added: Vec<PduSessionUpdate>,
    pub pdu_sessions_modified: Vec<PduSessionUpdate>,
    pub pdu_sessions_removed: Vec<PduSessionId>,
}
