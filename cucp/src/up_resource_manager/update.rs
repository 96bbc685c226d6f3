//! update - validation of requests against the current UP context, and calculation of the delta
//! that carrying them out would produce

use super::types::*;
use crate::data::{IndicationLevel, SecurityIndication, UpResourceConfig};
use crate::protocols::ngap::{
    PduSessionResourceModifyItem, PduSessionResourceModifyRequest,
    PduSessionResourceReleaseCommand, PduSessionResourceSetupItem,
    PduSessionResourceSetupRequest, QosFlowSetupRequestItem,
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use xxap::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("Request contains no PDU sessions")]
    Empty,
    #[error("PDU session {0:?} is listed twice or already exists")]
    DuplicatePduSession(PduSessionId),
    #[error("PDU session {0:?} does not exist")]
    UnknownPduSession(PduSessionId),
    #[error("PDU session {0:?} has no QoS flows")]
    NoQosFlows(PduSessionId),
    #[error("QoS flow {0:?} is listed twice or already mapped")]
    DuplicateQosFlow(QosFlowId),
    #[error("QoS flow {0:?} does not exist")]
    UnknownQosFlow(QosFlowId),
    #[error("QoS flow {0:?} is out of range")]
    InvalidQosFlowId(QosFlowId),
    #[error("5QI {0:?} is not configured")]
    UnsupportedFiveQi(FiveQi),
    #[error("DRB {0:?} is used twice")]
    DuplicateDrb(DrbId),
    #[error("DRB {0:?} is malformed")]
    MalformedDrb(DrbId),
    #[error("Too many PDU sessions")]
    TooManyPduSessions,
    #[error("Too many DRBs")]
    TooManyDrbs,
    #[error("Too many QoS flows on DRB {0:?}")]
    TooManyQosFlows(DrbId),
    #[error("Transferred context may only contain sessions to set up")]
    UnexpectedTransferContent,
}

impl InvalidRequest {
    pub fn cause(&self) -> Cause {
        match self {
            InvalidRequest::DuplicatePduSession(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::MultiplePduSessionIdInstances)
            }
            InvalidRequest::UnknownPduSession(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::UnknownPduSessionId)
            }
            InvalidRequest::DuplicateQosFlow(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::MultipleQosFlowIdInstances)
            }
            InvalidRequest::UnknownQosFlow(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::UnknownQosFlowId)
            }
            InvalidRequest::UnsupportedFiveQi(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::NotSupported5qiValue)
            }
            InvalidRequest::TooManyPduSessions
            | InvalidRequest::TooManyDrbs
            | InvalidRequest::TooManyQosFlows(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::RadioResourcesNotAvailable)
            }
            InvalidRequest::Empty
            | InvalidRequest::NoQosFlows(_)
            | InvalidRequest::InvalidQosFlowId(_)
            | InvalidRequest::DuplicateDrb(_)
            | InvalidRequest::MalformedDrb(_)
            | InvalidRequest::UnexpectedTransferContent => {
                Cause::Protocol(CauseProtocol::SemanticError)
            }
        }
    }
}

pub(super) type UpdateResult = Result<UpConfigUpdate, InvalidRequest>;

fn pdcp_config(sn_size: u8, indication: &SecurityIndication) -> PdcpConfig {
    PdcpConfig {
        sn_size,
        integrity_protection: indication.integrity_protection == IndicationLevel::Required,
        ciphering: indication.confidentiality_protection != IndicationLevel::NotNeeded,
    }
}

fn valid_qos_flow_id(id: QosFlowId) -> Result<(), InvalidRequest> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(InvalidRequest::InvalidQosFlowId(id))
    }
}

fn next_free_drb_id(used: &BTreeSet<DrbId>) -> Result<DrbId, InvalidRequest> {
    (DrbId::MIN..=DrbId::MAX)
        .map(DrbId)
        .find(|id| !used.contains(id))
        .ok_or(InvalidRequest::TooManyDrbs)
}

fn new_drb(
    config: &UpResourceConfig,
    used: &mut BTreeSet<DrbId>,
    session: &PduSessionUpdate,
    five_qi: FiveQi,
    default_drb: bool,
) -> Result<DrbContext, InvalidRequest> {
    let qos = config
        .qos
        .get(&five_qi)
        .ok_or(InvalidRequest::UnsupportedFiveQi(five_qi))?;
    let drb_id = next_free_drb_id(used)?;
    used.insert(drb_id);
    Ok(DrbContext {
        drb_id,
        pdu_session_id: session.pdu_session_id,
        snssai: session.snssai,
        default_drb,
        five_qi,
        rlc_mode: qos.rlc_mode,
        pdcp_config: pdcp_config(qos.pdcp_sn_size, &session.security_indication),
        qos_flows: BTreeMap::new(),
        ul_up_tnl_information: vec![],
        dl_up_tnl_information: vec![],
    })
}

fn flow_context(item: &QosFlowSetupRequestItem) -> QosFlowContext {
    QosFlowContext {
        qos_flow_id: item.qos_flow_id,
        qos_params: item.qos_params,
    }
}

fn check_limits(context: &UpContext, config: &UpResourceConfig, update: &UpConfigUpdate) -> Result<(), InvalidRequest> {
    let limits = &config.limits;

    let removed_sessions = update.pdu_sessions_to_remove.len();
    let nof_sessions = (context.pdu_sessions.len() + update.pdu_sessions_to_setup.len())
        .saturating_sub(removed_sessions);
    if nof_sessions > limits.max_nof_pdu_sessions {
        return Err(InvalidRequest::TooManyPduSessions);
    }

    let mut nof_drbs = context.nof_drbs();
    for id in &update.pdu_sessions_to_remove {
        if let Some(session) = context.pdu_sessions.get(id) {
            nof_drbs -= session.drbs.len();
        }
    }
    for session in update
        .pdu_sessions_to_setup
        .values()
        .chain(update.pdu_sessions_to_modify.values())
    {
        nof_drbs += session.drbs_to_add.len();
        nof_drbs -= session.drbs_to_remove.len();
        for drb in session.drbs_to_add.values().chain(session.drbs_to_modify.values()) {
            if drb.qos_flows.len() > limits.max_nof_qos_flows_per_drb {
                return Err(InvalidRequest::TooManyQosFlows(drb.drb_id));
            }
        }
    }
    if nof_drbs > limits.max_nof_drbs {
        return Err(InvalidRequest::TooManyDrbs);
    }
    Ok(())
}

pub(super) fn setup(
    context: &UpContext,
    config: &UpResourceConfig,
    request: &PduSessionResourceSetupRequest,
) -> UpdateResult {
    if request.pdu_sessions.is_empty() {
        return Err(InvalidRequest::Empty);
    }
    let mut update = UpConfigUpdate {
        initial_context_creation: context.pdu_sessions.is_empty(),
        ..Default::default()
    };
    let mut used_drbs = context.used_drb_ids();
    let mut used_flows: BTreeSet<QosFlowId> = context.qos_flow_map.keys().copied().collect();

    for item in &request.pdu_sessions {
        let id = item.pdu_session_id;
        if context.pdu_sessions.contains_key(&id) || update.pdu_sessions_to_setup.contains_key(&id)
        {
            return Err(InvalidRequest::DuplicatePduSession(id));
        }
        let session = setup_session(config, item, &mut used_drbs, &mut used_flows)?;
        update.pdu_sessions_to_setup.insert(id, session);
    }

    check_limits(context, config, &update)?;
    Ok(update)
}

fn setup_session(
    config: &UpResourceConfig,
    item: &PduSessionResourceSetupItem,
    used_drbs: &mut BTreeSet<DrbId>,
    used_flows: &mut BTreeSet<QosFlowId>,
) -> Result<PduSessionUpdate, InvalidRequest> {
    if item.qos_flows.is_empty() {
        return Err(InvalidRequest::NoQosFlows(item.pdu_session_id));
    }
    let mut session = PduSessionUpdate {
        pdu_session_id: item.pdu_session_id,
        snssai: item.snssai,
        pdu_session_type: item.pdu_session_type,
        security_indication: item
            .security_indication
            .unwrap_or(config.default_security_indication),
        ul_ngu_tunnel: item.ul_ngu_tunnel.clone(),
        dl_ngu_tunnel: None,
        security_result: None,
        drbs_to_add: BTreeMap::new(),
        drbs_to_modify: BTreeMap::new(),
        drbs_to_remove: vec![],
    };

    // One DRB per distinct 5QI.  The first DRB of the session is its default DRB.
    for flow in &item.qos_flows {
        valid_qos_flow_id(flow.qos_flow_id)?;
        if !used_flows.insert(flow.qos_flow_id) {
            return Err(InvalidRequest::DuplicateQosFlow(flow.qos_flow_id));
        }
        let five_qi = flow.qos_params.five_qi;
        let existing = session
            .drbs_to_add
            .values()
            .find(|drb| drb.five_qi == five_qi)
            .map(|drb| drb.drb_id);
        let drb_id = match existing {
            Some(drb_id) => drb_id,
            None => {
                let default_drb = session.drbs_to_add.is_empty();
                let drb = new_drb(config, used_drbs, &session, five_qi, default_drb)?;
                let drb_id = drb.drb_id;
                session.drbs_to_add.insert(drb_id, drb);
                drb_id
            }
        };
        if let Some(drb) = session.drbs_to_add.get_mut(&drb_id) {
            drb.qos_flows.insert(flow.qos_flow_id, flow_context(flow));
        }
    }
    Ok(session)
}

pub(super) fn modify(
    context: &UpContext,
    config: &UpResourceConfig,
    request: &PduSessionResourceModifyRequest,
) -> UpdateResult {
    if request.pdu_sessions.is_empty() {
        return Err(InvalidRequest::Empty);
    }
    let mut update = UpConfigUpdate::default();
    let mut used_drbs = context.used_drb_ids();

    for item in &request.pdu_sessions {
        let id = item.pdu_session_id;
        let Some(existing) = context.pdu_sessions.get(&id) else {
            return Err(InvalidRequest::UnknownPduSession(id));
        };
        if update.pdu_sessions_to_modify.contains_key(&id) {
            return Err(InvalidRequest::DuplicatePduSession(id));
        }
        let session = modify_session(context, config, existing, item, &mut used_drbs)?;
        update.pdu_sessions_to_modify.insert(id, session);
    }

    check_limits(context, config, &update)?;
    Ok(update)
}

fn modify_session(
    context: &UpContext,
    config: &UpResourceConfig,
    existing: &PduSessionContext,
    item: &PduSessionResourceModifyItem,
    used_drbs: &mut BTreeSet<DrbId>,
) -> Result<PduSessionUpdate, InvalidRequest> {
    let mut session = PduSessionUpdate::from_context(existing);
    let mut drbs = existing.drbs.clone();
    let mut touched = BTreeSet::new();
    let mut added = BTreeSet::new();
    let mut seen_flows = BTreeSet::new();

    let owning_drb = |flow_id: &QosFlowId| -> Option<DrbId> {
        context
            .qos_flow_map
            .get(flow_id)
            .copied()
            .filter(|drb_id| existing.drbs.contains_key(drb_id))
    };

    for flow_id in &item.qos_flows_to_release {
        valid_qos_flow_id(*flow_id)?;
        if !seen_flows.insert(*flow_id) {
            return Err(InvalidRequest::DuplicateQosFlow(*flow_id));
        }
        let drb_id = owning_drb(flow_id).ok_or(InvalidRequest::UnknownQosFlow(*flow_id))?;
        if let Some(drb) = drbs.get_mut(&drb_id) {
            drb.qos_flows.remove(flow_id);
        }
        touched.insert(drb_id);
    }

    for flow in &item.qos_flows_to_add_or_modify {
        let flow_id = flow.qos_flow_id;
        valid_qos_flow_id(flow_id)?;
        if !seen_flows.insert(flow_id) {
            return Err(InvalidRequest::DuplicateQosFlow(flow_id));
        }
        if !config.qos.contains_key(&flow.qos_params.five_qi) {
            return Err(InvalidRequest::UnsupportedFiveQi(flow.qos_params.five_qi));
        }
        match owning_drb(&flow_id) {
            Some(drb_id) => {
                touched.insert(drb_id);
                if let Some(drb) = drbs.get_mut(&drb_id) {
                    if drb.five_qi == flow.qos_params.five_qi {
                        drb.qos_flows.insert(flow_id, flow_context(flow));
                        continue;
                    }
                    // 5QI changed, so the flow moves to another DRB.
                    drb.qos_flows.remove(&flow_id);
                }
            }
            None if context.qos_flow_map.contains_key(&flow_id) => {
                // Mapped in some other PDU session.
                return Err(InvalidRequest::DuplicateQosFlow(flow_id));
            }
            None => (),
        }

        let five_qi = flow.qos_params.five_qi;
        let target = drbs
            .values()
            .find(|drb| drb.five_qi == five_qi && !drb.qos_flows.is_empty())
            .map(|drb| drb.drb_id);
        let drb_id = match target {
            Some(drb_id) => drb_id,
            None => {
                let drb = new_drb(config, used_drbs, &session, five_qi, false)?;
                let drb_id = drb.drb_id;
                added.insert(drb_id);
                drbs.insert(drb_id, drb);
                drb_id
            }
        };
        touched.insert(drb_id);
        if let Some(drb) = drbs.get_mut(&drb_id) {
            drb.qos_flows.insert(flow_id, flow_context(flow));
        }
    }

    for drb_id in touched {
        let Some(drb) = drbs.remove(&drb_id) else {
            continue;
        };
        if added.contains(&drb_id) {
            if !drb.qos_flows.is_empty() {
                session.drbs_to_add.insert(drb_id, drb);
            }
        } else if drb.qos_flows.is_empty() {
            session.drbs_to_remove.push(drb_id);
        } else {
            session.drbs_to_modify.insert(drb_id, drb);
        }
    }
    Ok(session)
}

pub(super) fn release(
    context: &UpContext,
    request: &PduSessionResourceReleaseCommand,
) -> UpdateResult {
    if request.pdu_sessions_to_release.is_empty() {
        return Err(InvalidRequest::Empty);
    }
    let mut update = UpConfigUpdate::default();
    for id in &request.pdu_sessions_to_release {
        if !context.pdu_sessions.contains_key(id) {
            return Err(InvalidRequest::UnknownPduSession(*id));
        }
        if update.pdu_sessions_to_remove.contains(id) {
            return Err(InvalidRequest::DuplicatePduSession(*id));
        }
        update.pdu_sessions_to_remove.push(*id);
    }
    Ok(update)
}

/// A transferred context brings its own DRB ids, so all that can be done is to check it.
pub(super) fn transfer(
    context: &UpContext,
    config: &UpResourceConfig,
    transferred: &UpConfigUpdate,
) -> UpdateResult {
    if !transferred.pdu_sessions_to_modify.is_empty()
        || !transferred.pdu_sessions_to_remove.is_empty()
    {
        return Err(InvalidRequest::UnexpectedTransferContent);
    }
    if transferred.pdu_sessions_to_setup.is_empty() {
        return Err(InvalidRequest::Empty);
    }
    let mut used_drbs = context.used_drb_ids();
    let mut used_flows: BTreeSet<QosFlowId> = context.qos_flow_map.keys().copied().collect();

    for (id, session) in &transferred.pdu_sessions_to_setup {
        if session.pdu_session_id != *id || context.pdu_sessions.contains_key(id) {
            return Err(InvalidRequest::DuplicatePduSession(*id));
        }
        if session.drbs_to_add.is_empty() {
            return Err(InvalidRequest::NoQosFlows(*id));
        }
        for (drb_id, drb) in &session.drbs_to_add {
            if drb.drb_id != *drb_id
                || drb.pdu_session_id != *id
                || !(DrbId::MIN..=DrbId::MAX).contains(&drb_id.0)
                || drb.qos_flows.is_empty()
            {
                return Err(InvalidRequest::MalformedDrb(*drb_id));
            }
            if !used_drbs.insert(*drb_id) {
                return Err(InvalidRequest::DuplicateDrb(*drb_id));
            }
            for flow_id in drb.qos_flows.keys() {
                if !used_flows.insert(*flow_id) {
                    return Err(InvalidRequest::DuplicateQosFlow(*flow_id));
                }
            }
        }
    }

    let mut update = transferred.clone();
    update.initial_context_creation = context.pdu_sessions.is_empty();
    check_limits(context, config, &update)?;
    Ok(update)
}
