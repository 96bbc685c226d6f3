//! build - construction of collaborator messages from UP resource manager state

use super::{e1ap, f1ap, rrc};
use crate::data::UeIndex;
use crate::up_resource_manager::{DrbContext, PduSessionUpdate, UpConfigUpdate};
use xxap::{DrbId, SrbId};

pub fn e1_qos_flows(drb: &DrbContext) -> Vec<e1ap::QosFlowItem> {
    drb.qos_flows
        .values()
        .map(|flow| e1ap::QosFlowItem {
            qos_flow_id: flow.qos_flow_id,
            qos_params: flow.qos_params,
        })
        .collect()
}

pub fn e1_drb_to_setup(drb: &DrbContext) -> e1ap::DrbToSetupItem {
    e1ap::DrbToSetupItem {
        drb_id: drb.drb_id,
        pdcp_config: drb.pdcp_config,
        qos_flows: e1_qos_flows(drb),
    }
}

pub fn e1_pdu_session_to_setup(session: &PduSessionUpdate) -> e1ap::PduSessionToSetupItem {
    e1ap::PduSessionToSetupItem {
        pdu_session_id: session.pdu_session_id,
        snssai: session.snssai,
        pdu_session_type: session.pdu_session_type,
        security_indication: session.security_indication,
        ul_ngu_tunnel: session.ul_ngu_tunnel.clone(),
        drbs_to_setup: session.drbs_to_add.values().map(e1_drb_to_setup).collect(),
    }
}

/// Changes to an existing session at the CU-UP: new DRBs, new flow mappings on existing DRBs,
/// and removed DRBs.
pub fn e1_pdu_session_to_modify(session: &PduSessionUpdate) -> e1ap::PduSessionToModifyItem {
    e1ap::PduSessionToModifyItem {
        pdu_session_id: session.pdu_session_id,
        drbs_to_setup: session.drbs_to_add.values().map(e1_drb_to_setup).collect(),
        drbs_to_modify: session
            .drbs_to_modify
            .values()
            .map(|drb| e1ap::DrbToModifyItem {
                drb_id: drb.drb_id,
                dl_up_tnl_information: vec![],
                pdcp_reestablish: false,
                flow_mapping_information: Some(e1_qos_flows(drb)),
            })
            .collect(),
        drbs_to_remove: session.drbs_to_remove.clone(),
    }
}

/// Tell the CU-UP where the DU's F1-U endpoints are for DRBs that the DU has just set up.
pub fn e1_dl_tunnel_update(
    ue_index: UeIndex,
    update: &UpConfigUpdate,
) -> e1ap::BearerContextModificationRequest {
    let mut request = e1ap::BearerContextModificationRequest::new(ue_index);
    for session in update
        .pdu_sessions_to_setup
        .values()
        .chain(update.pdu_sessions_to_modify.values())
    {
        let drbs_to_modify: Vec<_> = session
            .drbs_to_add
            .values()
            .filter(|drb| !drb.dl_up_tnl_information.is_empty())
            .map(|drb| e1ap::DrbToModifyItem {
                drb_id: drb.drb_id,
                dl_up_tnl_information: drb.dl_up_tnl_information.clone(),
                pdcp_reestablish: false,
                flow_mapping_information: None,
            })
            .collect();
        if !drbs_to_modify.is_empty() {
            request
                .pdu_sessions_to_modify
                .push(e1ap::PduSessionToModifyItem {
                    pdu_session_id: session.pdu_session_id,
                    drbs_to_setup: vec![],
                    drbs_to_modify,
                    drbs_to_remove: vec![],
                });
        }
    }
    request
}

pub fn f1_drb_to_setup(drb: &DrbContext) -> f1ap::DrbToSetupItem {
    f1ap::DrbToSetupItem {
        drb_id: drb.drb_id,
        pdu_session_id: drb.pdu_session_id,
        five_qi: drb.five_qi,
        qos_flows: drb.qos_flows.keys().copied().collect(),
        rlc_mode: drb.rlc_mode,
        pdcp_sn_size: drb.pdcp_config.sn_size,
        ul_up_tnl_information: drb.ul_up_tnl_information.clone(),
    }
}

pub fn f1_ue_context_modification(
    ue_index: UeIndex,
    update: &UpConfigUpdate,
    drbs_to_release: Vec<DrbId>,
    add_srb2: bool,
) -> f1ap::UeContextModificationRequest {
    let mut request = f1ap::UeContextModificationRequest::new(ue_index);
    if add_srb2 {
        request.srbs_to_setup.push(SrbId::SRB2);
    }
    request.drbs_to_setup = update.drbs_to_add().map(f1_drb_to_setup).collect();
    request.drbs_to_release = drbs_to_release;
    request
}

pub fn rrc_drb_to_add(drb: &DrbContext, reestablish_pdcp: bool) -> rrc::RrcDrbToAdd {
    rrc::RrcDrbToAdd {
        drb_id: drb.drb_id,
        pdu_session_id: drb.pdu_session_id,
        pdcp_config: drb.pdcp_config,
        reestablish_pdcp,
    }
}

pub fn rrc_radio_bearer_config(
    update: &UpConfigUpdate,
    drbs_to_release: Vec<DrbId>,
    add_srb2: bool,
) -> rrc::RadioBearerConfig {
    rrc::RadioBearerConfig {
        srbs_to_add: if add_srb2 { vec![SrbId::SRB2] } else { vec![] },
        drbs_to_add: update
            .drbs_to_add()
            .map(|drb| rrc_drb_to_add(drb, false))
            .collect(),
        drbs_to_release,
    }
}
