//! bearer_responses - folding E1AP and F1AP responses into a pending UP config update
//!
//! A session that a collaborator explicitly fails is dropped from the update and reported as
//! failed.  A failed DRB inside an E1AP response fails the whole step, as does any response item
//! that doesn't belong to the update.

use crate::data::SecurityResult;
use crate::procedures::ProcedureError;
use crate::protocols::{e1ap, f1ap};
use crate::up_resource_manager::{PduSessionUpdate, UpConfigUpdate};
use std::collections::BTreeMap;
use xxap::{Cause, CauseRadioNetwork, DrbId, GtpTunnel, PduSessionFailedItem, PduSessionId};

fn unknown_session(id: PduSessionId) -> ProcedureError {
    ProcedureError::ConsistencyViolation(format!("response names unexpected PDU session {id:?}"))
}

fn unknown_drb(id: DrbId) -> ProcedureError {
    ProcedureError::ConsistencyViolation(format!("response names unexpected DRB {id:?}"))
}

fn set_ul_tunnels(
    session: &mut PduSessionUpdate,
    drb_id: DrbId,
    tunnels: Vec<GtpTunnel>,
) -> Result<(), ProcedureError> {
    let drb = session.drb_mut(drb_id).ok_or_else(|| unknown_drb(drb_id))?;
    drb.ul_up_tnl_information = tunnels;
    Ok(())
}

fn fail_session(
    update: &mut UpConfigUpdate,
    item: PduSessionFailedItem,
    failed: &mut Vec<PduSessionFailedItem>,
) -> Result<(), ProcedureError> {
    if !update.remove_session(item.pdu_session_id) {
        return Err(unknown_session(item.pdu_session_id));
    }
    failed.push(item);
    Ok(())
}

fn process_session_setup_item(
    update: &mut UpConfigUpdate,
    item: e1ap::PduSessionSetupItem,
) -> Result<(), ProcedureError> {
    let session = update
        .pdu_sessions_to_setup
        .get_mut(&item.pdu_session_id)
        .ok_or_else(|| unknown_session(item.pdu_session_id))?;
    if !item.drbs_failed.is_empty() {
        return Err(ProcedureError::failure(
            "CU-UP DRB setup",
            Some(Cause::RadioNetwork(CauseRadioNetwork::Unspecified)),
        ));
    }
    session.dl_ngu_tunnel = Some(item.dl_ngu_tunnel);
    session.security_result = Some(SecurityResult::resolve(
        &session.security_indication,
        item.security_result,
    ));
    for drb in item.drbs_setup {
        set_ul_tunnels(session, drb.drb_id, drb.ul_up_tnl_information)?;
    }
    Ok(())
}

pub fn process_e1_setup_response(
    update: &mut UpConfigUpdate,
    rsp: e1ap::BearerContextSetupResponse,
    failed: &mut Vec<PduSessionFailedItem>,
) -> Result<(), ProcedureError> {
    if !rsp.success {
        return Err(ProcedureError::failure("E1 Bearer Context Setup", rsp.cause));
    }
    for item in rsp.pdu_sessions_setup {
        process_session_setup_item(update, item)?;
    }
    for item in rsp.pdu_sessions_failed {
        fail_session(update, item, failed)?;
    }
    check_all_sessions_set_up(update)
}

pub fn process_e1_modification_response(
    update: &mut UpConfigUpdate,
    rsp: e1ap::BearerContextModificationResponse,
    failed: &mut Vec<PduSessionFailedItem>,
) -> Result<(), ProcedureError> {
    if !rsp.success {
        return Err(ProcedureError::failure(
            "E1 Bearer Context Modification",
            rsp.cause,
        ));
    }
    for item in rsp.pdu_sessions_setup {
        process_session_setup_item(update, item)?;
    }
    for item in rsp.pdu_sessions_modified {
        let session = update
            .session_mut(item.pdu_session_id)
            .ok_or_else(|| unknown_session(item.pdu_session_id))?;
        if !item.drbs_failed.is_empty() {
            return Err(ProcedureError::failure(
                "CU-UP DRB modification",
                Some(Cause::RadioNetwork(CauseRadioNetwork::Unspecified)),
            ));
        }
        if item.dl_ngu_tunnel.is_some() {
            session.dl_ngu_tunnel = item.dl_ngu_tunnel;
        }
        for drb in item.drbs_setup {
            set_ul_tunnels(session, drb.drb_id, drb.ul_up_tnl_information)?;
        }
        for drb in item.drbs_modified {
            if !drb.ul_up_tnl_information.is_empty() {
                set_ul_tunnels(session, drb.drb_id, drb.ul_up_tnl_information)?;
            }
        }
    }
    for item in rsp
        .pdu_sessions_failed_to_setup
        .into_iter()
        .chain(rsp.pdu_sessions_failed_to_modify)
    {
        fail_session(update, item, failed)?;
    }
    check_all_sessions_set_up(update)
}

// Every session being set up must by now have been either set up or failed by the CU-UP.
fn check_all_sessions_set_up(update: &UpConfigUpdate) -> Result<(), ProcedureError> {
    match update
        .pdu_sessions_to_setup
        .values()
        .find(|s| s.dl_ngu_tunnel.is_none())
    {
        Some(s) => Err(ProcedureError::ConsistencyViolation(format!(
            "CU-UP did not answer for PDU session {:?}",
            s.pdu_session_id
        ))),
        None => Ok(()),
    }
}

/// Returns the cell group config to pass on to the UE.
pub fn process_f1_modification_response(
    update: &mut UpConfigUpdate,
    rsp: f1ap::UeContextModificationResponse,
    failed: &mut Vec<PduSessionFailedItem>,
) -> Result<Option<Vec<u8>>, ProcedureError> {
    if !rsp.success {
        return Err(ProcedureError::failure(
            "F1 UE Context Modification",
            rsp.cause,
        ));
    }
    if !rsp.srbs_failed_to_setup.is_empty() {
        return Err(ProcedureError::failure(
            "DU SRB setup",
            Some(Cause::RadioNetwork(
                CauseRadioNetwork::RadioResourcesNotAvailable,
            )),
        ));
    }
    let owners: BTreeMap<DrbId, PduSessionId> = update
        .pdu_sessions_to_setup
        .values()
        .chain(update.pdu_sessions_to_modify.values())
        .flat_map(|s| {
            s.drbs_to_add
                .keys()
                .chain(s.drbs_to_modify.keys())
                .map(|drb_id| (*drb_id, s.pdu_session_id))
        })
        .collect();

    for item in rsp.drbs_setup.into_iter().chain(rsp.drbs_modified) {
        let session_id = owners
            .get(&item.drb_id)
            .ok_or_else(|| unknown_drb(item.drb_id))?;
        if let Some(drb) = update
            .session_mut(*session_id)
            .and_then(|s| s.drb_mut(item.drb_id))
        {
            drb.dl_up_tnl_information = item.dl_up_tnl_information;
        }
    }
    for drb_id in rsp
        .drbs_failed_to_setup
        .into_iter()
        .chain(rsp.drbs_failed_to_modify)
    {
        let session_id = *owners.get(&drb_id).ok_or_else(|| unknown_drb(drb_id))?;
        // Several DRBs of one session may fail.  The session is only reported once.
        if update.remove_session(session_id) {
            failed.push(PduSessionFailedItem {
                pdu_session_id: session_id,
                cause: Cause::RadioNetwork(CauseRadioNetwork::RadioResourcesNotAvailable),
            });
        }
    }
    Ok(rsp.du_to_cu_rrc_information.map(|x| x.cell_group_config))
}

/// Mark every session of a request that has not already been reported as failed.
pub fn fail_remaining(
    requested: impl IntoIterator<Item = PduSessionId>,
    cause: Cause,
    failed: &mut Vec<PduSessionFailedItem>,
) {
    for pdu_session_id in requested {
        if !failed.iter().any(|f| f.pdu_session_id == pdu_session_id) {
            failed.push(PduSessionFailedItem {
                pdu_session_id,
                cause,
            });
        }
    }
}
