use super::UeProcedure;
use super::bearer_responses::*;
use crate::HandlerApi;
use crate::procedures::ProcedureError;
use crate::protocols::build;
use crate::protocols::e1ap::BearerContextModificationRequest;
use crate::protocols::ngap::{
    PduSessionModifyResponseItem, PduSessionResourceModifyRequest,
    PduSessionResourceModifyResponse,
};
use crate::protocols::rrc::RrcReconfigurationRequest;
use crate::up_resource_manager::UpConfigUpdate;
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use xxap::{DrbId, PduSessionFailedItem};

#[derive(Deref, DerefMut)]
pub struct PduSessionModifyProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> PduSessionModifyProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        PduSessionModifyProcedure(ue_procedure)
    }

    pub async fn run(
        &mut self,
        r: PduSessionResourceModifyRequest,
    ) -> PduSessionResourceModifyResponse {
        self.log_message(">> Ngap PduSessionResourceModifyRequest");
        let mut failed = vec![];
        let pdu_sessions_modified = match self.modify_sessions(&r, &mut failed).await {
            Ok(modified) => modified,
            Err(e) => {
                warn!(self.logger, "PDU session resource modify failed - {e}");
                fail_remaining(
                    r.pdu_sessions.iter().map(|s| s.pdu_session_id),
                    e.cause(),
                    &mut failed,
                );
                vec![]
            }
        };
        info!(
            self.logger,
            "PDU session resource modify - {} modified, {} failed",
            pdu_sessions_modified.len(),
            failed.len()
        );
        self.log_message("<< Ngap PduSessionResourceModifyResponse");
        PduSessionResourceModifyResponse {
            ue_index: self.ue_index,
            pdu_sessions_modified,
            pdu_sessions_failed: failed,
        }
    }

    async fn modify_sessions(
        &mut self,
        r: &PduSessionResourceModifyRequest,
        failed: &mut Vec<PduSessionFailedItem>,
    ) -> Result<Vec<PduSessionModifyResponseItem>, ProcedureError> {
        let mut update = self.with_ue(|ue| {
            ue.up_resources.check_request(r)?;
            Ok::<_, ProcedureError>(ue.up_resources.calculate_update(r))
        })??;
        let e1ap = self.e1ap().ok_or(ProcedureError::NoCuUpAvailable)?;

        // CU-UP first.
        let mut request = BearerContextModificationRequest::new(self.ue_index);
        request.pdu_sessions_to_modify = update
            .pdu_sessions_to_modify
            .values()
            .map(build::e1_pdu_session_to_modify)
            .collect();
        self.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        self.log_message(">> E1ap BearerContextModificationResponse");
        process_e1_modification_response(&mut update, rsp, failed)?;
        if update.is_empty() {
            return Ok(vec![]);
        }

        // Then the DU.
        let drbs_to_release = removed_drbs(&update);
        let mut cell_group_config = None;
        let radio_changes = update.drbs_to_add().next().is_some() || !drbs_to_release.is_empty();
        if radio_changes {
            let request = build::f1_ue_context_modification(
                self.ue_index,
                &update,
                drbs_to_release,
                false,
            );
            self.log_message("<< F1ap UeContextModificationRequest");
            let rsp = self.notifiers.f1ap.ue_context_modification(request).await;
            self.log_message(">> F1ap UeContextModificationResponse");
            cell_group_config = process_f1_modification_response(&mut update, rsp, failed)?;
            if update.is_empty() {
                return Ok(vec![]);
            }

            let request = build::e1_dl_tunnel_update(self.ue_index, &update);
            if !request.pdu_sessions_to_modify.is_empty() {
                self.log_message("<< E1ap BearerContextModificationRequest");
                let rsp = e1ap.bearer_context_modification(request).await;
                self.log_message(">> E1ap BearerContextModificationResponse");
                process_e1_modification_response(&mut update, rsp, failed)?;
            }
        }

        // Finally the UE.
        let nas_pdus = r
            .pdu_sessions
            .iter()
            .filter(|s| update.pdu_sessions_to_modify.contains_key(&s.pdu_session_id))
            .filter_map(|s| s.nas_pdu.clone())
            .collect();
        let reconfiguration = RrcReconfigurationRequest {
            radio_bearer_config: radio_changes.then(|| {
                build::rrc_radio_bearer_config(&update, removed_drbs(&update), false)
            }),
            cell_group_config,
            meas_config: None,
            nas_pdus,
        };
        self.log_message("<< Rrc RrcReconfiguration");
        if !self
            .notifiers
            .rrc
            .reconfiguration(self.ue_index, reconfiguration)
            .await
        {
            return Err(ProcedureError::failure("RRC Reconfiguration", None));
        }
        self.log_message(">> Rrc RrcReconfigurationComplete");

        let response = r
            .pdu_sessions
            .iter()
            .filter(|s| update.pdu_sessions_to_modify.contains_key(&s.pdu_session_id))
            .map(|s| PduSessionModifyResponseItem {
                pdu_session_id: s.pdu_session_id,
                qos_flows_added_or_modified: s
                    .qos_flows_to_add_or_modify
                    .iter()
                    .map(|f| f.qos_flow_id)
                    .collect(),
                qos_flows_released: s.qos_flows_to_release.clone(),
            })
            .collect();
        self.with_ue_mut(|ue| ue.up_resources.apply_config_update(&update.into_result()))?;
        Ok(response)
    }
}

fn removed_drbs(update: &UpConfigUpdate) -> Vec<DrbId> {
    update
        .pdu_sessions_to_modify
        .values()
        .flat_map(|s| s.drbs_to_remove.iter().copied())
        .collect()
}
