use super::UeProcedure;
use super::bearer_responses::*;
use crate::HandlerApi;
use crate::data::SecurityContext;
use crate::procedures::ProcedureError;
use crate::protocols::build;
use crate::protocols::e1ap::{BearerContextModificationRequest, BearerContextSetupRequest};
use crate::protocols::ngap::{
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse, PduSessionSetupResponseItem,
};
use crate::protocols::rrc::RrcReconfigurationRequest;
use crate::up_resource_manager::UpConfigUpdate;
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use xxap::{PduSessionFailedItem, SrbId};

#[derive(Deref, DerefMut)]
pub struct PduSessionSetupProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> PduSessionSetupProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        PduSessionSetupProcedure(ue_procedure)
    }

    pub async fn run(
        &mut self,
        r: PduSessionResourceSetupRequest,
    ) -> PduSessionResourceSetupResponse {
        self.log_message(">> Ngap PduSessionResourceSetupRequest");
        let mut failed = vec![];
        let pdu_sessions_setup = match self.setup_sessions(&r, &mut failed).await {
            Ok(setup) => setup,
            Err(e) => {
                warn!(self.logger, "PDU session resource setup failed - {e}");
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
            "PDU session resource setup - {} set up, {} failed",
            pdu_sessions_setup.len(),
            failed.len()
        );
        self.log_message("<< Ngap PduSessionResourceSetupResponse");
        PduSessionResourceSetupResponse {
            ue_index: self.ue_index,
            pdu_sessions_setup,
            pdu_sessions_failed: failed,
        }
    }

    async fn setup_sessions(
        &mut self,
        r: &PduSessionResourceSetupRequest,
        failed: &mut Vec<PduSessionFailedItem>,
    ) -> Result<Vec<PduSessionSetupResponseItem>, ProcedureError> {
        let (mut update, security, add_srb2) = self.with_ue(|ue| {
            ue.up_resources.check_request(r)?;
            Ok::<_, ProcedureError>((
                ue.up_resources.calculate_update(r),
                ue.security.clone(),
                !ue.srbs.contains(&SrbId::SRB2),
            ))
        })??;
        let security = security.ok_or(ProcedureError::NoSecurityContext)?;

        self.perform_e1_bearer_context_setup(&mut update, security, r, failed)
            .await?;
        if update.is_empty() {
            return Ok(vec![]);
        }

        let cell_group_config = self
            .perform_f1_ue_context_modification(&mut update, add_srb2, failed)
            .await?;
        if update.is_empty() {
            return Ok(vec![]);
        }

        self.perform_e1_dl_tunnel_update(&mut update, failed).await?;

        let nas_pdus = r
            .pdu_sessions
            .iter()
            .filter(|s| update.pdu_sessions_to_setup.contains_key(&s.pdu_session_id))
            .filter_map(|s| s.nas_pdu.clone())
            .collect();
        let reconfiguration = RrcReconfigurationRequest {
            radio_bearer_config: Some(build::rrc_radio_bearer_config(&update, vec![], add_srb2)),
            cell_group_config,
            meas_config: None,
            nas_pdus,
        };
        self.perform_rrc_reconfiguration(reconfiguration).await?;

        let response = setup_response_items(&update);
        self.with_ue_mut(|ue| {
            if add_srb2 {
                ue.srbs.insert(SrbId::SRB2);
            }
            ue.up_resources.apply_config_update(&update.into_result());
        })?;
        Ok(response)
    }

    // Set up the sessions at the CU-UP.  This is a Bearer Context Setup for a UE that has no
    // CU-UP yet, and a Bearer Context Modification otherwise.
    async fn perform_e1_bearer_context_setup(
        &mut self,
        update: &mut UpConfigUpdate,
        security: SecurityContext,
        r: &PduSessionResourceSetupRequest,
        failed: &mut Vec<PduSessionFailedItem>,
    ) -> Result<(), ProcedureError> {
        if let Some(e1ap) = self.e1ap() {
            let mut request = BearerContextModificationRequest::new(self.ue_index);
            request.pdu_sessions_to_setup = update
                .pdu_sessions_to_setup
                .values()
                .map(build::e1_pdu_session_to_setup)
                .collect();
            self.log_message("<< E1ap BearerContextModificationRequest");
            let rsp = e1ap.bearer_context_modification(request).await;
            self.log_message(">> E1ap BearerContextModificationResponse");
            return process_e1_modification_response(update, rsp, failed);
        }

        let (cu_up_index, e1ap) = self
            .cu_up_repository()
            .select_cu_up()
            .ok_or(ProcedureError::NoCuUpAvailable)?;
        let request = BearerContextSetupRequest {
            ue_index: self.ue_index,
            security,
            ue_dl_aggregate_maximum_bit_rate: r.ue_aggregate_maximum_bit_rate_dl,
            pdu_sessions_to_setup: update
                .pdu_sessions_to_setup
                .values()
                .map(build::e1_pdu_session_to_setup)
                .collect(),
        };
        self.log_message("<< E1ap BearerContextSetupRequest");
        let rsp = e1ap.bearer_context_setup(request).await;
        self.log_message(">> E1ap BearerContextSetupResponse");
        process_e1_setup_response(update, rsp, failed)?;
        self.set_cu_up(cu_up_index, e1ap)
    }

    async fn perform_f1_ue_context_modification(
        &self,
        update: &mut UpConfigUpdate,
        add_srb2: bool,
        failed: &mut Vec<PduSessionFailedItem>,
    ) -> Result<Option<Vec<u8>>, ProcedureError> {
        let request = build::f1_ue_context_modification(self.ue_index, update, vec![], add_srb2);
        self.log_message("<< F1ap UeContextModificationRequest");
        let rsp = self.notifiers.f1ap.ue_context_modification(request).await;
        self.log_message(">> F1ap UeContextModificationResponse");
        process_f1_modification_response(update, rsp, failed)
    }

    // Now that the DU has allocated its F1-U endpoints, tell the CU-UP about them.
    async fn perform_e1_dl_tunnel_update(
        &self,
        update: &mut UpConfigUpdate,
        failed: &mut Vec<PduSessionFailedItem>,
    ) -> Result<(), ProcedureError> {
        let request = build::e1_dl_tunnel_update(self.ue_index, update);
        if request.pdu_sessions_to_modify.is_empty() {
            return Ok(());
        }
        let e1ap = self.e1ap().ok_or(ProcedureError::NoCuUpAvailable)?;
        self.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        self.log_message(">> E1ap BearerContextModificationResponse");
        process_e1_modification_response(update, rsp, failed)
    }

    async fn perform_rrc_reconfiguration(
        &self,
        reconfiguration: RrcReconfigurationRequest,
    ) -> Result<(), ProcedureError> {
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
        Ok(())
    }
}

fn setup_response_items(update: &UpConfigUpdate) -> Vec<PduSessionSetupResponseItem> {
    update
        .pdu_sessions_to_setup
        .values()
        .filter_map(|session| {
            Some(PduSessionSetupResponseItem {
                pdu_session_id: session.pdu_session_id,
                dl_ngu_tunnel: session.dl_ngu_tunnel.clone()?,
                qos_flows_setup: session.qos_flows(),
                // Only echoed when the AMF left the decision to us.
                security_result: session
                    .security_result
                    .filter(|_| session.security_indication.requests_result()),
            })
        })
        .collect()
}
