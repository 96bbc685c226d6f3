use super::{PduSessionSetupProcedure, UeProcedure};
use super::bearer_responses::fail_remaining;
use crate::HandlerApi;
use crate::data::SecurityContext;
use crate::procedures::ProcedureError;
use crate::protocols::f1ap::{CuToDuRrcInformation, UeContextSetupRequest};
use crate::protocols::ngap::{
    InitialContextSetupFailure, InitialContextSetupRequest, InitialContextSetupResponse,
    PduSessionResourceSetupRequest,
};
use crate::protocols::rrc::RrcReconfigurationRequest;
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};

#[derive(Deref, DerefMut)]
pub struct InitialContextSetupProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> InitialContextSetupProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        InitialContextSetupProcedure(ue_procedure)
    }

    pub async fn run(
        &mut self,
        r: InitialContextSetupRequest,
    ) -> Result<InitialContextSetupResponse, InitialContextSetupFailure> {
        self.log_message(">> Ngap InitialContextSetupRequest");
        match self.setup_context(&r).await {
            Ok(ue_capability) => {
                let response = self.setup_pdu_sessions(&r).await;
                if let Some(capability) = ue_capability {
                    self.log_message("<< Ngap UeRadioCapabilityInfoIndication");
                    self.ngap()
                        .ue_radio_capability_info_indication(self.ue_index, capability)
                        .await;
                }
                info!(self.logger, "Initial context setup complete");
                self.log_message("<< Ngap InitialContextSetupResponse");
                Ok(response)
            }
            Err(e) => {
                warn!(self.logger, "Initial context setup failed - {e}");
                let mut pdu_sessions_failed = vec![];
                fail_remaining(
                    r.pdu_sessions_to_setup.iter().map(|s| s.pdu_session_id),
                    e.cause(),
                    &mut pdu_sessions_failed,
                );
                self.log_message("<< Ngap InitialContextSetupFailure");
                Err(InitialContextSetupFailure {
                    ue_index: self.ue_index,
                    cause: e.cause(),
                    pdu_sessions_failed,
                })
            }
        }
    }

    // Everything up to and including the capability transfer is all or nothing.  Returns the UE
    // capability if we had to fetch it ourselves.
    async fn setup_context(
        &mut self,
        r: &InitialContextSetupRequest,
    ) -> Result<Option<Vec<u8>>, ProcedureError> {
        let config = self.config();
        let security = SecurityContext::select(
            r.security_key,
            &r.ue_security_capabilities,
            &config.integrity_preference,
            &config.ciphering_preference,
        )
        .ok_or(ProcedureError::NoSecurityContext)?;
        info!(
            self.logger,
            "Selected {:?} {:?}", security.integrity_algorithm, security.ciphering_algorithm
        );
        if !self
            .notifiers
            .rrc
            .init_security_context(self.ue_index, &security)
        {
            return Err(ProcedureError::failure("RRC security initialization", None));
        }
        self.with_ue_mut(|ue| ue.amf_ue_id = Some(r.amf_ue_ngap_id))?;

        let security_mode_command = self.notifiers.rrc.security_mode_command(self.ue_index);
        let pci = self.with_ue(|ue| ue.pci)?;
        let request = UeContextSetupRequest {
            ue_index: self.ue_index,
            sp_cell_pci: pci,
            cu_to_du_rrc_information: CuToDuRrcInformation {
                ue_capability_rat_container_list: r.ue_radio_capability.clone(),
                ..Default::default()
            },
            srbs_to_setup: vec![],
            drbs_to_setup: vec![],
            rrc_container: Some(security_mode_command),
        };
        self.log_message("<< F1ap UeContextSetupRequest (Rrc SecurityModeCommand)");
        let rsp = self.notifiers.f1ap.ue_context_setup(request).await;
        self.log_message(">> F1ap UeContextSetupResponse");
        if !rsp.success {
            return Err(ProcedureError::failure("F1 UE Context Setup", rsp.cause));
        }
        if let Some(id) = rsp.gnb_du_ue_f1ap_id {
            self.with_ue_mut(|ue| ue.du_ue_f1ap_id = Some(id))?;
        }

        if !self
            .notifiers
            .rrc
            .security_mode_complete(self.ue_index)
            .await
        {
            return Err(ProcedureError::failure("RRC Security Mode", None));
        }
        self.log_message(">> Rrc SecurityModeComplete");
        // AS security is only active from here on.
        self.with_ue_mut(|ue| ue.security = Some(security))?;

        if r.ue_radio_capability.is_some() {
            return Ok(None);
        }
        self.log_message("<< Rrc UeCapabilityEnquiry");
        let capability = self
            .notifiers
            .rrc
            .ue_capability_transfer(self.ue_index)
            .await
            .ok_or(ProcedureError::failure("RRC UE Capability Transfer", None))?;
        self.log_message(">> Rrc UeCapabilityInformation");
        Ok(Some(capability))
    }

    async fn setup_pdu_sessions(&mut self, r: &InitialContextSetupRequest) -> InitialContextSetupResponse {
        if r.pdu_sessions_to_setup.is_empty() {
            // Still deliver the NAS PDU, if there is one.
            if let Some(nas_pdu) = &r.nas_pdu {
                let reconfiguration = RrcReconfigurationRequest {
                    nas_pdus: vec![nas_pdu.clone()],
                    ..Default::default()
                };
                self.log_message("<< Rrc RrcReconfiguration");
                if !self
                    .notifiers
                    .rrc
                    .reconfiguration(self.ue_index, reconfiguration)
                    .await
                {
                    warn!(self.logger, "Failed to deliver NAS PDU");
                }
            }
            return InitialContextSetupResponse {
                ue_index: self.ue_index,
                pdu_sessions_setup: vec![],
                pdu_sessions_failed: vec![],
            };
        }

        let request = PduSessionResourceSetupRequest {
            ue_index: self.ue_index,
            pdu_sessions: r.pdu_sessions_to_setup.clone(),
            ue_aggregate_maximum_bit_rate_dl: r.ue_aggregate_maximum_bit_rate_dl,
        };
        let rsp = match UeProcedure::new(self.api, self.ue_index, self.logger) {
            Ok(ue) => PduSessionSetupProcedure::new(ue).run(request).await,
            Err(e) => {
                let mut pdu_sessions_failed = vec![];
                fail_remaining(
                    r.pdu_sessions_to_setup.iter().map(|s| s.pdu_session_id),
                    e.cause(),
                    &mut pdu_sessions_failed,
                );
                return InitialContextSetupResponse {
                    ue_index: self.ue_index,
                    pdu_sessions_setup: vec![],
                    pdu_sessions_failed,
                };
            }
        };
        InitialContextSetupResponse {
            ue_index: self.ue_index,
            pdu_sessions_setup: rsp.pdu_sessions_setup,
            pdu_sessions_failed: rsp.pdu_sessions_failed,
        }
    }
}
