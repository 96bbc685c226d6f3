//! handover - intra-CU handover of a UE between cells of the same or different DUs
//!
//! The routine runs on the source UE's queue.  Up to the point where the UE completes the RRC
//! Reconfiguration at the target, any failure is undone by removing the target UE, and the
//! source is left as it was.  From then on there is no way back and the routine always ends by
//! releasing the source.

use super::bearer_responses::process_e1_modification_response;
use super::{UeContextReleaseProcedure, UeProcedure, UeRemovalProcedure};
use crate::HandlerApi;
use crate::data::{Pci, UeIndex};
use crate::procedures::ProcedureError;
use crate::protocols::build;
use crate::protocols::e1ap::BearerContextModificationRequest;
use crate::protocols::f1ap::{
    CuToDuRrcInformation, UeContextModificationRequest, UeContextReleaseCommand,
    UeContextSetupRequest, UeContextSetupResponse,
};
use crate::protocols::rrc::{RrcReconfigurationRequest, UeTransferContext};
use crate::up_resource_manager::{UpConfigUpdate, to_config_update};
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use xxap::{Cause, CauseRadioNetwork, SrbId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoverResponse {
    pub success: bool,
    pub target_ue_index: Option<UeIndex>,
    pub cause: Option<Cause>,
}

impl HandoverResponse {
    pub fn failure(cause: Cause) -> Self {
        HandoverResponse {
            success: false,
            target_ue_index: None,
            cause: Some(cause),
        }
    }
}

// What is carried from source to target.
struct HandoverSnapshot {
    transfer: UeTransferContext,
    srbs: Vec<SrbId>,
}

#[derive(Deref, DerefMut)]
pub struct HandoverProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> HandoverProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        HandoverProcedure(ue_procedure)
    }

    pub async fn run(&mut self, target_pci: Pci) -> HandoverResponse {
        info!(self.logger, "Handover to cell {}", target_pci.0);
        if self.with_ue_mut(|ue| ue.ho_in_progress = true).is_err() {
            return HandoverResponse::failure(Cause::RadioNetwork(
                CauseRadioNetwork::UnknownLocalUeId,
            ));
        }

        let target_ue_index = match self.allocate_target(target_pci).await {
            Ok(target_ue_index) => target_ue_index,
            Err(e) => {
                warn!(self.logger, "Handover preparation failed - {e}");
                self.end_handover();
                return HandoverResponse::failure(e.cause());
            }
        };
        let Some(target_logger) = self
            .ue_manager()
            .with_ue(target_ue_index, |ue| ue.logger.clone())
        else {
            self.end_handover();
            return HandoverResponse::failure(Cause::RadioNetwork(
                CauseRadioNetwork::UnknownLocalUeId,
            ));
        };
        let target = match UeProcedure::new(self.api, target_ue_index, &target_logger) {
            Ok(target) => target,
            Err(e) => {
                self.end_handover();
                return HandoverResponse::failure(e.cause());
            }
        };

        let mut dl_redirected = false;
        if let Err(e) = self
            .prepare_and_execute(&target, target_pci, &mut dl_redirected)
            .await
        {
            warn!(self.logger, "Handover to UE {} failed - {e}", target_ue_index);
            if dl_redirected {
                self.restore_source_dl_tunnels().await;
            }
            cancel_target(target).await;
            self.end_handover();
            return HandoverResponse {
                success: false,
                target_ue_index: None,
                cause: Some(e.cause()),
            };
        }

        // The UE is now at the target.
        self.complete(&target).await;
        info!(self.logger, "Handover to UE {} complete", target_ue_index);
        self.release_source().await;
        HandoverResponse {
            success: true,
            target_ue_index: Some(target_ue_index),
            cause: None,
        }
    }

    fn end_handover(&self) {
        let _ = self.with_ue_mut(|ue| ue.ho_in_progress = false);
    }

    async fn allocate_target(&self, target_pci: Pci) -> Result<UeIndex, ProcedureError> {
        let target_du = self.du_repository().find_du_by_pci(target_pci).ok_or(
            ProcedureError::failure(
                "Target cell lookup",
                Some(Cause::RadioNetwork(CauseRadioNetwork::Unspecified)),
            ),
        )?;
        self.add_ue(target_du, target_pci, None, None)
            .await
            .ok_or(ProcedureError::failure(
                "Target UE allocation",
                Some(Cause::RadioNetwork(
                    CauseRadioNetwork::RadioResourcesNotAvailable,
                )),
            ))
    }

    fn snapshot(&self) -> Result<HandoverSnapshot, ProcedureError> {
        let (security, up_ctx, srbs) = self.with_ue(|ue| {
            (
                ue.security.clone(),
                ue.up_resources.context().clone(),
                ue.srbs.iter().copied().collect(),
            )
        })?;
        let security = security.ok_or(ProcedureError::NoSecurityContext)?;
        let rrc = self
            .notifiers
            .rrc
            .ue_context(self.ue_index)
            .ok_or(ProcedureError::failure("RRC UE context", None))?;
        Ok(HandoverSnapshot {
            transfer: UeTransferContext {
                security,
                rrc,
                up_ctx,
            },
            srbs,
        })
    }

    // Everything up to and including the UE's arrival at the target.
    async fn prepare_and_execute(
        &self,
        target: &UeProcedure<'_, A>,
        target_pci: Pci,
        dl_redirected: &mut bool,
    ) -> Result<(), ProcedureError> {
        let HandoverSnapshot { transfer, srbs } = self.snapshot()?;
        let mut update = to_config_update(&transfer.up_ctx);

        // Target DU
        let request = UeContextSetupRequest {
            ue_index: target.ue_index,
            sp_cell_pci: target_pci,
            cu_to_du_rrc_information: CuToDuRrcInformation {
                ue_capability_rat_container_list: transfer.rrc.ue_capability.clone(),
                meas_config: transfer.rrc.meas_config.clone(),
                handover_preparation_information: Some(
                    transfer.rrc.handover_preparation_information.clone(),
                ),
            },
            srbs_to_setup: srbs.clone(),
            drbs_to_setup: update.drbs_to_add().map(build::f1_drb_to_setup).collect(),
            rrc_container: None,
        };
        target.log_message("<< F1ap UeContextSetupRequest");
        let rsp = target.notifiers.f1ap.ue_context_setup(request).await;
        target.log_message(">> F1ap UeContextSetupResponse");
        let cell_group_config = self.process_target_setup_response(target, &mut update, rsp)?;

        // Target UE context
        if !target
            .notifiers
            .rrc
            .apply_transfer_context(target.ue_index, &transfer)
        {
            return Err(ProcedureError::failure("RRC context transfer", None));
        }
        if !update.is_empty() {
            update = target.with_ue(|ue| {
                ue.up_resources.check_request(&update)?;
                Ok::<_, ProcedureError>(ue.up_resources.calculate_update(&update))
            })??;
        }

        // CU-UP, where the bearer context is still keyed by the source UE.
        *dl_redirected = true;
        self.perform_e1_dl_tunnel_update(&mut update).await?;

        let result = update.clone().into_result();
        target.with_ue_mut(|ue| {
            ue.security = Some(transfer.security.clone());
            ue.srbs = srbs.iter().copied().collect();
            ue.up_resources.apply_config_update(&result);
        })?;

        // UE, via the source DU.
        let reconfiguration = RrcReconfigurationRequest {
            radio_bearer_config: Some(build::rrc_radio_bearer_config(&update, vec![], false)),
            cell_group_config,
            meas_config: transfer.rrc.meas_config.clone(),
            nas_pdus: vec![],
        };
        let handover_reconfiguration = target
            .notifiers
            .rrc
            .handover_reconfiguration(target.ue_index, reconfiguration);
        let mut request = UeContextModificationRequest::new(self.ue_index);
        request.rrc_container = Some(handover_reconfiguration.pdu);
        request.transmission_action_stop = true;
        self.log_message("<< F1ap UeContextModificationRequest (Rrc RrcReconfiguration)");
        let rsp = self.notifiers.f1ap.ue_context_modification(request).await;
        self.log_message(">> F1ap UeContextModificationResponse");
        if !rsp.success {
            return Err(ProcedureError::failure(
                "Source F1 UE Context Modification",
                rsp.cause,
            ));
        }

        if !target
            .notifiers
            .rrc
            .handover_reconfiguration_complete(
                target.ue_index,
                handover_reconfiguration.transaction_id,
            )
            .await
        {
            return Err(ProcedureError::failure(
                "RRC Reconfiguration at target",
                Some(Cause::RadioNetwork(
                    CauseRadioNetwork::FailureInRadioInterfaceProcedure,
                )),
            ));
        }
        target.log_message(">> Rrc RrcReconfigurationComplete");
        Ok(())
    }

    // Returns the target's cell group config.
    fn process_target_setup_response(
        &self,
        target: &UeProcedure<'_, A>,
        update: &mut UpConfigUpdate,
        rsp: UeContextSetupResponse,
    ) -> Result<Option<Vec<u8>>, ProcedureError> {
        if !rsp.success {
            return Err(ProcedureError::failure("Target F1 UE Context Setup", rsp.cause));
        }
        // From here the target DU has a context to release if we back out.
        target.with_ue_mut(|ue| ue.du_ue_f1ap_id = rsp.gnb_du_ue_f1ap_id)?;

        if !rsp.srbs_failed_to_setup.is_empty() || !rsp.drbs_failed_to_setup.is_empty() {
            return Err(ProcedureError::failure(
                "Target F1 UE Context Setup",
                Some(Cause::RadioNetwork(
                    CauseRadioNetwork::RadioResourcesNotAvailable,
                )),
            ));
        }
        let c_rnti = rsp
            .c_rnti
            .ok_or(ProcedureError::ConsistencyViolation(
                "target DU did not assign a C-RNTI".to_string(),
            ))?;
        self.ue_manager().set_c_rnti(target.ue_index, c_rnti);

        for drb in rsp.drbs_setup {
            let target_drb = update
                .session_of_drb(drb.drb_id)
                .and_then(|session_id| update.session_mut(session_id))
                .and_then(|session| session.drb_mut(drb.drb_id))
                .ok_or_else(|| {
                    ProcedureError::ConsistencyViolation(format!(
                        "target DU set up unexpected DRB {:?}",
                        drb.drb_id
                    ))
                })?;
            target_drb.dl_up_tnl_information = drb.dl_up_tnl_information;
        }
        Ok(rsp.du_to_cu_rrc_information.map(|x| x.cell_group_config))
    }

    async fn perform_e1_dl_tunnel_update(
        &self,
        update: &mut UpConfigUpdate,
    ) -> Result<(), ProcedureError> {
        let request = build::e1_dl_tunnel_update(self.ue_index, update);
        if request.pdu_sessions_to_modify.is_empty() {
            return Ok(());
        }
        let e1ap = self.e1ap().ok_or(ProcedureError::NoCuUpAvailable)?;
        self.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        self.log_message(">> E1ap BearerContextModificationResponse");
        let mut failed = vec![];
        process_e1_modification_response(update, rsp, &mut failed)?;
        match failed.first() {
            Some(item) => Err(ProcedureError::failure(
                "E1 Bearer Context Modification",
                Some(item.cause),
            )),
            None => Ok(()),
        }
    }

    // The source's UP context still holds its own DL tunnels.
    async fn restore_source_dl_tunnels(&self) {
        let Ok(update) = self.with_ue(|ue| to_config_update(ue.up_resources.context())) else {
            return;
        };
        let request = build::e1_dl_tunnel_update(self.ue_index, &update);
        let Some(e1ap) = self.e1ap() else {
            return;
        };
        if request.pdu_sessions_to_modify.is_empty() {
            return;
        }
        self.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        self.log_message(">> E1ap BearerContextModificationResponse");
        if !rsp.success {
            warn!(
                self.logger,
                "Failed to point the CU-UP back at the source DU, cause {:?}", rsp.cause
            );
        }
    }

    // Past the point of no return.  Move ownership of the AMF and CU-UP contexts across and
    // refresh the CU-UP's security.  Failures are logged and otherwise ignored.
    async fn complete(&mut self, target: &UeProcedure<'_, A>) {
        let _ = self.with_ue_mut(|ue| ue.ho_in_progress = false);
        let Ok((amf_ue_id, cu_up_index, security)) = self.with_ue_mut(|ue| {
            ue.notifiers.e1ap = None;
            (ue.amf_ue_id.take(), ue.cu_up_index.take(), ue.security.clone())
        }) else {
            return;
        };
        let e1ap = self.notifiers.e1ap.take();

        if amf_ue_id.is_some() && !self.ngap().update_ue_index(target.ue_index, self.ue_index) {
            warn!(self.logger, "NGAP did not take over UE {}", target.ue_index);
        }
        if let Some(e1ap) = &e1ap {
            if !e1ap.update_ue_index(target.ue_index, self.ue_index) {
                warn!(self.logger, "E1AP did not take over UE {}", target.ue_index);
            }
        }
        let _ = target.with_ue_mut(|ue| {
            ue.amf_ue_id = amf_ue_id;
            ue.cu_up_index = cu_up_index;
            ue.notifiers.e1ap = e1ap.clone();
        });

        let Some(e1ap) = e1ap else {
            return;
        };
        let mut request = BearerContextModificationRequest::new(target.ue_index);
        request.security = security;
        target.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        target.log_message(">> E1ap BearerContextModificationResponse");
        if !rsp.success {
            warn!(
                target.logger,
                "Final bearer context update after handover failed, cause {:?}", rsp.cause
            );
        }
    }

    async fn release_source(&self) {
        match UeProcedure::new(self.api, self.ue_index, self.logger) {
            Ok(source) => {
                UeContextReleaseProcedure::new(source)
                    .run(
                        Cause::RadioNetwork(CauseRadioNetwork::SuccessfulHandover),
                        false,
                    )
                    .await;
            }
            Err(e) => warn!(self.logger, "Source UE already gone - {e}"),
        }
    }
}

// Undo the target side of an unsuccessful handover.
async fn cancel_target<A: HandlerApi>(target: UeProcedure<'_, A>) {
    let du_has_context = target
        .with_ue(|ue| ue.du_ue_f1ap_id.is_some())
        .unwrap_or(false);
    if du_has_context {
        let command = UeContextReleaseCommand {
            ue_index: target.ue_index,
            cause: Cause::RadioNetwork(CauseRadioNetwork::HandoverCancelled),
            rrc_container: None,
        };
        target.log_message("<< F1ap UeContextReleaseCommand");
        if target.notifiers.f1ap.ue_context_release(command).await {
            target.log_message(">> F1ap UeContextReleaseComplete");
        }
    }
    UeRemovalProcedure::new(target).run().await;
}
