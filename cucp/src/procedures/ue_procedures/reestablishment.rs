//! reestablishment - RRC re-establishment context modification
//!
//! A UE that lost its radio link comes back as a new UE.  The old UE gives up its security, user
//! plane and AMF / CU-UP ownership on its own queue, once whatever it was doing has finished.  The
//! new UE then takes them over and has its bearers re-established at the CU-UP, the DU and the
//! UE.  The old UE is released on its own queue.

use super::bearer_responses::{process_e1_modification_response, process_f1_modification_response};
use super::{UeContextReleaseRequestProcedure, UeProcedure};
use crate::HandlerApi;
use crate::data::{AmfUeNgapId, CuUpIndex, UeIndex};
use crate::procedures::ProcedureError;
use crate::procedures::ue_tasks::schedule_ue_context_release;
use crate::protocols::build;
use crate::protocols::e1ap::{
    BearerContextModificationRequest, DrbToModifyItem, E1apNotifier, PduSessionToModifyItem,
};
use crate::protocols::rrc::{RadioBearerConfig, RrcReconfigurationRequest, UeTransferContext};
use crate::up_resource_manager::{UpConfigUpdate, to_config_update};
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use std::sync::Arc;
use xxap::{Cause, CauseRadioNetwork, PduSessionFailedItem, SrbId};

/// What a re-establishing UE inherits from the UE it replaces.
pub struct ReestablishmentContext {
    old_ue_index: UeIndex,
    transfer: UeTransferContext,
    amf_ue_id: Option<AmfUeNgapId>,
    cu_up_index: Option<CuUpIndex>,
    e1ap: Option<Arc<dyn E1apNotifier>>,
}

/// Runs on the old UE's queue and detaches its context for the new UE.
#[derive(Deref, DerefMut)]
pub struct ReestablishmentSourceProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> ReestablishmentSourceProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        ReestablishmentSourceProcedure(ue_procedure)
    }

    /// None, with the old UE left untouched, unless it has both active security and an AMF
    /// context.  Otherwise the old UE keeps nothing that would make its release touch the AMF or
    /// CU-UP.
    pub fn run(&mut self) -> Option<ReestablishmentContext> {
        let detached = self
            .with_ue_mut(|ue| {
                let security = ue.security.clone()?;
                if !ue.has_amf_context() {
                    return None;
                }
                Some((
                    security,
                    ue.up_resources.context().clone(),
                    ue.amf_ue_id.take(),
                    ue.cu_up_index.take(),
                    ue.notifiers.e1ap.take(),
                ))
            })
            .ok()
            .flatten();
        let Some((security, up_ctx, amf_ue_id, cu_up_index, e1ap)) = detached else {
            info!(self.logger, "Not eligible for re-establishment");
            return None;
        };
        self.notifiers.e1ap = None;
        let rrc = self
            .notifiers
            .rrc
            .ue_context(self.ue_index)
            .unwrap_or_default();
        Some(ReestablishmentContext {
            old_ue_index: self.ue_index,
            transfer: UeTransferContext {
                security,
                rrc,
                up_ctx,
            },
            amf_ue_id,
            cu_up_index,
            e1ap,
        })
    }
}

#[derive(Deref, DerefMut)]
pub struct ReestablishmentProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> ReestablishmentProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        ReestablishmentProcedure(ue_procedure)
    }

    pub async fn run(&mut self, context: ReestablishmentContext) -> bool {
        info!(self.logger, "Re-establishment of UE {}", context.old_ue_index);
        match self.reestablish(context).await {
            Ok(()) => {
                info!(self.logger, "Re-establishment complete");
                true
            }
            Err(e) => {
                warn!(self.logger, "Re-establishment failed - {e}");
                if let Ok(ue) = UeProcedure::new(self.api, self.ue_index, self.logger) {
                    UeContextReleaseRequestProcedure::new(ue)
                        .run(Cause::RadioNetwork(
                            CauseRadioNetwork::FailureInRadioInterfaceProcedure,
                        ))
                        .await;
                }
                false
            }
        }
    }

    async fn reestablish(&mut self, context: ReestablishmentContext) -> Result<(), ProcedureError> {
        // The old UE has nothing left worth keeping, whatever happens to this one.
        schedule_ue_context_release(
            self.api,
            context.old_ue_index,
            Cause::RadioNetwork(CauseRadioNetwork::ReleaseDueToNgranGeneratedReason),
            false,
        );
        self.take_over(context)?;

        let mut update = self.with_ue(|ue| {
            reestablishment_update(to_config_update(ue.up_resources.context()))
        })?;
        let mut failed = vec![];

        if let Some(e1ap) = self.e1ap() {
            if !update.is_empty() {
                let mut request = BearerContextModificationRequest::new(self.ue_index);
                request.new_ul_tnl_information_required = true;
                request.pdu_sessions_to_modify = update
                    .pdu_sessions_to_modify
                    .values()
                    .map(|session| PduSessionToModifyItem {
                        pdu_session_id: session.pdu_session_id,
                        drbs_to_setup: vec![],
                        drbs_to_modify: session
                            .drbs_to_add
                            .values()
                            .map(|drb| DrbToModifyItem {
                                drb_id: drb.drb_id,
                                dl_up_tnl_information: vec![],
                                pdcp_reestablish: true,
                                flow_mapping_information: None,
                            })
                            .collect(),
                        drbs_to_remove: vec![],
                    })
                    .collect();
                self.log_message("<< E1ap BearerContextModificationRequest");
                let rsp = e1ap.bearer_context_modification(request).await;
                self.log_message(">> E1ap BearerContextModificationResponse");
                process_e1_modification_response(&mut update, rsp, &mut failed)?;
                all_succeeded(&failed)?;
            }
        }

        let request = build::f1_ue_context_modification(self.ue_index, &update, vec![], true);
        self.log_message("<< F1ap UeContextModificationRequest");
        let rsp = self.notifiers.f1ap.ue_context_modification(request).await;
        self.log_message(">> F1ap UeContextModificationResponse");
        let cell_group_config = process_f1_modification_response(&mut update, rsp, &mut failed)?;
        all_succeeded(&failed)?;

        let reconfiguration = RrcReconfigurationRequest {
            radio_bearer_config: Some(RadioBearerConfig {
                srbs_to_add: vec![SrbId::SRB2],
                drbs_to_add: update
                    .drbs_to_add()
                    .map(|drb| build::rrc_drb_to_add(drb, true))
                    .collect(),
                drbs_to_release: vec![],
            }),
            cell_group_config,
            meas_config: None,
            nas_pdus: vec![],
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

        if let Some(e1ap) = self.e1ap() {
            let request = build::e1_dl_tunnel_update(self.ue_index, &update);
            if !request.pdu_sessions_to_modify.is_empty() {
                self.log_message("<< E1ap BearerContextModificationRequest");
                let rsp = e1ap.bearer_context_modification(request).await;
                self.log_message(">> E1ap BearerContextModificationResponse");
                process_e1_modification_response(&mut update, rsp, &mut failed)?;
                all_succeeded(&failed)?;
            }
        }

        self.with_ue_mut(|ue| {
            ue.srbs.insert(SrbId::SRB2);
            ue.up_resources.apply_config_update(&update.into_result());
        })
    }

    // Ownership moves first, so that a failure from here on is reported to the AMF by this UE.
    fn take_over(&mut self, context: ReestablishmentContext) -> Result<(), ProcedureError> {
        let ReestablishmentContext {
            old_ue_index,
            transfer,
            amf_ue_id,
            cu_up_index,
            e1ap,
        } = context;

        if amf_ue_id.is_some() && !self.ngap().update_ue_index(self.ue_index, old_ue_index) {
            warn!(self.logger, "NGAP did not take over UE {}", old_ue_index);
        }
        if let Some(e1ap) = &e1ap {
            if !e1ap.update_ue_index(self.ue_index, old_ue_index) {
                warn!(self.logger, "E1AP did not take over UE {}", old_ue_index);
            }
        }
        self.notifiers.e1ap = e1ap.clone();
        self.with_ue_mut(|ue| {
            ue.security = Some(transfer.security.clone());
            ue.amf_ue_id = amf_ue_id;
            ue.cu_up_index = cu_up_index;
            ue.notifiers.e1ap = e1ap;
            ue.up_resources.set_context(transfer.up_ctx.clone());
        })?;

        if !self
            .notifiers
            .rrc
            .apply_transfer_context(self.ue_index, &transfer)
        {
            return Err(ProcedureError::failure("RRC context transfer", None));
        }
        Ok(())
    }
}

// Every DRB of every session is re-created, so the sessions are modified with all their DRBs
// added afresh.
fn reestablishment_update(full: UpConfigUpdate) -> UpConfigUpdate {
    UpConfigUpdate {
        initial_context_creation: false,
        pdu_sessions_to_setup: Default::default(),
        pdu_sessions_to_modify: full.pdu_sessions_to_setup,
        pdu_sessions_to_remove: vec![],
    }
}

fn all_succeeded(failed: &[PduSessionFailedItem]) -> Result<(), ProcedureError> {
    match failed.first() {
        Some(item) => Err(ProcedureError::failure(
            "Re-establishment of PDU session",
            Some(item.cause),
        )),
        None => Ok(()),
    }
}
