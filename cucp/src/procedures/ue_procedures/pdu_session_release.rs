use super::UeProcedure;
use crate::HandlerApi;
use crate::procedures::ProcedureError;
use crate::protocols::e1ap::{BearerContextModificationRequest, BearerContextReleaseCommand};
use crate::protocols::f1ap::UeContextModificationRequest;
use crate::protocols::ngap::{
    PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse,
};
use crate::protocols::rrc::{RadioBearerConfig, RrcReconfigurationRequest};
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use xxap::{Cause, DrbId, PduSessionId};

#[derive(Deref, DerefMut)]
pub struct PduSessionReleaseProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> PduSessionReleaseProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        PduSessionReleaseProcedure(ue_procedure)
    }

    /// Releasing resources is best effort.  A collaborator that fails is logged and the
    /// remaining steps go ahead.
    pub async fn run(
        &mut self,
        mut r: PduSessionResourceReleaseCommand,
    ) -> PduSessionResourceReleaseResponse {
        self.log_message(">> Ngap PduSessionResourceReleaseCommand");
        let pdu_sessions_released = match self.release_sessions(&mut r).await {
            Ok(released) => released,
            Err(e) => {
                warn!(self.logger, "PDU session resource release failed - {e}");
                vec![]
            }
        };
        info!(
            self.logger,
            "Released PDU sessions {:?}", pdu_sessions_released
        );
        self.log_message("<< Ngap PduSessionResourceReleaseResponse");
        PduSessionResourceReleaseResponse {
            ue_index: self.ue_index,
            pdu_sessions_released,
        }
    }

    async fn release_sessions(
        &mut self,
        r: &mut PduSessionResourceReleaseCommand,
    ) -> Result<Vec<PduSessionId>, ProcedureError> {
        // Sessions we don't know are already as good as released.
        let (update, drbs_to_release, nof_remaining) = self.with_ue(|ue| {
            r.pdu_sessions_to_release
                .retain(|id| ue.up_resources.has_pdu_session(*id));
            r.pdu_sessions_to_release.sort();
            r.pdu_sessions_to_release.dedup();
            let update = ue.up_resources.calculate_update(&*r);
            let drbs = ue.up_resources.drbs_of_sessions(&r.pdu_sessions_to_release);
            let nof_remaining =
                ue.up_resources.nof_pdu_sessions() - update.pdu_sessions_to_remove.len();
            (update, drbs, nof_remaining)
        })?;
        if update.is_empty() {
            return Ok(vec![]);
        }

        self.perform_e1_release(&update.pdu_sessions_to_remove, nof_remaining, r.cause)
            .await;
        self.perform_f1_release(drbs_to_release.clone()).await;

        let reconfiguration = RrcReconfigurationRequest {
            radio_bearer_config: Some(RadioBearerConfig {
                drbs_to_release,
                ..Default::default()
            }),
            nas_pdus: r.nas_pdu.iter().cloned().collect(),
            ..Default::default()
        };
        self.log_message("<< Rrc RrcReconfiguration");
        if self
            .notifiers
            .rrc
            .reconfiguration(self.ue_index, reconfiguration)
            .await
        {
            self.log_message(">> Rrc RrcReconfigurationComplete");
        } else {
            warn!(self.logger, "RRC Reconfiguration for PDU session release failed");
        }

        let released = update.pdu_sessions_to_remove.clone();
        self.with_ue_mut(|ue| ue.up_resources.apply_config_update(&update.into_result()))?;
        Ok(released)
    }

    async fn perform_e1_release(
        &mut self,
        sessions: &[PduSessionId],
        nof_remaining: usize,
        cause: Cause,
    ) {
        let Some(e1ap) = self.e1ap() else {
            warn!(self.logger, "No CU-UP bearer context to release sessions from");
            return;
        };

        if nof_remaining == 0 {
            // Nothing left at the CU-UP, so take down the whole bearer context.
            self.log_message("<< E1ap BearerContextReleaseCommand");
            let command = BearerContextReleaseCommand {
                ue_index: self.ue_index,
                cause,
            };
            if e1ap.bearer_context_release(command).await {
                self.log_message(">> E1ap BearerContextReleaseComplete");
            } else {
                warn!(self.logger, "E1 Bearer Context Release failed");
            }
            self.clear_cu_up();
            return;
        }

        let mut request = BearerContextModificationRequest::new(self.ue_index);
        request.pdu_sessions_to_remove = sessions.to_vec();
        self.log_message("<< E1ap BearerContextModificationRequest");
        let rsp = e1ap.bearer_context_modification(request).await;
        self.log_message(">> E1ap BearerContextModificationResponse");
        if !rsp.success {
            warn!(
                self.logger,
                "E1 Bearer Context Modification failed, cause {:?}", rsp.cause
            );
        }
    }

    async fn perform_f1_release(&self, drbs_to_release: Vec<DrbId>) {
        let mut request = UeContextModificationRequest::new(self.ue_index);
        request.drbs_to_release = drbs_to_release;
        self.log_message("<< F1ap UeContextModificationRequest");
        let rsp = self.notifiers.f1ap.ue_context_modification(request).await;
        self.log_message(">> F1ap UeContextModificationResponse");
        if !rsp.success {
            warn!(
                self.logger,
                "F1 UE Context Modification failed, cause {:?}", rsp.cause
            );
        }
    }
}
