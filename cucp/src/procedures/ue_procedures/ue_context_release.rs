use super::{UeProcedure, UeRemovalProcedure};
use crate::HandlerApi;
use crate::protocols::e1ap::BearerContextReleaseCommand;
use crate::protocols::f1ap::UeContextReleaseCommand;
use derive_deref::{Deref, DerefMut};
use slog::{info, warn};
use xxap::{Cause, PduSessionId};

#[derive(Deref, DerefMut)]
pub struct UeContextReleaseProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> UeContextReleaseProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        UeContextReleaseProcedure(ue_procedure)
    }

    /// Release the UE at the CU-UP and the DU, then remove it.  Returns the PDU sessions the
    /// UE had.  `rrc_release` controls whether an RRC Release is sent to the UE, which is not
    /// wanted when the UE has already moved elsewhere.
    pub async fn run(self, cause: Cause, rrc_release: bool) -> Vec<PduSessionId> {
        info!(self.logger, "Release UE context, cause {:?}", cause);
        let pdu_sessions = self
            .with_ue(|ue| ue.up_resources.pdu_session_ids())
            .unwrap_or_default();

        if let Some(e1ap) = self.e1ap() {
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
        }

        let rrc_container = if rrc_release {
            self.notifiers.rrc.rrc_release(self.ue_index)
        } else {
            None
        };
        let command = UeContextReleaseCommand {
            ue_index: self.ue_index,
            cause,
            rrc_container,
        };
        self.log_message("<< F1ap UeContextReleaseCommand");
        if self.notifiers.f1ap.ue_context_release(command).await {
            self.log_message(">> F1ap UeContextReleaseComplete");
        } else {
            warn!(self.logger, "F1 UE Context Release failed");
        }

        UeRemovalProcedure::new(self.0).run().await;
        pdu_sessions
    }
}
