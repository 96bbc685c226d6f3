use super::{UeContextReleaseProcedure, UeProcedure};
use crate::HandlerApi;
use crate::protocols::ngap::UeContextReleaseRequest;
use derive_deref::{Deref, DerefMut};
use slog::info;
use xxap::Cause;

/// The RAN wants rid of the UE.  If the AMF knows the UE, it is asked to release it and will
/// follow up with a UE Context Release Command.  Otherwise the UE is released locally.
#[derive(Deref, DerefMut)]
pub struct UeContextReleaseRequestProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> UeContextReleaseRequestProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        UeContextReleaseRequestProcedure(ue_procedure)
    }

    pub async fn run(self, cause: Cause) {
        let Ok((has_amf_context, pdu_sessions)) = self.with_ue(|ue| {
            (ue.has_amf_context(), ue.up_resources.pdu_session_ids())
        }) else {
            return;
        };

        if has_amf_context {
            self.log_message("<< Ngap UeContextReleaseRequest");
            let request = UeContextReleaseRequest {
                ue_index: self.ue_index,
                pdu_sessions,
                cause,
            };
            if self.ngap().ue_context_release_request(request).await {
                return;
            }
            info!(self.logger, "AMF won't release UE, release locally");
        }

        UeContextReleaseProcedure::new(self.0)
            .run(cause, true)
            .await;
    }
}
