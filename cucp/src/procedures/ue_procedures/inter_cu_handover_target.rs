use super::UeProcedure;
use crate::HandlerApi;
use crate::protocols::ngap::{HandoverRequest, HandoverResourceAllocationResponse};
use derive_deref::{Deref, DerefMut};
use slog::warn;
use xxap::{Cause, CauseMisc, PduSessionFailedItem};

/// Target side of a handover from another CU-CP, which arrives as an NGAP Handover Request.
/// Resource allocation for this case is not supported, so every request is refused with a
/// structured failure listing each requested PDU session.
#[derive(Deref, DerefMut)]
pub struct InterCuHandoverTargetProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> InterCuHandoverTargetProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        InterCuHandoverTargetProcedure(ue_procedure)
    }

    pub async fn run(&mut self, r: HandoverRequest) -> HandoverResourceAllocationResponse {
        self.log_message(">> Ngap HandoverRequest");
        let cause = Cause::Misc(CauseMisc::Unspecified);
        warn!(
            self.logger,
            "Inter CU-CP handover not supported, {} PDU sessions refused",
            r.pdu_sessions.len()
        );
        self.log_message("<< Ngap HandoverFailure");
        HandoverResourceAllocationResponse {
            success: false,
            target_ue_index: None,
            pdu_sessions_admitted: vec![],
            pdu_sessions_failed: r
                .pdu_sessions
                .iter()
                .map(|s| PduSessionFailedItem {
                    pdu_session_id: s.pdu_session_id,
                    cause,
                })
                .collect(),
            cause: Some(cause),
        }
    }
}
