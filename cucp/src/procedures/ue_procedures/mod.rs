mod bearer_responses;
mod handover;
mod initial_context_setup;
mod inter_cu_handover_target;
mod pdu_session_modify;
mod pdu_session_release;
mod pdu_session_setup;
mod reestablishment;
mod ue_context_release;
mod ue_context_release_request;
mod ue_removal;

pub use handover::{HandoverProcedure, HandoverResponse};
pub use initial_context_setup::InitialContextSetupProcedure;
pub use inter_cu_handover_target::InterCuHandoverTargetProcedure;
pub use pdu_session_modify::PduSessionModifyProcedure;
pub use pdu_session_release::PduSessionReleaseProcedure;
pub use pdu_session_setup::PduSessionSetupProcedure;
pub use reestablishment::{ReestablishmentProcedure, ReestablishmentSourceProcedure};
pub use ue_context_release::UeContextReleaseProcedure;
pub use ue_context_release_request::UeContextReleaseRequestProcedure;
pub use ue_removal::UeRemovalProcedure;

use super::{HandlerApi, Procedure, ProcedureError};
use crate::data::{CuUpIndex, UeContext, UeIndex, UeNotifiers};
use crate::protocols::e1ap::E1apNotifier;
use slog::Logger;
use std::sync::Arc;

/// A procedure acting on one UE.  The UE context itself stays in the UE manager and is only
/// touched between await points.
pub struct UeProcedure<'a, A: HandlerApi> {
    base: Procedure<'a, A>,
    pub ue_index: UeIndex,
    pub notifiers: UeNotifiers,
}

impl<'a, A: HandlerApi> std::ops::Deref for UeProcedure<'a, A> {
    type Target = Procedure<'a, A>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a, A: HandlerApi> UeProcedure<'a, A> {
    pub fn new(api: &'a A, ue_index: UeIndex, logger: &'a Logger) -> Result<Self, ProcedureError> {
        let notifiers = api
            .ue_manager()
            .with_ue(ue_index, |ue| ue.notifiers.clone())
            .ok_or(ProcedureError::UeNotFound(ue_index))?;
        Ok(UeProcedure {
            base: Procedure::new(api, logger),
            ue_index,
            notifiers,
        })
    }

    pub fn with_ue<R>(&self, f: impl FnOnce(&UeContext) -> R) -> Result<R, ProcedureError> {
        self.ue_manager()
            .with_ue(self.ue_index, f)
            .ok_or(ProcedureError::UeNotFound(self.ue_index))
    }

    pub fn with_ue_mut<R>(&self, f: impl FnOnce(&mut UeContext) -> R) -> Result<R, ProcedureError> {
        self.ue_manager()
            .with_ue_mut(self.ue_index, f)
            .ok_or(ProcedureError::UeNotFound(self.ue_index))
    }

    pub fn e1ap(&self) -> Option<Arc<dyn E1apNotifier>> {
        self.notifiers.e1ap.clone()
    }

    /// Bind the UE to a CU-UP.
    pub fn set_cu_up(
        &mut self,
        cu_up_index: CuUpIndex,
        e1ap: Arc<dyn E1apNotifier>,
    ) -> Result<(), ProcedureError> {
        self.notifiers.e1ap = Some(e1ap.clone());
        self.with_ue_mut(|ue| {
            ue.cu_up_index = Some(cu_up_index);
            ue.notifiers.e1ap = Some(e1ap);
        })
    }

    /// The UE no longer has a bearer context at any CU-UP.
    pub fn clear_cu_up(&mut self) {
        self.notifiers.e1ap = None;
        let _ = self.with_ue_mut(|ue| {
            ue.cu_up_index = None;
            ue.notifiers.e1ap = None;
        });
    }
}
