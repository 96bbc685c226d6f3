use crate::data::UeIndex;
use crate::up_resource_manager::InvalidRequest;
use thiserror::Error;
use xxap::{Cause, CauseMisc, CauseProtocol, CauseRadioNetwork};

/// Why a routine step failed.  These never leave the routine: each routine turns them into
/// failure entries in its structured response.
#[derive(Error, Debug)]
pub enum ProcedureError {
    #[error("Invalid request - {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("{step} failed, cause {cause:?}")]
    CollaboratorFailure {
        step: &'static str,
        cause: Option<Cause>,
    },

    #[error("Consistency violation - {0}")]
    ConsistencyViolation(String),

    #[error("UE {0} not found")]
    UeNotFound(UeIndex),

    #[error("No CU-UP available")]
    NoCuUpAvailable,

    #[error("UE has no security context")]
    NoSecurityContext,
}

impl ProcedureError {
    pub fn failure(step: &'static str, cause: Option<Cause>) -> Self {
        ProcedureError::CollaboratorFailure { step, cause }
    }

    /// The NGAP cause to report for sessions affected by this error.
    pub fn cause(&self) -> Cause {
        match self {
            ProcedureError::InvalidRequest(e) => e.cause(),
            ProcedureError::CollaboratorFailure { cause, .. } => {
                cause.unwrap_or(Cause::RadioNetwork(CauseRadioNetwork::Unspecified))
            }
            ProcedureError::ConsistencyViolation(_) => {
                Cause::Protocol(CauseProtocol::MessageNotCompatibleWithReceiverState)
            }
            ProcedureError::UeNotFound(_) => {
                Cause::RadioNetwork(CauseRadioNetwork::UnknownLocalUeId)
            }
            ProcedureError::NoCuUpAvailable => {
                Cause::Misc(CauseMisc::NotEnoughUserPlaneProcessingResources)
            }
            ProcedureError::NoSecurityContext => {
                Cause::Protocol(CauseProtocol::MessageNotCompatibleWithReceiverState)
            }
        }
    }
}
