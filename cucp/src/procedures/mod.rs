mod amf_connection_loss;
mod cu_up_removal;
mod du_removal;
mod error;
mod handler_api;
mod procedure;
pub mod ue_procedures;
pub mod ue_tasks;

pub use amf_connection_loss::AmfConnectionLossProcedure;
pub use cu_up_removal::CuUpRemovalProcedure;
pub use du_removal::DuRemovalProcedure;
pub use error::ProcedureError;
pub use handler_api::HandlerApi;
pub use procedure::Procedure;
pub use ue_procedures::*;
