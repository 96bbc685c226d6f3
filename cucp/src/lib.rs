mod cu_up_repository;
mod cucp;
mod data;
mod du_repository;
mod procedures;
pub mod protocols;
mod ue_manager;
pub mod up_resource_manager;

use procedures::HandlerApi;

pub use cu_up_repository::{CuUpContext, CuUpRepository};
pub use cucp::CuCp;
pub use data::*;
pub use du_repository::{DuContext, DuRepository, DuSetup};
pub use procedures::{HandoverResponse, ProcedureError};
pub use ue_manager::{NewUe, Task, TaskScheduler, UeManager};
