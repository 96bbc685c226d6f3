mod config;
mod ids;
mod security_context;
mod ue_context;

pub use config::*;
pub use ids::*;
pub use security_context::*;
pub use ue_context::*;
