//! protocols - the typed boundary between the CU-CP core and its four collaborators
//!
//! Wire encodings live in the protocol adapters.  Each collaborator is reached through a notifier
//! trait that is injected into the CU-CP, so that procedures can be driven against fakes.

pub mod build;
pub mod e1ap;
pub mod f1ap;
pub mod ngap;
pub mod rrc;
