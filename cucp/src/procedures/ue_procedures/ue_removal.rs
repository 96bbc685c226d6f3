use super::UeProcedure;
use crate::HandlerApi;
use derive_deref::{Deref, DerefMut};
use slog::{debug, info};

/// Drop every trace of the UE, collaborators first and the UE manager last.  This is the
/// cleanup step every other routine falls back on, so it never fails.
#[derive(Deref, DerefMut)]
pub struct UeRemovalProcedure<'a, A: HandlerApi>(UeProcedure<'a, A>);

impl<'a, A: HandlerApi> UeRemovalProcedure<'a, A> {
    pub fn new(ue_procedure: UeProcedure<'a, A>) -> Self {
        UeRemovalProcedure(ue_procedure)
    }

    pub async fn run(self) {
        info!(self.logger, "Remove UE");
        let ue_index = self.ue_index;

        self.notifiers.rrc.remove_ue(ue_index).await;

        // The bearer context may already be gone, e.g. after an E1 link loss.
        match &self.notifiers.e1ap {
            Some(e1ap) => e1ap.remove_ue(ue_index).await,
            None => debug!(self.logger, "No E1AP context to remove"),
        }

        self.notifiers.f1ap.remove_ue(ue_index).await;
        self.notifiers.ngap.remove_ue(ue_index).await;

        self.ue_manager().remove_ue(ue_index).await;
    }
}
