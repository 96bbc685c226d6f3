//! cu_up_removal - loss of the E1 link to a CU-UP

use super::ue_tasks::schedule_release_request;
use super::{HandlerApi, Procedure};
use crate::data::CuUpIndex;
use derive_deref::{Deref, DerefMut};
use slog::{Logger, info, warn};
use xxap::{Cause, CauseTransport};

#[derive(Deref, DerefMut)]
pub struct CuUpRemovalProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> CuUpRemovalProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        CuUpRemovalProcedure(Procedure::new(api, logger))
    }

    // CU-UP Removal Procedure
    // 1.    Detach every UE served by the CU-UP from its E1AP handle
    // 2.    Schedule a UE context release request on each of those UEs
    // 3.    Forget the CU-UP
    pub async fn run(&self, cu_up_index: CuUpIndex) {
        let ues = self
            .ue_manager()
            .find_ues(|ue| ue.cu_up_index == Some(cu_up_index));
        info!(
            self.logger,
            "E1 link to CU-UP {} lost, releasing {} UEs",
            cu_up_index.0,
            ues.len()
        );

        for ue_index in ues {
            // The bearer contexts are gone with the CU-UP.  A UE that has just been removed
            // is simply skipped.
            let _ = self.ue_manager().with_ue_mut(ue_index, |ue| {
                ue.cu_up_index = None;
                ue.notifiers.e1ap = None;
            });
            if !schedule_release_request(
                self.api,
                ue_index,
                Cause::Transport(CauseTransport::TransportResourceUnavailable),
            ) {
                warn!(self.logger, "Couldn't schedule release of UE {}", ue_index);
            }
        }

        if self.cu_up_repository().remove_cu_up(cu_up_index).is_none() {
            warn!(self.logger, "CU-UP {} was not known", cu_up_index.0);
        }
    }
}
