//! du_removal - loss of the F1 link to a DU

use super::ue_tasks::schedule_release_request;
use super::{HandlerApi, Procedure};
use crate::data::DuIndex;
use derive_deref::{Deref, DerefMut};
use slog::{Logger, info, warn};
use xxap::{Cause, CauseRadioNetwork};

#[derive(Deref, DerefMut)]
pub struct DuRemovalProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> DuRemovalProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        DuRemovalProcedure(Procedure::new(api, logger))
    }

    // DU Removal Procedure
    // 1.    Forget the DU, so that no new UEs or handovers use it
    // 2.    Schedule a UE context release request on each of its UEs
    pub async fn run(&self, du_index: DuIndex) {
        let Some(du) = self.du_repository().remove_du(du_index) else {
            warn!(self.logger, "DU {} was not known", du_index.0);
            return;
        };
        let ues = self.ue_manager().find_ues(|ue| ue.du_index == du_index);
        info!(
            self.logger,
            "F1 link to DU {} ({}) lost, releasing {} UEs",
            du_index.0,
            du.name,
            ues.len()
        );
        for ue_index in ues {
            if !schedule_release_request(
                self.api,
                ue_index,
                Cause::RadioNetwork(CauseRadioNetwork::RadioConnectionWithUeLost),
            ) {
                warn!(self.logger, "Couldn't schedule release of UE {}", ue_index);
            }
        }
    }
}
