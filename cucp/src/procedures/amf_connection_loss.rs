use super::ue_tasks::schedule_ue_context_release;
use super::{HandlerApi, Procedure};
use derive_deref::{Deref, DerefMut};
use slog::{Logger, info};
use xxap::{Cause, CauseTransport};

/// Without the AMF no UE can be kept, and there is nobody to ask for a release, so every UE is
/// released locally.
#[derive(Deref, DerefMut)]
pub struct AmfConnectionLossProcedure<'a, A: HandlerApi>(Procedure<'a, A>);

impl<'a, A: HandlerApi> AmfConnectionLossProcedure<'a, A> {
    pub fn new(api: &'a A, logger: &'a Logger) -> Self {
        AmfConnectionLossProcedure(Procedure::new(api, logger))
    }

    pub async fn run(&self) {
        let ues = self.ue_manager().ue_indices();
        info!(self.logger, "AMF connection lost, releasing {} UEs", ues.len());
        for ue_index in ues {
            // Skip UEs removed in the meantime.
            let _ = schedule_ue_context_release(
                self.api,
                ue_index,
                Cause::Transport(CauseTransport::TransportResourceUnavailable),
                true,
            );
        }
    }
}
