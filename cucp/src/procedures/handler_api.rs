use crate::cu_up_repository::CuUpRepository;
use crate::data::{Config, DuIndex, GnbDuUeF1apId, Pci, Rnti, UeIndex};
use crate::du_repository::DuRepository;
use crate::protocols::ngap::NgapNotifier;
use crate::ue_manager::{Task, UeManager};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait representing the collection of services needed by CU-CP procedures.
#[async_trait]
pub trait HandlerApi: Send + Sync + Clone + 'static {
    fn config(&self) -> &Config;

    fn ue_manager(&self) -> &UeManager;
    fn du_repository(&self) -> &DuRepository;
    fn cu_up_repository(&self) -> &CuUpRepository;
    fn ngap(&self) -> &Arc<dyn NgapNotifier>;

    /// Allocate a UE on a DU, wiring in that DU's notifiers.  None if the DU is unknown or
    /// there is no room.
    async fn add_ue(
        &self,
        du_index: DuIndex,
        pci: Pci,
        c_rnti: Option<Rnti>,
        du_ue_f1ap_id: Option<GnbDuUeF1apId>,
    ) -> Option<UeIndex>;

    fn schedule_global_task(&self, task: Task) -> bool;
}
