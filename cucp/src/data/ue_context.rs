use super::{AmfUeNgapId, CuUpIndex, DuIndex, GnbDuUeF1apId, Pci, Rnti, SecurityContext, UeIndex};
use crate::protocols::e1ap::E1apNotifier;
use crate::protocols::f1ap::F1apNotifier;
use crate::protocols::ngap::NgapNotifier;
use crate::protocols::rrc::RrcNotifier;
use crate::ue_manager::TaskScheduler;
use crate::up_resource_manager::UpResourceManager;
use slog::Logger;
use std::collections::BTreeSet;
use std::sync::Arc;
use stop_token::StopSource;
use xxap::SrbId;

/// Handles to the four collaborators that a UE's routines talk to.
#[derive(Clone)]
pub struct UeNotifiers {
    pub f1ap: Arc<dyn F1apNotifier>,
    pub rrc: Arc<dyn RrcNotifier>,
    // Present once the UE has a bearer context at a CU-UP.
    pub e1ap: Option<Arc<dyn E1apNotifier>>,
    pub ngap: Arc<dyn NgapNotifier>,
}

pub struct UeContext {
    pub ue_index: UeIndex,
    pub du_index: DuIndex,
    pub pci: Pci,
    pub c_rnti: Option<Rnti>,
    pub du_ue_f1ap_id: Option<GnbDuUeF1apId>,
    pub cu_up_index: Option<CuUpIndex>,
    pub amf_ue_id: Option<AmfUeNgapId>,
    pub notifiers: UeNotifiers,
    pub up_resources: UpResourceManager,
    pub security: Option<SecurityContext>,
    pub srbs: BTreeSet<SrbId>,

    // Set while this UE is the source of a handover.
    pub ho_in_progress: bool,
    // Dropping this cancels a deferred release.
    pub handover_ue_release_timer: Option<StopSource>,

    pub scheduler: TaskScheduler,
    pub logger: Logger,
}

impl UeContext {
    pub fn has_amf_context(&self) -> bool {
        self.amf_ue_id.is_some()
    }
}
