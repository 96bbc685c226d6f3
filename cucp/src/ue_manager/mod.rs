//! ue_manager - registry of UE contexts
//!
//! Contexts are only ever accessed through short synchronous closures, so that no map guard is
//! held across an await point.

mod task_scheduler;

pub use task_scheduler::{Task, TaskScheduler};

use crate::data::{DuIndex, GnbDuUeF1apId, Pci, Rnti, UeContext, UeIndex, UeNotifiers, UpResourceConfig};
use crate::up_resource_manager::UpResourceManager;
use async_std::sync::Mutex;
use dashmap::DashMap;
use index_pool::IndexPool;
use slog::{Logger, info, o, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use xxap::SrbId;

/// What is known about a UE when it is first allocated.
pub struct NewUe {
    pub du_index: DuIndex,
    pub pci: Pci,
    pub c_rnti: Option<Rnti>,
    pub du_ue_f1ap_id: Option<GnbDuUeF1apId>,
    pub notifiers: UeNotifiers,
}

pub struct UeManager {
    ues: DashMap<UeIndex, UeContext>,
    by_pci_rnti: DashMap<(Pci, Rnti), UeIndex>,
    index_pool: Mutex<IndexPool>,
    max_nof_ues: usize,
    up_config: Arc<UpResourceConfig>,
    logger: Logger,
}

impl UeManager {
    pub fn new(max_nof_ues: usize, up_config: UpResourceConfig, logger: Logger) -> Self {
        let mut index_pool = IndexPool::new();
        // Take the 0 slot, so that the first UE gets index 1.
        let _ = index_pool.request_id(0);
        UeManager {
            ues: DashMap::new(),
            by_pci_rnti: DashMap::new(),
            index_pool: Mutex::new(index_pool),
            max_nof_ues,
            up_config: Arc::new(up_config),
            logger,
        }
    }

    /// Allocate a UE index and create its context.  Returns None when at capacity.
    pub async fn add_ue(&self, new_ue: NewUe) -> Option<UeIndex> {
        let mut index_pool = self.index_pool.lock().await;
        if self.ues.len() >= self.max_nof_ues {
            warn!(self.logger, "Can't add UE - limit of {} reached", self.max_nof_ues);
            return None;
        }
        let ue_index = UeIndex(index_pool.new_id() as u32);
        drop(index_pool);

        let logger = self.logger.new(o!("ue_index" => ue_index.0));
        if let Some(c_rnti) = new_ue.c_rnti {
            self.by_pci_rnti.insert((new_ue.pci, c_rnti), ue_index);
        }
        let ue = UeContext {
            ue_index,
            du_index: new_ue.du_index,
            pci: new_ue.pci,
            c_rnti: new_ue.c_rnti,
            du_ue_f1ap_id: new_ue.du_ue_f1ap_id,
            cu_up_index: None,
            amf_ue_id: None,
            notifiers: new_ue.notifiers,
            up_resources: UpResourceManager::new(self.up_config.clone()),
            security: None,
            srbs: BTreeSet::from([SrbId::SRB1]),
            ho_in_progress: false,
            handover_ue_release_timer: None,
            scheduler: TaskScheduler::spawn(logger.clone()),
            logger,
        };
        info!(
            ue.logger,
            "Added UE on DU {}, pci {}, c-rnti {:?}", new_ue.du_index.0, ue.pci.0, ue.c_rnti
        );
        self.ues.insert(ue_index, ue);
        Some(ue_index)
    }

    /// Drop the UE's context and free its index.  Queued tasks are discarded and any pending
    /// handover release timer is cancelled.  The caller is responsible for having already
    /// removed the UE from every collaborator.
    pub async fn remove_ue(&self, ue_index: UeIndex) -> bool {
        let Some((_, ue)) = self.ues.remove(&ue_index) else {
            return false;
        };
        if let Some(c_rnti) = ue.c_rnti {
            self.by_pci_rnti
                .remove_if(&(ue.pci, c_rnti), |_, idx| *idx == ue_index);
        }
        ue.scheduler.clear_pending_tasks();
        info!(ue.logger, "Removed UE");
        drop(ue);
        let _ = self.index_pool.lock().await.return_id(ue_index.0 as usize);
        true
    }

    pub fn with_ue<R>(&self, ue_index: UeIndex, f: impl FnOnce(&UeContext) -> R) -> Option<R> {
        self.ues.get(&ue_index).map(|ue| f(&ue))
    }

    pub fn with_ue_mut<R>(
        &self,
        ue_index: UeIndex,
        f: impl FnOnce(&mut UeContext) -> R,
    ) -> Option<R> {
        self.ues.get_mut(&ue_index).map(|mut ue| f(&mut ue))
    }

    pub fn contains(&self, ue_index: UeIndex) -> bool {
        self.ues.contains_key(&ue_index)
    }

    pub fn find_by_pci_rnti(&self, pci: Pci, c_rnti: Rnti) -> Option<UeIndex> {
        self.by_pci_rnti.get(&(pci, c_rnti)).map(|x| *x)
    }

    /// Record the C-RNTI a DU has assigned, e.g. to a handover target.
    pub fn set_c_rnti(&self, ue_index: UeIndex, c_rnti: Rnti) -> bool {
        let Some(pci) = self.with_ue_mut(ue_index, |ue| {
            ue.c_rnti = Some(c_rnti);
            ue.pci
        }) else {
            return false;
        };
        self.by_pci_rnti.insert((pci, c_rnti), ue_index);
        true
    }

    /// Queue a task on the UE's scheduler.  False if the UE is gone or being torn down.
    pub fn schedule(&self, ue_index: UeIndex, task: Task) -> bool {
        self.with_ue(ue_index, |ue| ue.scheduler.schedule(task))
            .unwrap_or(false)
    }

    pub fn ue_indices(&self) -> Vec<UeIndex> {
        let mut indices: Vec<UeIndex> = self.ues.iter().map(|x| *x.key()).collect();
        indices.sort();
        indices
    }

    /// UEs matching a predicate, in index order.
    pub fn find_ues(&self, f: impl Fn(&UeContext) -> bool) -> Vec<UeIndex> {
        let mut indices: Vec<UeIndex> = self
            .ues
            .iter()
            .filter(|x| f(x.value()))
            .map(|x| *x.key())
            .collect();
        indices.sort();
        indices
    }

    pub fn nof_ues(&self) -> usize {
        self.ues.len()
    }
}
