//! du_repository - the DUs connected over F1

use crate::data::{DuIndex, Pci};
use crate::protocols::f1ap::F1apNotifier;
use crate::protocols::rrc::RrcNotifier;
use anyhow::{Result, ensure};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use dashmap::DashMap;
use std::sync::Arc;

/// A DU as it presents itself at F1 Setup.
pub struct DuSetup {
    pub name: String,
    pub served_cells: Vec<Pci>,
    pub f1ap: Arc<dyn F1apNotifier>,
    pub rrc: Arc<dyn RrcNotifier>,
}

pub struct DuContext {
    pub du_index: DuIndex,
    pub name: String,
    pub served_cells: Vec<Pci>,
    pub f1ap: Arc<dyn F1apNotifier>,
    pub rrc: Arc<dyn RrcNotifier>,
}

pub struct DuRepository {
    dus: DashMap<DuIndex, DuContext>,
    next_index: RelaxedCounter,
    max_nof_dus: usize,
}

impl DuRepository {
    pub fn new(max_nof_dus: usize) -> Self {
        DuRepository {
            dus: DashMap::new(),
            next_index: RelaxedCounter::new(0),
            max_nof_dus,
        }
    }

    pub fn add_du(&self, setup: DuSetup) -> Result<DuIndex> {
        ensure!(
            self.dus.len() < self.max_nof_dus,
            "Limit of {} DUs reached",
            self.max_nof_dus
        );
        ensure!(!setup.served_cells.is_empty(), "DU {} serves no cells", setup.name);
        for pci in &setup.served_cells {
            ensure!(
                self.find_du_by_pci(*pci).is_none(),
                "Cell with PCI {} is already served",
                pci.0
            );
        }
        let du_index = DuIndex(self.next_index.inc() as u32);
        self.dus.insert(
            du_index,
            DuContext {
                du_index,
                name: setup.name,
                served_cells: setup.served_cells,
                f1ap: setup.f1ap,
                rrc: setup.rrc,
            },
        );
        Ok(du_index)
    }

    pub fn remove_du(&self, du_index: DuIndex) -> Option<DuContext> {
        self.dus.remove(&du_index).map(|(_, du)| du)
    }

    pub fn find_du_by_pci(&self, pci: Pci) -> Option<DuIndex> {
        self.dus
            .iter()
            .find(|du| du.served_cells.contains(&pci))
            .map(|du| du.du_index)
    }

    pub fn notifiers(
        &self,
        du_index: DuIndex,
    ) -> Option<(Arc<dyn F1apNotifier>, Arc<dyn RrcNotifier>)> {
        self.dus
            .get(&du_index)
            .map(|du| (du.f1ap.clone(), du.rrc.clone()))
    }

    pub fn serves(&self, du_index: DuIndex, pci: Pci) -> bool {
        self.dus
            .get(&du_index)
            .is_some_and(|du| du.served_cells.contains(&pci))
    }

    pub fn nof_dus(&self) -> usize {
        self.dus.len()
    }
}
