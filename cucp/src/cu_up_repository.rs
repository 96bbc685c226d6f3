//! cu_up_repository - the CU-UPs connected over E1

use crate::data::CuUpIndex;
use crate::protocols::e1ap::E1apNotifier;
use anyhow::{Result, ensure};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use dashmap::DashMap;
use std::sync::Arc;

pub struct CuUpContext {
    pub cu_up_index: CuUpIndex,
    pub name: String,
    pub e1ap: Arc<dyn E1apNotifier>,
}

pub struct CuUpRepository {
    cu_ups: DashMap<CuUpIndex, CuUpContext>,
    next_index: RelaxedCounter,
    max_nof_cu_ups: usize,
}

impl CuUpRepository {
    pub fn new(max_nof_cu_ups: usize) -> Self {
        CuUpRepository {
            cu_ups: DashMap::new(),
            next_index: RelaxedCounter::new(0),
            max_nof_cu_ups,
        }
    }

    pub fn add_cu_up(&self, name: String, e1ap: Arc<dyn E1apNotifier>) -> Result<CuUpIndex> {
        ensure!(
            self.cu_ups.len() < self.max_nof_cu_ups,
            "Limit of {} CU-UPs reached",
            self.max_nof_cu_ups
        );
        let cu_up_index = CuUpIndex(self.next_index.inc() as u32);
        self.cu_ups.insert(
            cu_up_index,
            CuUpContext {
                cu_up_index,
                name,
                e1ap,
            },
        );
        Ok(cu_up_index)
    }

    pub fn remove_cu_up(&self, cu_up_index: CuUpIndex) -> Option<CuUpContext> {
        self.cu_ups.remove(&cu_up_index).map(|(_, cu_up)| cu_up)
    }

    /// Pick a CU-UP for a UE that doesn't have one yet.  The longest connected one is used.
    pub fn select_cu_up(&self) -> Option<(CuUpIndex, Arc<dyn E1apNotifier>)> {
        self.cu_ups
            .iter()
            .min_by_key(|cu_up| cu_up.cu_up_index)
            .map(|cu_up| (cu_up.cu_up_index, cu_up.e1ap.clone()))
    }

    pub fn e1ap(&self, cu_up_index: CuUpIndex) -> Option<Arc<dyn E1apNotifier>> {
        self.cu_ups.get(&cu_up_index).map(|cu_up| cu_up.e1ap.clone())
    }

    pub fn nof_cu_ups(&self) -> usize {
        self.cu_ups.len()
    }
}
