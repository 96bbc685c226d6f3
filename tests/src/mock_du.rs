//! mock_du - enables a test script to assume the role of a DU, and of the RRC entity that talks
//! to the UE through it

use crate::{Event, EventLog};
use async_std::task::sleep;
use async_trait::async_trait;
use cucp::protocols::f1ap::*;
use cucp::protocols::rrc::*;
use cucp::{GnbDuUeF1apId, Rnti, SecurityContext, UeIndex};
use slog::{Logger, debug, o};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;
use xxap::{Cause, CauseRadioNetwork, DrbId, GtpTunnel, SrbId};

/// What the DU or the UE should get wrong.
#[derive(Clone, Debug, Default)]
pub struct DuFaults {
    pub ue_context_setup_fails: bool,
    pub drbs_failed_to_setup: Vec<DrbId>,
    pub omit_c_rnti: bool,
    pub drbs_failed_to_modify: Vec<DrbId>,
    pub modification_delay_ms: u64,
    pub reconfiguration_rejected: bool,
    pub handover_completion_delay_ms: u64,
    pub handover_not_completed: bool,
}

pub struct MockDu {
    ip_addr: IpAddr,
    faults: Mutex<DuFaults>,
    events: EventLog,
    ue_context_setups: Mutex<Vec<UeContextSetupRequest>>,
    ue_context_modifications: Mutex<Vec<UeContextModificationRequest>>,
    ue_context_releases: Mutex<Vec<UeContextReleaseCommand>>,
    reconfigurations: Mutex<Vec<(UeIndex, RrcReconfigurationRequest)>>,
    logger: Logger,
}

impl MockDu {
    pub fn new(n: u8, events: EventLog, logger: &Logger) -> Self {
        MockDu {
            ip_addr: IpAddr::V4(Ipv4Addr::new(127, 0, 1, n)),
            faults: Mutex::new(DuFaults::default()),
            events,
            ue_context_setups: Mutex::new(vec![]),
            ue_context_modifications: Mutex::new(vec![]),
            ue_context_releases: Mutex::new(vec![]),
            reconfigurations: Mutex::new(vec![]),
            logger: logger.new(o!("du" => n)),
        }
    }

    pub fn set_faults(&self, faults: DuFaults) {
        *self.faults.lock().unwrap() = faults;
    }

    fn faults(&self) -> DuFaults {
        self.faults.lock().unwrap().clone()
    }

    /// The F1-U endpoint this DU allocates for a DRB.
    pub fn dl_tunnel(&self, ue_index: UeIndex, drb_id: DrbId) -> GtpTunnel {
        GtpTunnel::new(self.ip_addr, ue_index.0 * 100 + drb_id.0 as u32)
    }

    pub fn c_rnti_for(ue_index: UeIndex) -> Rnti {
        Rnti(0x4600 + ue_index.0 as u16)
    }

    /// Forget the requests received so far.
    pub fn clear_records(&self) {
        self.ue_context_setups.lock().unwrap().clear();
        self.ue_context_modifications.lock().unwrap().clear();
        self.ue_context_releases.lock().unwrap().clear();
        self.reconfigurations.lock().unwrap().clear();
    }

    pub fn last_ue_context_setup(&self) -> Option<UeContextSetupRequest> {
        self.ue_context_setups.lock().unwrap().last().cloned()
    }

    pub fn last_ue_context_modification(&self) -> Option<UeContextModificationRequest> {
        self.ue_context_modifications.lock().unwrap().last().cloned()
    }

    pub fn last_ue_context_release(&self) -> Option<UeContextReleaseCommand> {
        self.ue_context_releases.lock().unwrap().last().cloned()
    }

    pub fn last_reconfiguration(&self) -> Option<(UeIndex, RrcReconfigurationRequest)> {
        self.reconfigurations.lock().unwrap().last().cloned()
    }

    fn drbs_setup(&self, ue_index: UeIndex, drbs: &[DrbToSetupItem], failed: &[DrbId]) -> Vec<DrbSetupItem> {
        drbs.iter()
            .filter(|drb| !failed.contains(&drb.drb_id))
            .map(|drb| DrbSetupItem {
                drb_id: drb.drb_id,
                dl_up_tnl_information: vec![self.dl_tunnel(ue_index, drb.drb_id)],
            })
            .collect()
    }
}

fn requested_and_failed(drbs: &[DrbToSetupItem], failed: &[DrbId]) -> Vec<DrbId> {
    drbs.iter()
        .map(|drb| drb.drb_id)
        .filter(|id| failed.contains(id))
        .collect()
}

fn cell_group_config() -> DuToCuRrcInformation {
    DuToCuRrcInformation {
        cell_group_config: vec![0xcc],
        meas_gap_config: None,
    }
}

#[async_trait]
impl F1apNotifier for MockDu {
    async fn ue_context_setup(&self, r: UeContextSetupRequest) -> UeContextSetupResponse {
        debug!(self.logger, "UeContextSetupRequest <<");
        self.events.push(Event::F1UeContextSetup(r.ue_index));
        self.ue_context_setups.lock().unwrap().push(r.clone());
        let faults = self.faults();
        if faults.ue_context_setup_fails {
            return UeContextSetupResponse {
                success: false,
                cause: Some(Cause::RadioNetwork(CauseRadioNetwork::Unspecified)),
                ..Default::default()
            };
        }
        UeContextSetupResponse {
            success: true,
            gnb_du_ue_f1ap_id: Some(GnbDuUeF1apId(r.ue_index.0 + 1000)),
            c_rnti: (!faults.omit_c_rnti).then(|| MockDu::c_rnti_for(r.ue_index)),
            du_to_cu_rrc_information: Some(cell_group_config()),
            srbs_setup: r.srbs_to_setup.clone(),
            srbs_failed_to_setup: vec![],
            drbs_setup: self.drbs_setup(r.ue_index, &r.drbs_to_setup, &faults.drbs_failed_to_setup),
            drbs_failed_to_setup: requested_and_failed(&r.drbs_to_setup, &faults.drbs_failed_to_setup),
            cause: None,
        }
    }

    async fn ue_context_modification(
        &self,
        r: UeContextModificationRequest,
    ) -> UeContextModificationResponse {
        debug!(self.logger, "UeContextModificationRequest <<");
        self.events.push(Event::F1UeContextModification(r.ue_index));
        self.ue_context_modifications.lock().unwrap().push(r.clone());
        let faults = self.faults();
        if faults.modification_delay_ms > 0 {
            sleep(Duration::from_millis(faults.modification_delay_ms)).await;
        }
        let radio_changes = !r.drbs_to_setup.is_empty() || !r.srbs_to_setup.is_empty();
        UeContextModificationResponse {
            success: true,
            du_to_cu_rrc_information: radio_changes.then(cell_group_config),
            drbs_setup: self.drbs_setup(r.ue_index, &r.drbs_to_setup, &faults.drbs_failed_to_modify),
            drbs_modified: vec![],
            drbs_failed_to_setup: requested_and_failed(&r.drbs_to_setup, &faults.drbs_failed_to_modify),
            drbs_failed_to_modify: vec![],
            srbs_failed_to_setup: vec![],
            cause: None,
        }
    }

    async fn ue_context_release(&self, r: UeContextReleaseCommand) -> bool {
        debug!(self.logger, "UeContextReleaseCommand <<");
        self.events.push(Event::F1UeContextRelease(r.ue_index));
        self.ue_context_releases.lock().unwrap().push(r);
        true
    }

    async fn remove_ue(&self, ue_index: UeIndex) {
        self.events.push(Event::F1RemoveUe(ue_index));
    }
}

#[async_trait]
impl RrcNotifier for MockDu {
    fn init_security_context(&self, _ue_index: UeIndex, _security: &SecurityContext) -> bool {
        true
    }

    fn security_mode_command(&self, ue_index: UeIndex) -> Vec<u8> {
        self.events.push(Event::RrcSecurityModeCommand(ue_index));
        vec![0x5c]
    }

    async fn security_mode_complete(&self, _ue_index: UeIndex) -> bool {
        true
    }

    async fn ue_capability_transfer(&self, ue_index: UeIndex) -> Option<Vec<u8>> {
        self.events.push(Event::RrcCapabilityEnquiry(ue_index));
        Some(vec![0xca])
    }

    async fn reconfiguration(&self, ue_index: UeIndex, r: RrcReconfigurationRequest) -> bool {
        debug!(self.logger, "RrcReconfiguration <<");
        self.events.push(Event::RrcReconfiguration(ue_index));
        self.reconfigurations.lock().unwrap().push((ue_index, r));
        !self.faults().reconfiguration_rejected
    }

    fn handover_reconfiguration(
        &self,
        target_ue_index: UeIndex,
        r: RrcReconfigurationRequest,
    ) -> HandoverReconfiguration {
        self.events
            .push(Event::RrcHandoverReconfiguration(target_ue_index));
        self.reconfigurations
            .lock()
            .unwrap()
            .push((target_ue_index, r));
        HandoverReconfiguration {
            pdu: vec![0x4f],
            transaction_id: 1,
        }
    }

    async fn handover_reconfiguration_complete(
        &self,
        _target_ue_index: UeIndex,
        transaction_id: u8,
    ) -> bool {
        let faults = self.faults();
        if faults.handover_completion_delay_ms > 0 {
            sleep(Duration::from_millis(faults.handover_completion_delay_ms)).await;
        }
        transaction_id == 1 && !faults.handover_not_completed
    }

    fn ue_context(&self, _ue_index: UeIndex) -> Option<RrcUeContext> {
        Some(RrcUeContext {
            srbs: vec![SrbId::SRB1, SrbId::SRB2],
            meas_config: Some(vec![0x3e]),
            handover_preparation_information: vec![0xaa],
            ue_capability: Some(vec![0xca]),
        })
    }

    fn apply_transfer_context(&self, ue_index: UeIndex, _context: &UeTransferContext) -> bool {
        self.events.push(Event::RrcApplyTransferContext(ue_index));
        true
    }

    fn rrc_release(&self, ue_index: UeIndex) -> Option<Vec<u8>> {
        self.events.push(Event::RrcRelease(ue_index));
        Some(vec![0xde])
    }

    async fn remove_ue(&self, ue_index: UeIndex) {
        self.events.push(Event::RrcRemoveUe(ue_index));
    }
}
