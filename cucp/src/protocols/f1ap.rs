//! f1ap - UE associated F1AP procedures towards the DU (TS38.473, 8.3)

use crate::data::{GnbDuUeF1apId, Pci, RlcMode, Rnti, UeIndex};
use async_trait::async_trait;
use xxap::{Cause, DrbId, FiveQi, GtpTunnel, PduSessionId, QosFlowId, SrbId};

#[async_trait]
pub trait F1apNotifier: Send + Sync {
    async fn ue_context_setup(&self, r: UeContextSetupRequest) -> UeContextSetupResponse;
    async fn ue_context_modification(
        &self,
        r: UeContextModificationRequest,
    ) -> UeContextModificationResponse;
    /// Returns false if no UE Context Release Complete was received.
    async fn ue_context_release(&self, r: UeContextReleaseCommand) -> bool;
    /// Drop the F1AP state for this UE without signaling.
    async fn remove_ue(&self, ue_index: UeIndex);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CuToDuRrcInformation {
    pub ue_capability_rat_container_list: Option<Vec<u8>>,
    pub meas_config: Option<Vec<u8>>,
    pub handover_preparation_information: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DuToCuRrcInformation {
    pub cell_group_config: Vec<u8>,
    pub meas_gap_config: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbToSetupItem {
    pub drb_id: DrbId,
    pub pdu_session_id: PduSessionId,
    pub five_qi: FiveQi,
    pub qos_flows: Vec<QosFlowId>,
    pub rlc_mode: RlcMode,
    pub pdcp_sn_size: u8,
    pub ul_up_tnl_information: Vec<GtpTunnel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbToModifyItem {
    pub drb_id: DrbId,
    pub ul_up_tnl_information: Vec<GtpTunnel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbSetupItem {
    pub drb_id: DrbId,
    pub dl_up_tnl_information: Vec<GtpTunnel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextSetupRequest {
    pub ue_index: UeIndex,
    pub sp_cell_pci: Pci,
    pub cu_to_du_rrc_information: CuToDuRrcInformation,
    pub srbs_to_setup: Vec<SrbId>,
    pub drbs_to_setup: Vec<DrbToSetupItem>,
    pub rrc_container: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UeContextSetupResponse {
    pub success: bool,
    pub gnb_du_ue_f1ap_id: Option<GnbDuUeF1apId>,
    pub c_rnti: Option<Rnti>,
    pub du_to_cu_rrc_information: Option<DuToCuRrcInformation>,
    pub srbs_setup: Vec<SrbId>,
    pub srbs_failed_to_setup: Vec<SrbId>,
    pub drbs_setup: Vec<DrbSetupItem>,
    pub drbs_failed_to_setup: Vec<DrbId>,
    pub cause: Option<Cause>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextModificationRequest {
    pub ue_index: UeIndex,
    pub srbs_to_setup: Vec<SrbId>,
    pub drbs_to_setup: Vec<DrbToSetupItem>,
    pub drbs_to_modify: Vec<DrbToModifyItem>,
    pub drbs_to_release: Vec<DrbId>,
    pub rrc_container: Option<Vec<u8>>,
    // Set when the DU should stop transmitting to the UE, e.g. on handover.
    pub transmission_action_stop: bool,
}

impl UeContextModificationRequest {
    pub fn new(ue_index: UeIndex) -> Self {
        UeContextModificationRequest {
            ue_index,
            srbs_to_setup: vec![],
            drbs_to_setup: vec![],
            drbs_to_modify: vec![],
            drbs_to_release: vec![],
            rrc_container: None,
            transmission_action_stop: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UeContextModificationResponse {
    pub success: bool,
    pub du_to_cu_rrc_information: Option<DuToCuRrcInformation>,
    pub drbs_setup: Vec<DrbSetupItem>,
    pub drbs_modified: Vec<DrbSetupItem>,
    pub drbs_failed_to_setup: Vec<DrbId>,
    pub drbs_failed_to_modify: Vec<DrbId>,
    pub srbs_failed_to_setup: Vec<SrbId>,
    pub cause: Option<Cause>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextReleaseCommand {
    pub ue_index: UeIndex,
    pub cause: Cause,
    // RRC Release to deliver to the UE, if it is still reachable.
    pub rrc_container: Option<Vec<u8>>,
}
