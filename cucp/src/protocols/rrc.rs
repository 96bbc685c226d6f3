//! rrc - the RRC entity that talks to the terminal through the DU

use crate::data::{SecurityContext, UeIndex};
use crate::up_resource_manager::{PdcpConfig, UpContext};
use async_trait::async_trait;
use xxap::{DrbId, PduSessionId, SrbId};

#[async_trait]
pub trait RrcNotifier: Send + Sync {
    fn init_security_context(&self, ue_index: UeIndex, security: &SecurityContext) -> bool;
    /// Packed Security Mode Command, to be carried in the F1AP UE Context Setup Request.
    fn security_mode_command(&self, ue_index: UeIndex) -> Vec<u8>;
    /// Wait for the Security Mode Complete.  False on failure or timeout.
    async fn security_mode_complete(&self, ue_index: UeIndex) -> bool;
    /// UE Capability Enquiry / Information.  Returns the packed capability container.
    async fn ue_capability_transfer(&self, ue_index: UeIndex) -> Option<Vec<u8>>;
    /// Send an RRC Reconfiguration and wait for the Complete.  False if not accepted.
    async fn reconfiguration(&self, ue_index: UeIndex, r: RrcReconfigurationRequest) -> bool;
    /// Build the RRC Reconfiguration with sync that the target UE will answer.  It is
    /// delivered over the source radio link.
    fn handover_reconfiguration(
        &self,
        target_ue_index: UeIndex,
        r: RrcReconfigurationRequest,
    ) -> HandoverReconfiguration;
    /// Wait for the target UE to send RRC Reconfiguration Complete.
    async fn handover_reconfiguration_complete(
        &self,
        target_ue_index: UeIndex,
        transaction_id: u8,
    ) -> bool;
    /// The RRC-owned part of the UE context, as carried on mobility.
    fn ue_context(&self, ue_index: UeIndex) -> Option<RrcUeContext>;
    /// Install a context transferred from another UE (handover target, re-establishment).
    fn apply_transfer_context(&self, ue_index: UeIndex, context: &UeTransferContext) -> bool;
    fn rrc_release(&self, ue_index: UeIndex) -> Option<Vec<u8>>;
    async fn remove_ue(&self, ue_index: UeIndex);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrcDrbToAdd {
    pub drb_id: DrbId,
    pub pdu_session_id: PduSessionId,
    pub pdcp_config: PdcpConfig,
    pub reestablish_pdcp: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RadioBearerConfig {
    pub srbs_to_add: Vec<SrbId>,
    pub drbs_to_add: Vec<RrcDrbToAdd>,
    pub drbs_to_release: Vec<DrbId>,
}

impl RadioBearerConfig {
    pub fn is_empty(&self) -> bool {
        self.srbs_to_add.is_empty() && self.drbs_to_add.is_empty() && self.drbs_to_release.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RrcReconfigurationRequest {
    pub radio_bearer_config: Option<RadioBearerConfig>,
    pub cell_group_config: Option<Vec<u8>>,
    pub meas_config: Option<Vec<u8>>,
    pub nas_pdus: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoverReconfiguration {
    pub pdu: Vec<u8>,
    pub transaction_id: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RrcUeContext {
    pub srbs: Vec<SrbId>,
    pub meas_config: Option<Vec<u8>>,
    pub handover_preparation_information: Vec<u8>,
    pub ue_capability: Option<Vec<u8>>,
}

/// Everything that moves from a source UE to a target UE on handover or re-establishment.
/// Opaque to the CU-CP core except for the UP context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeTransferContext {
    pub security: SecurityContext,
    pub rrc: RrcUeContext,
    pub up_ctx: UpContext,
}
