//! e1ap - bearer context management towards the CU-UP (TS37.483, 8.3)

use super::ngap::QosFlowLevelQosParameters;
use crate::data::{SecurityContext, SecurityIndication, SecurityResult, UeIndex};
use crate::up_resource_manager::PdcpConfig;
use async_trait::async_trait;
use xxap::{
    Cause, DrbId, GtpTunnel, PduSessionFailedItem, PduSessionId, PduSessionType, QosFlowId, Snssai,
};

#[async_trait]
pub trait E1apNotifier: Send + Sync {
    async fn bearer_context_setup(&self, r: BearerContextSetupRequest)
    -> BearerContextSetupResponse;
    async fn bearer_context_modification(
        &self,
        r: BearerContextModificationRequest,
    ) -> BearerContextModificationResponse;
    /// Returns false if no Bearer Context Release Complete was received.
    async fn bearer_context_release(&self, r: BearerContextReleaseCommand) -> bool;
    /// Rekey the E1AP UE context from the old to the new UE index, on mobility.
    fn update_ue_index(&self, new_ue_index: UeIndex, old_ue_index: UeIndex) -> bool;
    async fn remove_ue(&self, ue_index: UeIndex);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QosFlowItem {
    pub qos_flow_id: QosFlowId,
    pub qos_params: QosFlowLevelQosParameters,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbToSetupItem {
    pub drb_id: DrbId,
    pub pdcp_config: PdcpConfig,
    pub qos_flows: Vec<QosFlowItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionToSetupItem {
    pub pdu_session_id: PduSessionId,
    pub snssai: Snssai,
    pub pdu_session_type: PduSessionType,
    pub security_indication: SecurityIndication,
    pub ul_ngu_tunnel: GtpTunnel,
    pub drbs_to_setup: Vec<DrbToSetupItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbSetupItem {
    pub drb_id: DrbId,
    pub ul_up_tnl_information: Vec<GtpTunnel>,
    pub qos_flows_setup: Vec<QosFlowId>,
    pub qos_flows_failed: Vec<QosFlowId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionSetupItem {
    pub pdu_session_id: PduSessionId,
    pub dl_ngu_tunnel: GtpTunnel,
    pub security_result: Option<SecurityResult>,
    pub drbs_setup: Vec<DrbSetupItem>,
    pub drbs_failed: Vec<DrbId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerContextSetupRequest {
    pub ue_index: UeIndex,
    pub security: SecurityContext,
    pub ue_dl_aggregate_maximum_bit_rate: Option<u64>,
    pub pdu_sessions_to_setup: Vec<PduSessionToSetupItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BearerContextSetupResponse {
    pub success: bool,
    pub pdu_sessions_setup: Vec<PduSessionSetupItem>,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
    pub cause: Option<Cause>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbToModifyItem {
    pub drb_id: DrbId,
    pub dl_up_tnl_information: Vec<GtpTunnel>,
    pub pdcp_reestablish: bool,
    // Full new QoS flow mapping, when it changes.
    pub flow_mapping_information: Option<Vec<QosFlowItem>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionToModifyItem {
    pub pdu_session_id: PduSessionId,
    pub drbs_to_setup: Vec<DrbToSetupItem>,
    pub drbs_to_modify: Vec<DrbToModifyItem>,
    pub drbs_to_remove: Vec<DrbId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerContextModificationRequest {
    pub ue_index: UeIndex,
    pub security: Option<SecurityContext>,
    pub new_ul_tnl_information_required: bool,
    pub pdu_sessions_to_setup: Vec<PduSessionToSetupItem>,
    pub pdu_sessions_to_modify: Vec<PduSessionToModifyItem>,
    pub pdu_sessions_to_remove: Vec<PduSessionId>,
}

impl BearerContextModificationRequest {
    pub fn new(ue_index: UeIndex) -> Self {
        BearerContextModificationRequest {
            ue_index,
            security: None,
            new_ul_tnl_information_required: false,
            pdu_sessions_to_setup: vec![],
            pdu_sessions_to_modify: vec![],
            pdu_sessions_to_remove: vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrbModifiedItem {
    pub drb_id: DrbId,
    pub ul_up_tnl_information: Vec<GtpTunnel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionModifiedItem {
    pub pdu_session_id: PduSessionId,
    pub dl_ngu_tunnel: Option<GtpTunnel>,
    pub drbs_setup: Vec<DrbSetupItem>,
    pub drbs_modified: Vec<DrbModifiedItem>,
    pub drbs_failed: Vec<DrbId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BearerContextModificationResponse {
    pub success: bool,
    pub pdu_sessions_setup: Vec<PduSessionSetupItem>,
    pub pdu_sessions_failed_to_setup: Vec<PduSessionFailedItem>,
    pub pdu_sessions_modified: Vec<PduSessionModifiedItem>,
    pub pdu_sessions_failed_to_modify: Vec<PduSessionFailedItem>,
    pub cause: Option<Cause>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerContextReleaseCommand {
    pub ue_index: UeIndex,
    pub cause: Cause,
}
