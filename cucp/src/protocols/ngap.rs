//! ngap - UE associated NGAP procedures with the AMF (TS38.413, 8.2 - 8.4)

use crate::data::{
    AmfUeNgapId, Pci, SecurityCapabilities, SecurityIndication, SecurityResult, UeIndex,
};
use async_trait::async_trait;
use xxap::{
    Cause, FiveQi, GtpTunnel, PduSessionFailedItem, PduSessionId, PduSessionType, QosFlowId,
    Snssai,
};

#[async_trait]
pub trait NgapNotifier: Send + Sync {
    /// Returns true if the AMF has a context for this UE and will answer with a UE Context
    /// Release Command.
    async fn ue_context_release_request(&self, r: UeContextReleaseRequest) -> bool;
    async fn ue_radio_capability_info_indication(&self, ue_index: UeIndex, capability: Vec<u8>);
    /// Rekey the NGAP UE context from the old to the new UE index, on mobility.
    fn update_ue_index(&self, new_ue_index: UeIndex, old_ue_index: UeIndex) -> bool;
    async fn remove_ue(&self, ue_index: UeIndex);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GbrQosFlowInformation {
    pub max_flow_bit_rate_dl: u64,
    pub max_flow_bit_rate_ul: u64,
    pub guaranteed_flow_bit_rate_dl: u64,
    pub guaranteed_flow_bit_rate_ul: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosFlowLevelQosParameters {
    pub five_qi: FiveQi,
    pub arp_priority_level: u8,
    pub gbr: Option<GbrQosFlowInformation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QosFlowSetupRequestItem {
    pub qos_flow_id: QosFlowId,
    pub qos_params: QosFlowLevelQosParameters,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceSetupItem {
    pub pdu_session_id: PduSessionId,
    pub snssai: Snssai,
    pub pdu_session_type: PduSessionType,
    pub ul_ngu_tunnel: GtpTunnel,
    pub security_indication: Option<SecurityIndication>,
    pub qos_flows: Vec<QosFlowSetupRequestItem>,
    pub nas_pdu: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceSetupRequest {
    pub ue_index: UeIndex,
    pub pdu_sessions: Vec<PduSessionResourceSetupItem>,
    pub ue_aggregate_maximum_bit_rate_dl: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionSetupResponseItem {
    pub pdu_session_id: PduSessionId,
    pub dl_ngu_tunnel: GtpTunnel,
    pub qos_flows_setup: Vec<QosFlowId>,
    pub security_result: Option<SecurityResult>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceSetupResponse {
    pub ue_index: UeIndex,
    pub pdu_sessions_setup: Vec<PduSessionSetupResponseItem>,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceModifyItem {
    pub pdu_session_id: PduSessionId,
    pub qos_flows_to_add_or_modify: Vec<QosFlowSetupRequestItem>,
    pub qos_flows_to_release: Vec<QosFlowId>,
    pub nas_pdu: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceModifyRequest {
    pub ue_index: UeIndex,
    pub pdu_sessions: Vec<PduSessionResourceModifyItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionModifyResponseItem {
    pub pdu_session_id: PduSessionId,
    pub qos_flows_added_or_modified: Vec<QosFlowId>,
    pub qos_flows_released: Vec<QosFlowId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceModifyResponse {
    pub ue_index: UeIndex,
    pub pdu_sessions_modified: Vec<PduSessionModifyResponseItem>,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceReleaseCommand {
    pub ue_index: UeIndex,
    pub pdu_sessions_to_release: Vec<PduSessionId>,
    pub nas_pdu: Option<Vec<u8>>,
    pub cause: Cause,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduSessionResourceReleaseResponse {
    pub ue_index: UeIndex,
    pub pdu_sessions_released: Vec<PduSessionId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialContextSetupRequest {
    pub ue_index: UeIndex,
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub security_key: [u8; 32],
    pub ue_security_capabilities: SecurityCapabilities,
    pub pdu_sessions_to_setup: Vec<PduSessionResourceSetupItem>,
    pub ue_aggregate_maximum_bit_rate_dl: Option<u64>,
    pub ue_radio_capability: Option<Vec<u8>>,
    pub nas_pdu: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialContextSetupResponse {
    pub ue_index: UeIndex,
    pub pdu_sessions_setup: Vec<PduSessionSetupResponseItem>,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialContextSetupFailure {
    pub ue_index: UeIndex,
    pub cause: Cause,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextReleaseCommand {
    pub ue_index: UeIndex,
    pub cause: Cause,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextReleaseComplete {
    pub ue_index: UeIndex,
    pub pdu_sessions: Vec<PduSessionId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UeContextReleaseRequest {
    pub ue_index: UeIndex,
    pub pdu_sessions: Vec<PduSessionId>,
    pub cause: Cause,
}

/// Handover Request received at the target when the source is another CU-CP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoverRequest {
    pub amf_ue_ngap_id: AmfUeNgapId,
    pub target_pci: Pci,
    pub cause: Cause,
    pub security_key: [u8; 32],
    pub ue_security_capabilities: SecurityCapabilities,
    pub pdu_sessions: Vec<PduSessionResourceSetupItem>,
    pub source_to_target_transparent_container: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoverResourceAllocationResponse {
    pub success: bool,
    pub target_ue_index: Option<UeIndex>,
    pub pdu_sessions_admitted: Vec<PduSessionId>,
    pub pdu_sessions_failed: Vec<PduSessionFailedItem>,
    pub cause: Option<Cause>,
}
