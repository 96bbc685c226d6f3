//! ies - information elements that appear on more than one reference point

use bitvec::prelude::*;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransportLayerAddress(pub BitVec<u8, Msb0>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GtpTeid(pub [u8; 4]);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GtpTunnel {
    pub transport_layer_address: TransportLayerAddress,
    pub gtp_teid: GtpTeid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PduSessionId(pub u8);

/// Data radio bearer ID.  Valid values are 1..=32 (TS38.331, DRB-Identity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrbId(pub u8);

impl DrbId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SrbId(pub u8);

impl SrbId {
    pub const SRB0: SrbId = SrbId(0);
    pub const SRB1: SrbId = SrbId(1);
    pub const SRB2: SrbId = SrbId(2);
}

/// QoS flow identifier (QFI), 0..=63.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QosFlowId(pub u8);

impl QosFlowId {
    pub const MAX: u8 = 63;

    pub fn is_valid(&self) -> bool {
        self.0 <= Self::MAX
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct FiveQi(pub u16);

/// Slice selector - SST and optional SD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Snssai(pub u8, pub Option<[u8; 3]>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PduSessionType {
    Ipv4,
    Ipv6,
    Ipv4v6,
    Ethernet,
    Unstructured,
}

/// A PDU session that could not be set up, modified or released, and why.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PduSessionFailedItem {
    pub pdu_session_id: PduSessionId,
    pub cause: crate::Cause,
}
