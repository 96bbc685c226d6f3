use crate::{GtpTeid, GtpTunnel, TransportLayerAddress};
use anyhow::bail;
use bitvec::prelude::*;
use std::net::IpAddr;

impl From<IpAddr> for TransportLayerAddress {
    fn from(ip: IpAddr) -> Self {
        TransportLayerAddress(match ip {
            IpAddr::V4(x) => BitVec::<_, Msb0>::from_slice(&x.octets()),
            IpAddr::V6(x) => BitVec::<_, Msb0>::from_slice(&x.octets()),
        })
    }
}

impl TryFrom<&TransportLayerAddress> for IpAddr {
    type Error = anyhow::Error;
    fn try_from(addr: &TransportLayerAddress) -> Result<Self, anyhow::Error> {
        let bytes = addr.0.as_raw_slice();
        match bytes.len() {
            4 => {
                let arr: [u8; 4] = bytes.try_into()?;
                Ok(IpAddr::V4(arr.into()))
            }
            16 => {
                let arr: [u8; 16] = bytes.try_into()?;
                Ok(IpAddr::V6(arr.into()))
            }
            x => bail!("Bad length {}", x),
        }
    }
}

impl From<u32> for GtpTeid {
    fn from(teid: u32) -> Self {
        GtpTeid(teid.to_be_bytes())
    }
}

impl GtpTunnel {
    pub fn new(ip: IpAddr, teid: u32) -> Self {
        GtpTunnel {
            transport_layer_address: ip.into(),
            gtp_teid: teid.into(),
        }
    }
}

impl std::fmt::Display for TransportLayerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match IpAddr::try_from(self) {
            Ok(ip) => write!(f, "{}", ip),
            Err(_) => write!(f, "invalid"),
        }
    }
}

impl std::fmt::Display for GtpTeid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x?}", u32::from_be_bytes(self.0))
    }
}

impl std::fmt::Display for GtpTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.transport_layer_address, self.gtp_teid)
    }
}
