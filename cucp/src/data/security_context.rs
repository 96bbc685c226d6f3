//! security_context - the AS security state handed between RRC, the CU-UP and handover targets
//!
//! Key material is opaque to the CU-CP core.  The only logic here is algorithm selection.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityAlgorithm {
    Nia0,
    Nia1,
    Nia2,
    Nia3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipheringAlgorithm {
    Nea0,
    Nea1,
    Nea2,
    Nea3,
}

/// The UE's NR security capabilities as signaled by the AMF.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityCapabilities {
    pub nr_integrity_algorithms: Vec<IntegrityAlgorithm>,
    pub nr_encryption_algorithms: Vec<CipheringAlgorithm>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityContext {
    pub k_gnb: [u8; 32],
    pub integrity_algorithm: IntegrityAlgorithm,
    pub ciphering_algorithm: CipheringAlgorithm,
    pub next_hop_chaining_count: u8,
}

impl SecurityContext {
    /// Select the AS algorithms by walking our preference lists in order and picking the first
    /// that the UE supports.  NIA0 is never selected (TS33.501, 5.3.3).
    pub fn select(
        k_gnb: [u8; 32],
        capabilities: &SecurityCapabilities,
        integrity_preference: &[IntegrityAlgorithm],
        ciphering_preference: &[CipheringAlgorithm],
    ) -> Option<Self> {
        let integrity_algorithm = integrity_preference
            .iter()
            .filter(|x| **x != IntegrityAlgorithm::Nia0)
            .find(|x| capabilities.nr_integrity_algorithms.contains(x))?;

        // NEA0 is always supported by the UE.
        let ciphering_algorithm = ciphering_preference
            .iter()
            .find(|x| {
                **x == CipheringAlgorithm::Nea0 || capabilities.nr_encryption_algorithms.contains(x)
            })
            .copied()
            .unwrap_or(CipheringAlgorithm::Nea0);

        Some(SecurityContext {
            k_gnb,
            integrity_algorithm: *integrity_algorithm,
            ciphering_algorithm,
            next_hop_chaining_count: 0,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationLevel {
    Required,
    Preferred,
    NotNeeded,
}

/// Per PDU session user plane security indication (TS38.413, 9.3.1.27).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SecurityIndication {
    pub integrity_protection: IndicationLevel,
    pub confidentiality_protection: IndicationLevel,
}

impl Default for SecurityIndication {
    fn default() -> Self {
        SecurityIndication {
            integrity_protection: IndicationLevel::NotNeeded,
            confidentiality_protection: IndicationLevel::Required,
        }
    }
}

impl SecurityIndication {
    /// Whether the AMF needs to be told what was actually performed.  This is only the case
    /// when it left the decision to us.
    pub fn requests_result(&self) -> bool {
        self.integrity_protection == IndicationLevel::Preferred
            || self.confidentiality_protection == IndicationLevel::Preferred
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityResult {
    pub integrity_protection_performed: bool,
    pub confidentiality_protection_performed: bool,
}

impl SecurityResult {
    /// Resolve what was performed for a session.  Required and not-needed are determined by the
    /// indication itself.  Preferred is whatever the CU-UP reported, or not performed if it
    /// didn't say.
    pub fn resolve(indication: &SecurityIndication, reported: Option<SecurityResult>) -> Self {
        let resolve_one = |level: IndicationLevel, reported: Option<bool>| match level {
            IndicationLevel::Required => true,
            IndicationLevel::NotNeeded => false,
            IndicationLevel::Preferred => reported.unwrap_or(false),
        };
        SecurityResult {
            integrity_protection_performed: resolve_one(
                indication.integrity_protection,
                reported.map(|r| r.integrity_protection_performed),
            ),
            confidentiality_protection_performed: resolve_one(
                indication.confidentiality_protection,
                reported.map(|r| r.confidentiality_protection_performed),
            ),
        }
    }
}
