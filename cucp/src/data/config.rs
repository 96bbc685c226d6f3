use super::{CipheringAlgorithm, IntegrityAlgorithm, SecurityIndication};
use anyhow::{Result, ensure};
use serde::Deserialize;
use slog::{Logger, error, info};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use xxap::FiveQi;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // Human readable gNB-CU-CP name
    pub name: Option<String>,

    // Registry capacities
    pub max_nof_ues: usize,
    pub max_nof_dus: usize,
    pub max_nof_cu_ups: usize,

    // Per UE user plane limits
    pub up_limits: UpLimits,

    // DRB templates, one per supported 5QI
    pub qos: Vec<QosConfig>,

    // Applied to PDU sessions whose setup request carries no security indication
    pub default_security_indication: SecurityIndication,

    // AS algorithm preference, most preferred first
    pub integrity_preference: Vec<IntegrityAlgorithm>,
    pub ciphering_preference: Vec<CipheringAlgorithm>,

    // How long a release request that races with a handover is deferred
    pub handover_ue_release_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct UpLimits {
    pub max_nof_pdu_sessions: usize,
    pub max_nof_drbs: usize,
    pub max_nof_qos_flows_per_drb: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RlcMode {
    Am,
    Um,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QosConfig {
    pub five_qi: FiveQi,
    pub rlc_mode: RlcMode,
    pub pdcp_sn_size: u8,
}

/// The subset of config that each UE's UP resource manager needs.
#[derive(Debug, Clone)]
pub struct UpResourceConfig {
    pub limits: UpLimits,
    pub qos: BTreeMap<FiveQi, QosConfig>,
    pub default_security_indication: SecurityIndication,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: None,
            max_nof_ues: 1024,
            max_nof_dus: 16,
            max_nof_cu_ups: 8,
            up_limits: UpLimits::default(),
            qos: vec![
                QosConfig {
                    five_qi: FiveQi(1),
                    rlc_mode: RlcMode::Um,
                    pdcp_sn_size: 12,
                },
                QosConfig {
                    five_qi: FiveQi(5),
                    rlc_mode: RlcMode::Am,
                    pdcp_sn_size: 12,
                },
                QosConfig {
                    five_qi: FiveQi(7),
                    rlc_mode: RlcMode::Um,
                    pdcp_sn_size: 12,
                },
                QosConfig {
                    five_qi: FiveQi(9),
                    rlc_mode: RlcMode::Am,
                    pdcp_sn_size: 18,
                },
            ],
            default_security_indication: SecurityIndication::default(),
            integrity_preference: vec![
                IntegrityAlgorithm::Nia2,
                IntegrityAlgorithm::Nia1,
                IntegrityAlgorithm::Nia3,
            ],
            ciphering_preference: vec![
                CipheringAlgorithm::Nea0,
                CipheringAlgorithm::Nea2,
                CipheringAlgorithm::Nea1,
                CipheringAlgorithm::Nea3,
            ],
            handover_ue_release_timeout_ms: 1000,
        }
    }
}

impl Default for UpLimits {
    fn default() -> Self {
        // TS38.331 maxDRB, maxNrofQFIs.
        UpLimits {
            max_nof_pdu_sessions: 16,
            max_nof_drbs: 29,
            max_nof_qos_flows_per_drb: 64,
        }
    }
}

impl Config {
    /// Load config from a TOML file.  Missing fields take their default values.
    pub fn load(filename: &str, logger: &Logger) -> Result<Config> {
        let path = std::env::current_dir()?;
        let contents = fs::read_to_string(filename).inspect_err(|e| {
            error!(
                logger,
                "Failed to load config file {filename} (current directory {}) with error code {e}",
                path.display()
            )
        })?;
        let config: Config = toml::from_str(&contents)?;
        config
            .validate()
            .inspect_err(|e| error!(logger, "Invalid config file {filename} - {e}"))?;
        info!(
            logger,
            "Loaded config from {filename} - {} 5QI templates, max {} UEs",
            config.qos.len(),
            config.max_nof_ues
        );
        Ok(config)
    }

    /// Reject DRB templates that no DU or CU-UP would accept.
    pub fn validate(&self) -> Result<()> {
        for q in &self.qos {
            ensure!(
                matches!(q.pdcp_sn_size, 12 | 18),
                "5QI {} has PDCP SN size {}, expected 12 or 18",
                q.five_qi.0,
                q.pdcp_sn_size
            );
        }
        Ok(())
    }

    pub fn up_resource_config(&self) -> UpResourceConfig {
        UpResourceConfig {
            limits: self.up_limits,
            qos: self.qos.iter().map(|q| (q.five_qi, *q)).collect(),
            default_security_indication: self.default_security_indication,
        }
    }

    pub fn handover_ue_release_timeout(&self) -> Duration {
        Duration::from_millis(self.handover_ue_release_timeout_ms)
    }
}
