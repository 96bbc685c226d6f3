use crate::{EventLog, MockAmf, MockCuUp, MockDu};
use anyhow::{Result, bail};
use async_std::task::sleep;
use cucp::protocols::ngap::*;
use cucp::{
    AmfUeNgapId, CipheringAlgorithm, Config, CuCp, CuUpIndex, DuIndex, DuSetup, GnbDuUeF1apId,
    IntegrityAlgorithm, Pci, Rnti, SecurityCapabilities, UeIndex,
};
use slog::{Drain, Logger, o};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use xxap::{Cause, CauseRadioNetwork, FiveQi, GtpTunnel, PduSessionId, PduSessionType, QosFlowId, Snssai};

// Cells served by the two mock DUs.
pub const DU1_CELL_A: Pci = Pci(1);
pub const DU1_CELL_B: Pci = Pci(2);
pub const DU2_CELL: Pci = Pci(3);

/// A CU-CP wired up to two mock DUs, one mock CU-UP and a mock AMF, all recording into the
/// same event log.
pub struct TestCuCp {
    pub cucp: CuCp,
    pub du1: Arc<MockDu>,
    pub du2: Arc<MockDu>,
    pub cu_up: Arc<MockCuUp>,
    pub amf: Arc<MockAmf>,
    pub du1_index: DuIndex,
    pub du2_index: DuIndex,
    pub cu_up_index: CuUpIndex,
    pub events: EventLog,
    pub logger: Logger,
    next_rnti: AtomicU16,
}

pub fn init() -> Result<TestCuCp> {
    exit_on_panic();
    let logger = init_logging();
    let config = Config::load("test_config.toml", &logger)?;
    let events = EventLog::default();

    let du1 = Arc::new(MockDu::new(1, events.clone(), &logger));
    let du2 = Arc::new(MockDu::new(2, events.clone(), &logger));
    let cu_up = Arc::new(MockCuUp::new(events.clone(), &logger));
    let amf = Arc::new(MockAmf::new(events.clone(), &logger));

    let cucp = CuCp::new(config, amf.clone(), logger.new(o!("cucp" => 1)));
    let du1_index = cucp.add_du(DuSetup {
        name: "du-1".to_string(),
        served_cells: vec![DU1_CELL_A, DU1_CELL_B],
        f1ap: du1.clone(),
        rrc: du1.clone(),
    })?;
    let du2_index = cucp.add_du(DuSetup {
        name: "du-2".to_string(),
        served_cells: vec![DU2_CELL],
        f1ap: du2.clone(),
        rrc: du2.clone(),
    })?;
    let cu_up_index = cucp.add_cu_up("cu-up-1", cu_up.clone())?;

    Ok(TestCuCp {
        cucp,
        du1,
        du2,
        cu_up,
        amf,
        du1_index,
        du2_index,
        cu_up_index,
        events,
        logger,
        next_rnti: AtomicU16::new(0x100),
    })
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

fn init_logging() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

impl TestCuCp {
    /// A UE arrives at the given DU and cell, as it would after RRC Setup.
    pub async fn new_ue(&self, du_index: DuIndex, pci: Pci) -> Result<UeIndex> {
        let rnti = self.next_rnti.fetch_add(1, Ordering::Relaxed);
        let Some(ue_index) = self
            .cucp
            .handle_new_ue(du_index, pci, Rnti(rnti), GnbDuUeF1apId(rnti as u32))
            .await
        else {
            bail!("CU-CP refused new UE on cell {}", pci.0)
        };
        Ok(ue_index)
    }

    /// The C-RNTI that `new_ue` most recently handed out.
    pub fn last_rnti(&self) -> Rnti {
        Rnti(self.next_rnti.load(Ordering::Relaxed) - 1)
    }

    /// Take a UE through initial context setup with no PDU sessions.
    pub async fn attach(&self, ue_index: UeIndex) -> Result<()> {
        if let Err(failure) = self
            .cucp
            .handle_initial_context_setup_request(initial_context_setup_request(ue_index, vec![]))
            .await
        {
            bail!("Initial context setup failed - {:?}", failure.cause)
        }
        Ok(())
    }

    /// A UE on DU 1 with security, an AMF context and the given PDU sessions.  History is
    /// cleared afterwards.
    pub async fn attached_ue_with_sessions(&self, ids: &[u8]) -> Result<UeIndex> {
        let ue_index = self.new_ue(self.du1_index, DU1_CELL_A).await?;
        self.attach(ue_index).await?;
        if !ids.is_empty() {
            let rsp = self
                .cucp
                .handle_pdu_session_resource_setup_request(setup_request(
                    ue_index,
                    ids.iter().map(|id| session(*id, 9)).collect(),
                ))
                .await;
            if !rsp.pdu_sessions_failed.is_empty() {
                bail!("PDU session setup failed - {:?}", rsp.pdu_sessions_failed)
            }
        }
        self.clear_history();
        Ok(ue_index)
    }

    /// Forget all events and recorded requests, e.g. once a test's preconditions are set up.
    pub fn clear_history(&self) {
        self.events.clear();
        self.du1.clear_records();
        self.du2.clear_records();
        self.cu_up.clear_records();
    }

    /// Poll until the condition holds.  Release requests and timers are fire and forget, so
    /// tests have to wait for their effects.
    pub async fn wait_until(&self, what: &str, f: impl Fn(&TestCuCp) -> bool) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !f(self) {
            if Instant::now() > deadline {
                bail!("Timed out waiting until {what}")
            }
            sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }

    pub fn ue_exists(&self, ue_index: UeIndex) -> bool {
        self.cucp.ue_up_context(ue_index).is_some()
    }
}

pub fn upf_tunnel(teid: u32) -> GtpTunnel {
    GtpTunnel::new(IpAddr::V4(Ipv4Addr::new(127, 0, 3, 1)), teid)
}

pub fn qos_flow(id: u8, five_qi: u16) -> QosFlowSetupRequestItem {
    QosFlowSetupRequestItem {
        qos_flow_id: QosFlowId(id),
        qos_params: QosFlowLevelQosParameters {
            five_qi: FiveQi(five_qi),
            arp_priority_level: 8,
            gbr: None,
        },
    }
}

/// A PDU session with a single QoS flow, whose ID is the same as the session ID.
pub fn session(id: u8, five_qi: u16) -> PduSessionResourceSetupItem {
    PduSessionResourceSetupItem {
        pdu_session_id: PduSessionId(id),
        snssai: Snssai(1, None),
        pdu_session_type: PduSessionType::Ipv4,
        ul_ngu_tunnel: upf_tunnel(id as u32),
        security_indication: None,
        qos_flows: vec![qos_flow(id, five_qi)],
        nas_pdu: Some(vec![0x7e, id]),
    }
}

pub fn setup_request(
    ue_index: UeIndex,
    pdu_sessions: Vec<PduSessionResourceSetupItem>,
) -> PduSessionResourceSetupRequest {
    PduSessionResourceSetupRequest {
        ue_index,
        pdu_sessions,
        ue_aggregate_maximum_bit_rate_dl: None,
    }
}

pub fn release_command(ue_index: UeIndex, ids: &[u8]) -> PduSessionResourceReleaseCommand {
    PduSessionResourceReleaseCommand {
        ue_index,
        pdu_sessions_to_release: ids.iter().map(|id| PduSessionId(*id)).collect(),
        nas_pdu: None,
        cause: Cause::RadioNetwork(CauseRadioNetwork::Unspecified),
    }
}

pub fn security_capabilities() -> SecurityCapabilities {
    SecurityCapabilities {
        nr_integrity_algorithms: vec![IntegrityAlgorithm::Nia1, IntegrityAlgorithm::Nia2],
        nr_encryption_algorithms: vec![CipheringAlgorithm::Nea1, CipheringAlgorithm::Nea2],
    }
}

pub fn initial_context_setup_request(
    ue_index: UeIndex,
    pdu_sessions_to_setup: Vec<PduSessionResourceSetupItem>,
) -> InitialContextSetupRequest {
    InitialContextSetupRequest {
        ue_index,
        amf_ue_ngap_id: AmfUeNgapId(1000 + ue_index.0 as u64),
        security_key: [0x5a; 32],
        ue_security_capabilities: security_capabilities(),
        pdu_sessions_to_setup,
        ue_aggregate_maximum_bit_rate_dl: None,
        ue_radio_capability: None,
        nas_pdu: Some(vec![0x7e, 0x00]),
    }
}
