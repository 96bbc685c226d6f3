use crate::cu_up_repository::CuUpRepository;
use crate::data::{
    Config, CuUpIndex, DuIndex, GnbDuUeF1apId, Pci, Rnti, UeIndex, UeNotifiers,
};
use crate::du_repository::{DuRepository, DuSetup};
use crate::procedures::ue_tasks::{
    arm_handover_ue_release_timer, schedule_release_request, schedule_ue_task,
};
use crate::procedures::{
    AmfConnectionLossProcedure, CuUpRemovalProcedure, DuRemovalProcedure, HandoverProcedure,
    HandoverResponse, InitialContextSetupProcedure, InterCuHandoverTargetProcedure,
    PduSessionModifyProcedure, PduSessionReleaseProcedure, PduSessionSetupProcedure,
    ReestablishmentProcedure, ReestablishmentSourceProcedure, UeContextReleaseProcedure,
    UeProcedure, UeRemovalProcedure,
};
use crate::protocols::e1ap::E1apNotifier;
use crate::protocols::ngap::{
    HandoverRequest, HandoverResourceAllocationResponse, InitialContextSetupFailure,
    InitialContextSetupRequest, InitialContextSetupResponse, NgapNotifier,
    PduSessionResourceModifyRequest, PduSessionResourceModifyResponse,
    PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse,
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse, UeContextReleaseCommand,
    UeContextReleaseComplete,
};
use crate::ue_manager::{NewUe, Task, TaskScheduler, UeManager};
use crate::up_resource_manager::UpContext;
use crate::HandlerApi;
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use slog::{Logger, info, o, warn};
use std::sync::Arc;
use xxap::{Cause, CauseMisc, CauseRadioNetwork, PduSessionFailedItem, PduSessionId};

/// The CU-CP.  Every entry point either runs a routine on the queue of the UE it concerns, or on
/// the global queue for routines that span UEs.
#[derive(Clone)]
pub struct CuCp {
    config: Arc<Config>,
    ue_manager: Arc<UeManager>,
    du_repository: Arc<DuRepository>,
    cu_up_repository: Arc<CuUpRepository>,
    ngap: Arc<dyn NgapNotifier>,
    global_scheduler: TaskScheduler,
    logger: Logger,
}

impl CuCp {
    pub fn new(config: Config, ngap: Arc<dyn NgapNotifier>, logger: Logger) -> Self {
        let ue_manager = UeManager::new(
            config.max_nof_ues,
            config.up_resource_config(),
            logger.clone(),
        );
        info!(
            logger,
            "Started CU-CP {}",
            config.name.as_deref().unwrap_or("<none>")
        );
        CuCp {
            ue_manager: Arc::new(ue_manager),
            du_repository: Arc::new(DuRepository::new(config.max_nof_dus)),
            cu_up_repository: Arc::new(CuUpRepository::new(config.max_nof_cu_ups)),
            ngap,
            global_scheduler: TaskScheduler::spawn(logger.new(o!("queue" => "global"))),
            config: Arc::new(config),
            logger,
        }
    }

    /// Release every UE and stop the global queue.
    pub async fn graceful_shutdown(self) {
        info!(&self.logger, "Shutting down");
        let cause = Cause::Misc(CauseMisc::OmIntervention);
        join_all(self.ue_manager.ue_indices().into_iter().map(|ue_index| {
            self.schedule_and_wait(ue_index, move |api, logger| {
                async move {
                    if let Ok(ue) = UeProcedure::new(api, ue_index, logger) {
                        UeContextReleaseProcedure::new(ue).run(cause, true).await;
                    }
                }
                .boxed()
            })
        }))
        .await;
        self.global_scheduler.clear_pending_tasks();
    }

    pub fn add_du(&self, setup: DuSetup) -> Result<DuIndex> {
        let name = setup.name.clone();
        let du_index = self.du_repository.add_du(setup)?;
        info!(self.logger, "Added DU {}", name; "du_index" => du_index.0);
        Ok(du_index)
    }

    pub fn add_cu_up(&self, name: &str, e1ap: Arc<dyn E1apNotifier>) -> Result<CuUpIndex> {
        let cu_up_index = self.cu_up_repository.add_cu_up(name.to_string(), e1ap)?;
        info!(self.logger, "Added CU-UP {}", name; "cu_up_index" => cu_up_index.0);
        Ok(cu_up_index)
    }

    /// A DU reports a new UE.  None if the DU or cell is unknown or there is no room.
    pub async fn handle_new_ue(
        &self,
        du_index: DuIndex,
        pci: Pci,
        c_rnti: Rnti,
        du_ue_f1ap_id: GnbDuUeF1apId,
    ) -> Option<UeIndex> {
        self.add_ue(du_index, pci, Some(c_rnti), Some(du_ue_f1ap_id))
            .await
    }

    pub fn nof_ues(&self) -> usize {
        self.ue_manager.nof_ues()
    }

    pub fn nof_dus(&self) -> usize {
        self.du_repository.nof_dus()
    }

    pub fn nof_cu_ups(&self) -> usize {
        self.cu_up_repository.nof_cu_ups()
    }

    pub fn find_ue_by_pci_rnti(&self, pci: Pci, c_rnti: Rnti) -> Option<UeIndex> {
        self.ue_manager.find_by_pci_rnti(pci, c_rnti)
    }

    /// Snapshot of a UE's committed user plane state.
    pub fn ue_up_context(&self, ue_index: UeIndex) -> Option<UpContext> {
        self.ue_manager
            .with_ue(ue_index, |ue| ue.up_resources.context().clone())
    }

    // Run a routine on the UE's queue and wait for its result.  None if the UE is gone, or goes
    // before the routine gets to run.
    async fn schedule_and_wait<T, F>(&self, ue_index: UeIndex, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a CuCp, &'a Logger) -> BoxFuture<'a, T> + Send + 'static,
    {
        let (sender, receiver) = async_channel::bounded(1);
        let scheduled = schedule_ue_task(self, ue_index, move |api, logger| {
            async move {
                let result = f(api, logger).await;
                let _ = sender.send(result).await;
            }
            .boxed()
        });
        if !scheduled {
            warn!(self.logger, "UE {} not found or being removed", ue_index);
            return None;
        }
        receiver.recv().await.ok()
    }

    async fn run_global<F>(&self, f: F) -> bool
    where
        F: for<'a> FnOnce(&'a CuCp, &'a Logger) -> BoxFuture<'a, ()> + Send + 'static,
    {
        let (sender, receiver) = async_channel::bounded(1);
        let api = self.clone();
        let task = async move {
            f(&api, &api.logger).await;
            let _ = sender.send(()).await;
        }
        .boxed();
        self.schedule_global_task(task) && receiver.recv().await.is_ok()
    }

    pub async fn handle_initial_context_setup_request(
        &self,
        r: InitialContextSetupRequest,
    ) -> Result<InitialContextSetupResponse, InitialContextSetupFailure> {
        let ue_index = r.ue_index;
        let session_ids: Vec<_> = r
            .pdu_sessions_to_setup
            .iter()
            .map(|s| s.pdu_session_id)
            .collect();
        let task_session_ids = session_ids.clone();
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).map_err(|e| {
                    initial_context_setup_failure(ue_index, task_session_ids, e.cause())
                })?;
                InitialContextSetupProcedure::new(ue).run(r).await
            }
            .boxed()
        })
        .await
        .unwrap_or_else(|| Err(initial_context_setup_failure(ue_index, session_ids, ue_gone())))
    }

    pub async fn handle_pdu_session_resource_setup_request(
        &self,
        r: PduSessionResourceSetupRequest,
    ) -> PduSessionResourceSetupResponse {
        let ue_index = r.ue_index;
        let session_ids: Vec<_> = r.pdu_sessions.iter().map(|s| s.pdu_session_id).collect();
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                Some(PduSessionSetupProcedure::new(ue).run(r).await)
            }
            .boxed()
        })
        .await
        .flatten()
        .unwrap_or_else(|| PduSessionResourceSetupResponse {
            ue_index,
            pdu_sessions_setup: vec![],
            pdu_sessions_failed: failed_items(session_ids, ue_gone()),
        })
    }

    pub async fn handle_pdu_session_resource_modify_request(
        &self,
        r: PduSessionResourceModifyRequest,
    ) -> PduSessionResourceModifyResponse {
        let ue_index = r.ue_index;
        let session_ids: Vec<_> = r.pdu_sessions.iter().map(|s| s.pdu_session_id).collect();
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                Some(PduSessionModifyProcedure::new(ue).run(r).await)
            }
            .boxed()
        })
        .await
        .flatten()
        .unwrap_or_else(|| PduSessionResourceModifyResponse {
            ue_index,
            pdu_sessions_modified: vec![],
            pdu_sessions_failed: failed_items(session_ids, ue_gone()),
        })
    }

    pub async fn handle_pdu_session_resource_release_command(
        &self,
        r: PduSessionResourceReleaseCommand,
    ) -> PduSessionResourceReleaseResponse {
        let ue_index = r.ue_index;
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                Some(PduSessionReleaseProcedure::new(ue).run(r).await)
            }
            .boxed()
        })
        .await
        .flatten()
        .unwrap_or(PduSessionResourceReleaseResponse {
            ue_index,
            pdu_sessions_released: vec![],
        })
    }

    /// The AMF releases the UE.  An unknown UE is reported as released with no sessions.
    pub async fn handle_ue_context_release_command(
        &self,
        r: UeContextReleaseCommand,
    ) -> UeContextReleaseComplete {
        let ue_index = r.ue_index;
        let pdu_sessions = self
            .schedule_and_wait(ue_index, move |api, logger| {
                async move {
                    let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                    Some(UeContextReleaseProcedure::new(ue).run(r.cause, true).await)
                }
                .boxed()
            })
            .await
            .flatten()
            .unwrap_or_default();
        UeContextReleaseComplete {
            ue_index,
            pdu_sessions,
        }
    }

    /// The RAN side wants the UE released, e.g. on radio link failure.  Deferred while the UE
    /// is the source of a handover.  Returns false if the UE is unknown.
    pub fn handle_ue_context_release_request(&self, ue_index: UeIndex, cause: Cause) -> bool {
        let Some(ho_in_progress) = self.ue_manager.with_ue(ue_index, |ue| ue.ho_in_progress)
        else {
            warn!(self.logger, "Release request for unknown UE {}", ue_index);
            return false;
        };
        if ho_in_progress {
            arm_handover_ue_release_timer(self, ue_index, cause)
        } else {
            schedule_release_request(self, ue_index, cause)
        }
    }

    /// Remove a UE without any signaling to the DU, e.g. because it never completed RRC setup.
    pub async fn handle_ue_removal_request(&self, ue_index: UeIndex) -> bool {
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let Ok(ue) = UeProcedure::new(api, ue_index, logger) else {
                    return false;
                };
                UeRemovalProcedure::new(ue).run().await;
                true
            }
            .boxed()
        })
        .await
        .unwrap_or(false)
    }

    /// Intra-DU if the target cell is on the UE's own DU, inter-DU otherwise.
    pub async fn handle_intra_cu_handover_request(
        &self,
        ue_index: UeIndex,
        target_pci: Pci,
    ) -> HandoverResponse {
        if let Some(du_index) = self.ue_manager.with_ue(ue_index, |ue| ue.du_index) {
            let kind = if self.du_repository.serves(du_index, target_pci) {
                "Intra-DU"
            } else {
                "Inter-DU"
            };
            info!(self.logger, "{kind} handover of UE {} to cell {}", ue_index, target_pci.0);
        }
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                Some(HandoverProcedure::new(ue).run(target_pci).await)
            }
            .boxed()
        })
        .await
        .flatten()
        .unwrap_or_else(|| HandoverResponse::failure(ue_gone()))
    }

    /// Handover in from another CU-CP.  The target UE is removed again if the handover is
    /// refused.
    pub async fn handle_inter_cu_handover_request(
        &self,
        r: HandoverRequest,
    ) -> HandoverResourceAllocationResponse {
        let session_ids: Vec<_> = r.pdu_sessions.iter().map(|s| s.pdu_session_id).collect();
        let refuse = |cause: Cause| HandoverResourceAllocationResponse {
            success: false,
            target_ue_index: None,
            pdu_sessions_admitted: vec![],
            pdu_sessions_failed: failed_items(session_ids.clone(), cause),
            cause: Some(cause),
        };
        let Some(du_index) = self.du_repository.find_du_by_pci(r.target_pci) else {
            warn!(self.logger, "Handover request for unknown cell {}", r.target_pci.0);
            return refuse(Cause::RadioNetwork(CauseRadioNetwork::Unspecified));
        };
        let Some(ue_index) = self.add_ue(du_index, r.target_pci, None, None).await else {
            return refuse(Cause::RadioNetwork(
                CauseRadioNetwork::RadioResourcesNotAvailable,
            ));
        };
        self.schedule_and_wait(ue_index, move |api, logger| {
            async move {
                let ue = UeProcedure::new(api, ue_index, logger).ok()?;
                let rsp = InterCuHandoverTargetProcedure::new(ue).run(r).await;
                if !rsp.success {
                    if let Ok(ue) = UeProcedure::new(api, ue_index, logger) {
                        UeRemovalProcedure::new(ue).run().await;
                    }
                }
                Some(rsp)
            }
            .boxed()
        })
        .await
        .flatten()
        .unwrap_or_else(|| refuse(ue_gone()))
    }

    /// A UE known as `new_ue_index` asks to re-establish the connection it had as
    /// (`old_pci`, `old_c_rnti`).  False tells the caller to fall back to RRC setup.
    pub async fn handle_rrc_reestablishment(
        &self,
        new_ue_index: UeIndex,
        old_pci: Pci,
        old_c_rnti: Rnti,
    ) -> bool {
        let Some(old_ue_index) = self.ue_manager.find_by_pci_rnti(old_pci, old_c_rnti) else {
            info!(self.logger, "Re-establishment from unknown UE, pci {} c-rnti {}", old_pci.0, old_c_rnti.0);
            return false;
        };
        if old_ue_index == new_ue_index {
            return false;
        }
        if self.ue_manager.with_ue(new_ue_index, |_| ()).is_none() {
            return false;
        }

        // The old UE gives up its context on its own queue, after any routine already running
        // there.
        let Some(context) = self
            .schedule_and_wait(old_ue_index, move |api, logger| {
                async move {
                    let ue = UeProcedure::new(api, old_ue_index, logger).ok()?;
                    ReestablishmentSourceProcedure::new(ue).run()
                }
                .boxed()
            })
            .await
            .flatten()
        else {
            return false;
        };

        self.schedule_and_wait(new_ue_index, move |api, logger| {
            async move {
                match UeProcedure::new(api, new_ue_index, logger) {
                    Ok(ue) => ReestablishmentProcedure::new(ue).run(context).await,
                    Err(_) => false,
                }
            }
            .boxed()
        })
        .await
        .unwrap_or(false)
    }

    pub async fn handle_e1_link_loss(&self, cu_up_index: CuUpIndex) -> bool {
        self.run_global(move |api, logger| {
            async move {
                CuUpRemovalProcedure::new(api, logger)
                    .run(cu_up_index)
                    .await
            }
            .boxed()
        })
        .await
    }

    pub async fn handle_f1_link_loss(&self, du_index: DuIndex) -> bool {
        self.run_global(move |api, logger| {
            async move { DuRemovalProcedure::new(api, logger).run(du_index).await }.boxed()
        })
        .await
    }

    pub async fn handle_amf_connection_loss(&self) -> bool {
        self.run_global(|api, logger| {
            async move { AmfConnectionLossProcedure::new(api, logger).run().await }.boxed()
        })
        .await
    }
}

#[async_trait]
impl HandlerApi for CuCp {
    fn config(&self) -> &Config {
        &self.config
    }

    fn ue_manager(&self) -> &UeManager {
        &self.ue_manager
    }

    fn du_repository(&self) -> &DuRepository {
        &self.du_repository
    }

    fn cu_up_repository(&self) -> &CuUpRepository {
        &self.cu_up_repository
    }

    fn ngap(&self) -> &Arc<dyn NgapNotifier> {
        &self.ngap
    }

    async fn add_ue(
        &self,
        du_index: DuIndex,
        pci: Pci,
        c_rnti: Option<Rnti>,
        du_ue_f1ap_id: Option<GnbDuUeF1apId>,
    ) -> Option<UeIndex> {
        let Some((f1ap, rrc)) = self.du_repository.notifiers(du_index) else {
            warn!(self.logger, "Can't add UE - unknown DU {}", du_index.0);
            return None;
        };
        if !self.du_repository.serves(du_index, pci) {
            warn!(self.logger, "Can't add UE - DU {} doesn't serve cell {}", du_index.0, pci.0);
            return None;
        }
        let new_ue = NewUe {
            du_index,
            pci,
            c_rnti,
            du_ue_f1ap_id,
            notifiers: UeNotifiers {
                f1ap,
                rrc,
                e1ap: None,
                ngap: self.ngap.clone(),
            },
        };
        self.ue_manager.add_ue(new_ue).await
    }

    fn schedule_global_task(&self, task: Task) -> bool {
        self.global_scheduler.schedule(task)
    }
}

fn ue_gone() -> Cause {
    Cause::RadioNetwork(CauseRadioNetwork::UnknownLocalUeId)
}

fn failed_items(ids: Vec<PduSessionId>, cause: Cause) -> Vec<PduSessionFailedItem> {
    ids.into_iter()
        .map(|pdu_session_id| PduSessionFailedItem {
            pdu_session_id,
            cause,
        })
        .collect()
}

fn initial_context_setup_failure(
    ue_index: UeIndex,
    session_ids: Vec<PduSessionId>,
    cause: Cause,
) -> InitialContextSetupFailure {
    InitialContextSetupFailure {
        ue_index,
        cause,
        pdu_sessions_failed: failed_items(session_ids, cause),
    }
}
