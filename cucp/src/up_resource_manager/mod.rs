//! up_resource_manager - per UE bookkeeping of PDU sessions, DRBs and QoS flows
//!
//! Routines never edit a UE's UP context directly.  They ask for an [`UpConfigUpdate`], walk the
//! collaborators through it, and only once every one of them has accepted do they apply the
//! confirmed [`UpConfigUpdateResult`].

mod types;
mod update;

use crate::data::UpResourceConfig;
use crate::protocols::ngap::{
    PduSessionResourceModifyRequest, PduSessionResourceReleaseCommand,
    PduSessionResourceSetupRequest,
};
use std::sync::Arc;
pub use types::*;
pub use update::InvalidRequest;
use xxap::{DrbId, PduSessionId};

/// Anything that can be turned into an [`UpConfigUpdate`].
#[derive(Clone, Copy, Debug)]
pub enum UpResourceRequest<'a> {
    Setup(&'a PduSessionResourceSetupRequest),
    Modify(&'a PduSessionResourceModifyRequest),
    Release(&'a PduSessionResourceReleaseCommand),
    // A whole context moving in from another UE, on handover.
    Transfer(&'a UpConfigUpdate),
}

impl<'a> From<&'a PduSessionResourceSetupRequest> for UpResourceRequest<'a> {
    fn from(r: &'a PduSessionResourceSetupRequest) -> Self {
        UpResourceRequest::Setup(r)
    }
}

impl<'a> From<&'a PduSessionResourceModifyRequest> for UpResourceRequest<'a> {
    fn from(r: &'a PduSessionResourceModifyRequest) -> Self {
        UpResourceRequest::Modify(r)
    }
}

impl<'a> From<&'a PduSessionResourceReleaseCommand> for UpResourceRequest<'a> {
    fn from(r: &'a PduSessionResourceReleaseCommand) -> Self {
        UpResourceRequest::Release(r)
    }
}

impl<'a> From<&'a UpConfigUpdate> for UpResourceRequest<'a> {
    fn from(r: &'a UpConfigUpdate) -> Self {
        UpResourceRequest::Transfer(r)
    }
}

#[derive(Debug, Clone)]
pub struct UpResourceManager {
    config: Arc<UpResourceConfig>,
    context: UpContext,
}

impl UpResourceManager {
    pub fn new(config: Arc<UpResourceConfig>) -> Self {
        UpResourceManager {
            config,
            context: UpContext::default(),
        }
    }

    fn evaluate(&self, request: UpResourceRequest) -> update::UpdateResult {
        match request {
            UpResourceRequest::Setup(r) => update::setup(&self.context, &self.config, r),
            UpResourceRequest::Modify(r) => update::modify(&self.context, &self.config, r),
            UpResourceRequest::Release(r) => update::release(&self.context, r),
            UpResourceRequest::Transfer(r) => update::transfer(&self.context, &self.config, r),
        }
    }

    /// Check a request against the current context and the configured limits, returning the
    /// reason for rejecting it.
    pub fn check_request<'a>(
        &self,
        request: impl Into<UpResourceRequest<'a>>,
    ) -> Result<(), InvalidRequest> {
        self.evaluate(request.into()).map(|_| ())
    }

    pub fn validate_request<'a>(&self, request: impl Into<UpResourceRequest<'a>>) -> bool {
        self.check_request(request).is_ok()
    }

    /// Work out the delta needed to carry out a request.  Does not change the context.  A request
    /// that does not pass [`Self::validate_request`] yields an empty update.
    pub fn calculate_update<'a>(&self, request: impl Into<UpResourceRequest<'a>>) -> UpConfigUpdate {
        self.evaluate(request.into()).unwrap_or_default()
    }

    /// Merge a confirmed result into the context.  Applying the same result twice has the same
    /// effect as applying it once.
    pub fn apply_config_update(&mut self, result: &UpConfigUpdateResult) {
        let sessions = &mut self.context.pdu_sessions;

        for added in &result.pdu_sessions_added {
            let session = sessions
                .entry(added.pdu_session_id)
                .or_insert_with(|| PduSessionContext {
                    pdu_session_id: added.pdu_session_id,
                    snssai: added.snssai,
                    pdu_session_type: added.pdu_session_type,
                    security_indication: added.security_indication,
                    security_result: None,
                    ul_ngu_tunnel: added.ul_ngu_tunnel.clone(),
                    dl_ngu_tunnel: None,
                    drbs: Default::default(),
                });
            merge_session(session, added);
        }

        for modified in &result.pdu_sessions_modified {
            if let Some(session) = sessions.get_mut(&modified.pdu_session_id) {
                merge_session(session, modified);
            }
        }

        for id in &result.pdu_sessions_removed {
            sessions.remove(id);
        }

        // A session without DRBs carries no traffic.
        sessions.retain(|_, session| !session.drbs.is_empty());
        self.context.rebuild_indices();
    }

    pub fn context(&self) -> &UpContext {
        &self.context
    }

    /// Replace the whole context, e.g. when seeding a handover target.
    pub fn set_context(&mut self, context: UpContext) {
        self.context = context;
        self.context.rebuild_indices();
    }

    pub fn pdu_session(&self, id: PduSessionId) -> Option<&PduSessionContext> {
        self.context.pdu_sessions.get(&id)
    }

    pub fn has_pdu_session(&self, id: PduSessionId) -> bool {
        self.context.pdu_sessions.contains_key(&id)
    }

    pub fn pdu_session_ids(&self) -> Vec<PduSessionId> {
        self.context.pdu_sessions.keys().copied().collect()
    }

    pub fn nof_pdu_sessions(&self) -> usize {
        self.context.pdu_sessions.len()
    }

    pub fn drb(&self, id: DrbId) -> Option<&DrbContext> {
        let session_id = self.context.drb_map.get(&id)?;
        self.context.pdu_sessions.get(session_id)?.drbs.get(&id)
    }

    pub fn drb_ids(&self) -> Vec<DrbId> {
        self.context.drb_map.keys().copied().collect()
    }

    /// The DRBs that releasing the given sessions would take down.
    pub fn drbs_of_sessions(&self, ids: &[PduSessionId]) -> Vec<DrbId> {
        ids.iter()
            .filter_map(|id| self.context.pdu_sessions.get(id))
            .flat_map(|session| session.drbs.keys().copied())
            .collect()
    }
}

fn merge_session(session: &mut PduSessionContext, update: &PduSessionUpdate) {
    if update.dl_ngu_tunnel.is_some() {
        session.dl_ngu_tunnel = update.dl_ngu_tunnel.clone();
    }
    if update.security_result.is_some() {
        session.security_result = update.security_result;
    }
    for (id, drb) in update.drbs_to_add.iter().chain(update.drbs_to_modify.iter()) {
        session.drbs.insert(*id, drb.clone());
    }
    for id in &update.drbs_to_remove {
        session.drbs.remove(id);
    }
}

/// Express a whole context as an update that would recreate it from scratch.
pub fn to_config_update(context: &UpContext) -> UpConfigUpdate {
    UpConfigUpdate {
        initial_context_creation: true,
        pdu_sessions_to_setup: context
            .pdu_sessions
            .iter()
            .map(|(id, session)| {
                let mut update = PduSessionUpdate::from_context(session);
                update.drbs_to_add = session.drbs.clone();
                (*id, update)
            })
            .collect(),
        pdu_sessions_to_modify: Default::default(),
        pdu_sessions_to_remove: vec![],
    }
}
