//! ue_tasks - queueing routines on a UE's task scheduler from outside that UE's own routines

use super::HandlerApi;
use super::ue_procedures::{
    UeContextReleaseProcedure, UeContextReleaseRequestProcedure, UeProcedure,
};
use crate::data::UeIndex;
use futures::FutureExt;
use futures::future::BoxFuture;
use slog::{Logger, debug, info};
use stop_token::StopSource;
use stop_token::future::FutureExt as _;
use xxap::Cause;

/// Queue a task that runs with the UE's logger.  False if the UE is gone or being torn down.
pub fn schedule_ue_task<A, F>(api: &A, ue_index: UeIndex, f: F) -> bool
where
    A: HandlerApi,
    F: for<'a> FnOnce(&'a A, &'a Logger) -> BoxFuture<'a, ()> + Send + 'static,
{
    let Some(logger) = api.ue_manager().with_ue(ue_index, |ue| ue.logger.clone()) else {
        return false;
    };
    let task_api = api.clone();
    api.ue_manager().schedule(
        ue_index,
        async move {
            f(&task_api, &logger).await;
        }
        .boxed(),
    )
}

pub fn schedule_release_request<A: HandlerApi>(api: &A, ue_index: UeIndex, cause: Cause) -> bool {
    schedule_ue_task(api, ue_index, move |api, logger| {
        async move {
            if let Ok(ue) = UeProcedure::new(api, ue_index, logger) {
                UeContextReleaseRequestProcedure::new(ue).run(cause).await;
            }
        }
        .boxed()
    })
}

pub fn schedule_ue_context_release<A: HandlerApi>(
    api: &A,
    ue_index: UeIndex,
    cause: Cause,
    rrc_release: bool,
) -> bool {
    schedule_ue_task(api, ue_index, move |api, logger| {
        async move {
            if let Ok(ue) = UeProcedure::new(api, ue_index, logger) {
                UeContextReleaseProcedure::new(ue)
                    .run(cause, rrc_release)
                    .await;
            }
        }
        .boxed()
    })
}

/// Defer a release that raced with a handover of this UE.  If the timer expires, a UE context
/// release is queued.  Removing the UE, which is what a successful handover does to its source,
/// cancels the timer.
pub fn arm_handover_ue_release_timer<A: HandlerApi>(
    api: &A,
    ue_index: UeIndex,
    cause: Cause,
) -> bool {
    let stop_source = StopSource::new();
    let stop_token = stop_source.token();
    let Some(logger) = api.ue_manager().with_ue_mut(ue_index, |ue| {
        ue.handover_ue_release_timer = Some(stop_source);
        ue.logger.clone()
    }) else {
        return false;
    };

    let timeout = api.config().handover_ue_release_timeout();
    info!(
        logger,
        "Handover in progress, defer release by {}ms",
        timeout.as_millis()
    );
    let api = api.clone();
    async_std::task::spawn(async move {
        if async_std::task::sleep(timeout)
            .timeout_at(stop_token)
            .await
            .is_ok()
        {
            info!(logger, "Handover UE release timer expired");
            schedule_ue_context_release(&api, ue_index, cause, true);
        } else {
            debug!(logger, "Handover UE release timer cancelled");
        }
    });
    true
}
