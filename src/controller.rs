// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bastion controller.
//!
//! Wires [`reconcile_bastion`] and [`delete_bastion`] into a
//! `kube::runtime::Controller`. The finalizer is added before the first pass
//! touches the cloud, and removed only once teardown succeeded.
//!
//! | Verdict            | Action                                  |
//! |--------------------|-----------------------------------------|
//! | `Success`          | `await_change()`                        |
//! | `RequeueAfter(d)`  | `requeue(d)`                            |
//! | `Failed(e)`        | `lastError` recorded, error policy runs |

use crate::constants::{BASTION_FINALIZER, ERROR_REQUEUE_DURATION_SECS, KIND_BASTION};
use crate::context::Context;
use crate::crd::{Bastion, BastionStatus};
use crate::errors::BastionError;
use crate::metrics;
use crate::reconcilers::bastion::{
    delete_bastion, reconcile_bastion, BastionContext, BastionIntent, ClusterContext, Verdict,
};
use crate::reconcilers::status::{record_error, BastionKey};
use anyhow::anyhow;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Config as RuntimeConfig};
use kube::runtime::finalizer;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

impl From<BastionError> for ReconcileError {
    fn from(err: BastionError) -> Self {
        Self(anyhow::Error::new(err))
    }
}

/// Map a verdict to the controller action, handing failures back.
///
/// # Errors
///
/// Returns the error carried by [`Verdict::Failed`].
pub fn action_for(verdict: Verdict) -> Result<Action, BastionError> {
    match verdict {
        Verdict::Success => Ok(Action::await_change()),
        Verdict::RequeueAfter(delay) => Ok(Action::requeue(delay)),
        Verdict::Failed(err) => Err(err),
    }
}

/// Write `lastError` and `Ready=False` for a failed reconcile or delete pass.
///
/// Cancelled passes are not recorded; the process is shutting down and the
/// bastion is picked up again after restart. A failing status write is only
/// logged.
pub async fn report_failure(
    ctx: &BastionContext,
    key: &BastionKey,
    generation: Option<i64>,
    err: &BastionError,
) {
    if matches!(err, BastionError::Cancelled) {
        return;
    }

    let reason = err.reason();
    let description = err.to_string();
    let result = ctx
        .status
        .try_update_status(key, &ctx.settings.status_backoff, &|status: &mut BastionStatus| {
            record_error(status, reason, &description);
            status.observed_generation = generation;
        })
        .await;

    if let Err(status_err) = result {
        warn!(
            bastion = %key,
            error = %status_err,
            "Failed to record bastion error in status"
        );
    }
}

/// Error policy for the bastion controller.
///
/// Returns an action to requeue the resource after a delay when reconciliation fails.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(bastion: Arc<Bastion>, err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    error!(
        error = %err,
        bastion = %bastion.name_any(),
        namespace = ?bastion.namespace(),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    metrics::record_error_requeue();
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

async fn apply(bastion: Arc<Bastion>, ctx: &Context) -> Result<Action, ReconcileError> {
    let generation = bastion.metadata.generation;
    let verdict = match BastionIntent::from_bastion(&bastion) {
        Ok(intent) => {
            reconcile_bastion(&ctx.bastion, &intent, &ctx.cluster, &ctx.shutdown).await
        }
        Err(err) => {
            metrics::record_reconciliation_error("reconcile", err.metric_label(), Duration::ZERO);
            Verdict::Failed(err)
        }
    };

    match action_for(verdict) {
        Ok(action) => {
            debug!(bastion = %bastion.name_any(), ?action, "Bastion pass finished");
            Ok(action)
        }
        Err(err) => {
            let key = BastionKey::new(bastion.namespace().unwrap_or_default(), bastion.name_any());
            report_failure(&ctx.bastion, &key, generation, &err).await;
            Err(err.into())
        }
    }
}

/// Delete the provider resources of `bastion`, recording a failure in its
/// status the same way a failed reconcile is recorded.
///
/// # Errors
///
/// Returns the error of [`delete_bastion`].
pub async fn teardown_bastion(
    ctx: &BastionContext,
    cluster: &ClusterContext,
    bastion: &Bastion,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    let intent = BastionIntent::for_teardown(bastion);
    let result = delete_bastion(ctx, &intent, cluster, cancel).await;
    if let Err(err) = &result {
        report_failure(ctx, &intent.key, intent.generation, err).await;
    }
    result
}

async fn cleanup(bastion: Arc<Bastion>, ctx: &Context) -> Result<Action, ReconcileError> {
    teardown_bastion(&ctx.bastion, &ctx.cluster, &bastion, &ctx.shutdown).await?;

    info!(
        bastion = %bastion.name_any(),
        namespace = ?bastion.namespace(),
        "Bastion resources removed, releasing finalizer"
    );
    Ok(Action::await_change())
}

/// Reconcile wrapper with finalizer support.
async fn reconcile(bastion: Arc<Bastion>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = bastion
        .namespace()
        .ok_or_else(|| ReconcileError::from(anyhow!("{KIND_BASTION} has no namespace")))?;
    let api: Api<Bastion> = Api::namespaced(ctx.client.clone(), &namespace);

    let result = finalizer(&api, BASTION_FINALIZER, bastion, |event| async {
        match event {
            finalizer::Event::Apply(bastion) => apply(bastion, &ctx).await,
            finalizer::Event::Cleanup(bastion) => cleanup(bastion, &ctx).await,
        }
    })
    .await;

    debug!(elapsed = ?start.elapsed(), "Bastion reconcile wrapper finished");

    result.map_err(|e: finalizer::Error<ReconcileError>| match e {
        finalizer::Error::ApplyFailed(err) | finalizer::Error::CleanupFailed(err) => err,
        finalizer::Error::AddFinalizer(err) | finalizer::Error::RemoveFinalizer(err) => {
            ReconcileError::from(anyhow!("Finalizer error: {err}"))
        }
        finalizer::Error::UnnamedObject => {
            ReconcileError::from(anyhow!("{KIND_BASTION} has no name"))
        }
        finalizer::Error::InvalidFinalizer => {
            ReconcileError::from(anyhow!("Invalid finalizer for {KIND_BASTION}"))
        }
    })
}

/// Run the `Bastion` controller until the shutdown token fires.
///
/// # Errors
///
/// Returns an error if the controller fails to start.
pub async fn run_bastion_controller(
    ctx: Arc<Context>,
    max_concurrent_reconciles: u16,
) -> anyhow::Result<()> {
    info!(
        concurrency = max_concurrent_reconciles,
        "Starting Bastion controller"
    );

    let api = Api::<Bastion>::all(ctx.client.clone());
    let shutdown = ctx.shutdown.clone().cancelled_owned();

    Controller::new(api, WatcherConfig::default().any_semantic())
        .with_config(RuntimeConfig::default().concurrency(max_concurrent_reconciles))
        .graceful_shutdown_on(shutdown)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(bastion = %object.name, ?action, "Bastion reconciliation completed");
                }
                Err(e) => {
                    debug!(error = %e, "Bastion reconciliation error");
                }
            }
        })
        .await;

    info!("Bastion controller stopped");
    Ok(())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
