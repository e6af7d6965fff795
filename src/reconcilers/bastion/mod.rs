// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bastion reconciliation logic.
//!
//! A pass resolves the options, persists the zone, ensures the firewall
//! rules, the disk and the instance, and finally derives the instance's
//! endpoints. Nothing is remembered between passes: every pass recomputes
//! where it stands from what the provider reports, and its outcome is a
//! [`Verdict`].
//!
//! ```text
//! OptionsUnresolved -> ZoneResolved -> FirewallEnsured -> DiskEnsured
//!     -> InstanceEnsured -> EndpointsPending (RequeueAfter)
//!                        -> EndpointsReady   (Success)
//! ```
//!
//! Every provider and status call races the caller's [`CancellationToken`],
//! and the pass as a whole is bounded by [`ReconcileSettings::timeout`].
//!
//! ## Module Structure
//!
//! - [`types`] - Intent, cluster context, options and endpoints
//! - [`options`] - Options resolution and default zone selection
//! - [`resources`] - Provider resource descriptors
//! - [`ensure`] - Get-or-create of firewall rules, disk and instance
//! - [`endpoints`] - Endpoint derivation
//! - [`teardown`] - Resource deletion

pub mod endpoints;
pub mod ensure;
pub mod options;
pub mod resources;
pub mod teardown;
pub mod types;

pub use types::{
    BastionContext, BastionEndpoints, BastionIntent, ClusterContext, Endpoint, ReconcileSettings,
    ResolvedOptions,
};

use crate::crd::BastionStatus;
use crate::errors::{BastionError, ComputeError};
use crate::metrics;
use crate::reconcilers::status::{publish_ingress, record_zone, StatusMutation};
use crate::status_reasons::REASON_ENDPOINTS_READY;
use k8s_openapi::api::core::v1::LoadBalancerIngress;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// `kind` label of firewall rules
pub const KIND_FIREWALL: &str = "firewall";
/// `kind` label of disks
pub const KIND_DISK: &str = "disk";
/// `kind` label of instances
pub const KIND_INSTANCE: &str = "instance";

const OPERATION_RECONCILE: &str = "reconcile";
const OPERATION_DELETE: &str = "delete";

/// Outcome of a reconcile pass.
#[derive(Debug)]
pub enum Verdict {
    /// The bastion is reachable and its endpoint is published
    Success,
    /// Provisioning is still in progress; run again after the delay
    RequeueAfter(Duration),
    /// The pass failed
    Failed(BastionError),
}

impl Verdict {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Delay requested by a pending pass.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::RequeueAfter(delay) => Some(*delay),
            _ => None,
        }
    }

    /// Error of a failed pass.
    #[must_use]
    pub fn error(&self) -> Option<&BastionError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Run `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, BastionError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(BastionError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Run a provider call, wrapping its failure with `context`.
async fn compute_call<T, F>(
    cancel: &CancellationToken,
    context: String,
    fut: F,
) -> Result<T, BastionError>
where
    F: Future<Output = Result<T, ComputeError>>,
{
    until_cancelled(cancel, fut)
        .await?
        .map_err(|e| BastionError::compute(context, e))
}

async fn update_status(
    ctx: &BastionContext,
    intent: &BastionIntent,
    what: &'static str,
    cancel: &CancellationToken,
    mutate: StatusMutation<'_>,
) -> Result<(), BastionError> {
    let backoff = ctx.settings.status_backoff;
    until_cancelled(
        cancel,
        ctx.status.try_update_status(&intent.key, &backoff, mutate),
    )
    .await?
    .map_err(|source| BastionError::StatusUpdate { what, source })
}

/// Bring a bastion one step closer to running and reachable.
///
/// Safe to call any number of times; resources that already exist are left
/// in place and only the SSH source ranges are patched when they drifted.
pub async fn reconcile_bastion(
    ctx: &BastionContext,
    intent: &BastionIntent,
    cluster: &ClusterContext,
    cancel: &CancellationToken,
) -> Verdict {
    let start = Instant::now();
    let timeout = ctx.settings.timeout;

    let pass = reconcile_pass(ctx, intent, cluster, cancel);
    let verdict = match tokio::time::timeout(timeout, pass).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(err)) => Verdict::Failed(err),
        Err(_) => Verdict::Failed(BastionError::DeadlineExceeded(timeout)),
    };

    let elapsed = start.elapsed();
    match &verdict {
        Verdict::Success => {
            metrics::record_reconciliation_success(OPERATION_RECONCILE, elapsed);
        }
        Verdict::RequeueAfter(_) => {
            metrics::record_reconciliation_requeue(
                OPERATION_RECONCILE,
                "endpoints_pending",
                elapsed,
            );
        }
        Verdict::Failed(err) => {
            warn!(bastion = %intent.key, error = %err, "Bastion reconciliation failed");
            metrics::record_reconciliation_error(OPERATION_RECONCILE, err.metric_label(), elapsed);
        }
    }
    verdict
}

async fn reconcile_pass(
    ctx: &BastionContext,
    intent: &BastionIntent,
    cluster: &ClusterContext,
    cancel: &CancellationToken,
) -> Result<Verdict, BastionError> {
    let compute = ctx.compute.as_ref();

    let opt = options::resolve_options(compute, intent, cluster, &ctx.project_id, cancel).await?;
    debug!(
        bastion = %intent.key,
        zone = %opt.zone,
        instance = %opt.instance_name,
        "Resolved bastion options"
    );

    let zone = opt.zone.as_str();
    update_status(ctx, intent, "providerStatus.zone", cancel, &|status: &mut BastionStatus| {
        record_zone(status, zone);
    })
    .await?;

    ensure::ensure_firewall_rules(compute, &opt, cancel).await?;
    ensure::ensure_disk(compute, &opt, cancel).await?;
    let instance = ensure::ensure_instance(compute, &opt, cancel).await?;

    let endpoints = endpoints::resolve_endpoints(&instance)?;
    let public = match endpoints.public.as_ref() {
        Some(public) if endpoints.ready() => public,
        _ => {
            let delay = ctx.settings.requeue_after;
            info!(
                bastion = %intent.key,
                instance = %opt.instance_name,
                requeue_after = ?delay,
                "Bastion instance has no public/private endpoints yet"
            );
            return Ok(Verdict::RequeueAfter(delay));
        }
    };

    let ingress = LoadBalancerIngress::from(public);
    update_status(ctx, intent, "ingress", cancel, &|status: &mut BastionStatus| {
        publish_ingress(status, &ingress, REASON_ENDPOINTS_READY);
        status.observed_generation = intent.generation;
    })
    .await?;

    info!(
        bastion = %intent.key,
        zone = %opt.zone,
        ip = ?ingress.ip,
        "Bastion is ready"
    );
    Ok(Verdict::Success)
}

/// Remove every provider resource of a bastion.
///
/// # Errors
///
/// Returns the first failure other than "already gone", or
/// [`BastionError::Cancelled`] / [`BastionError::DeadlineExceeded`].
pub async fn delete_bastion(
    ctx: &BastionContext,
    intent: &BastionIntent,
    cluster: &ClusterContext,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    let start = Instant::now();
    let timeout = ctx.settings.timeout;

    let pass = delete_pass(ctx, intent, cluster, cancel);
    let result = match tokio::time::timeout(timeout, pass).await {
        Ok(result) => result,
        Err(_) => Err(BastionError::DeadlineExceeded(timeout)),
    };

    let elapsed = start.elapsed();
    match &result {
        Ok(()) => {
            info!(bastion = %intent.key, "Bastion resources deleted");
            metrics::record_reconciliation_success(OPERATION_DELETE, elapsed);
        }
        Err(err) => {
            warn!(bastion = %intent.key, error = %err, "Bastion deletion failed");
            metrics::record_reconciliation_error(OPERATION_DELETE, err.metric_label(), elapsed);
        }
    }
    result
}

async fn delete_pass(
    ctx: &BastionContext,
    intent: &BastionIntent,
    cluster: &ClusterContext,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    // Source ranges play no part in deletion.
    let intent = BastionIntent {
        ingress_cidrs: Vec::new(),
        ..intent.clone()
    };
    let compute = ctx.compute.as_ref();
    let opt = options::resolve_options(compute, &intent, cluster, &ctx.project_id, cancel).await?;
    debug!(bastion = %intent.key, zone = %opt.zone, "Deleting bastion resources");

    teardown::delete_resources(compute, &opt, cancel).await
}
