// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion of the provider resources behind a bastion.

use super::types::ResolvedOptions;
use super::{compute_call, KIND_DISK, KIND_FIREWALL, KIND_INSTANCE};
use crate::compute::ComputeClient;
use crate::errors::BastionError;
use crate::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Delete the instance, then its disk, then the firewall rules.
///
/// Resources that are already gone are skipped, so running this on a
/// torn-down bastion succeeds without any effect.
///
/// # Errors
///
/// Returns the first provider failure other than "not found".
pub async fn delete_resources(
    compute: &dyn ComputeClient,
    opt: &ResolvedOptions,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    let (project, zone) = (opt.project_id.as_str(), opt.zone.as_str());

    let name = opt.instance_name.as_str();
    let deleted = compute_call(
        cancel,
        format!("failed to delete instance {name}"),
        compute.delete_instance(project, zone, name),
    )
    .await?;
    log_deletion(KIND_INSTANCE, name, deleted);

    let name = opt.disk_name.as_str();
    let deleted = compute_call(
        cancel,
        format!("failed to delete disk {name}"),
        compute.delete_disk(project, zone, name),
    )
    .await?;
    log_deletion(KIND_DISK, name, deleted);

    for name in opt.firewall_names() {
        let deleted = compute_call(
            cancel,
            format!("failed to delete firewall rule {name}"),
            compute.delete_firewall(project, name),
        )
        .await?;
        log_deletion(KIND_FIREWALL, name, deleted);
    }

    Ok(())
}

fn log_deletion(kind: &str, name: &str, deleted: bool) {
    if deleted {
        info!(resource = %name, kind, "Deleted bastion resource");
        metrics::record_resource_deleted(kind);
    } else {
        debug!(resource = %name, kind, "Bastion resource already gone");
    }
}

#[cfg(test)]
#[path = "teardown_tests.rs"]
mod teardown_tests;
