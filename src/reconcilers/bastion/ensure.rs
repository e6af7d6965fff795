// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Get-or-create of the provider resources behind a bastion.
//!
//! Every procedure looks the resource up by name first and only creates it
//! when it is absent. A create is never trusted on its own: the resource is
//! fetched again afterwards, and a resource that is still missing fails the
//! pass with [`BastionError::ResourceCreate`] instead of letting later steps
//! run against it.

use super::resources::{disk, firewall_rules, instance};
use super::types::ResolvedOptions;
use super::{compute_call, KIND_DISK, KIND_FIREWALL, KIND_INSTANCE};
use crate::compute::{ComputeClient, FirewallPatch, Instance};
use crate::errors::BastionError;
use crate::metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ensure the three firewall rules exist and the SSH rule allows exactly
/// the desired source ranges.
///
/// Only the source ranges of the ingress rule are reconciled; the comparison
/// is order-sensitive and a mismatch is fixed with a patch.
///
/// # Errors
///
/// Returns an error if a provider call fails or the SSH rule cannot be found
/// after creation.
pub async fn ensure_firewall_rules(
    compute: &dyn ComputeClient,
    opt: &ResolvedOptions,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    let project = opt.project_id.as_str();

    for rule in firewall_rules(opt) {
        let existing = compute_call(
            cancel,
            format!("failed to get firewall rule {}", rule.name),
            compute.get_firewall(project, &rule.name),
        )
        .await?;
        if existing.is_some() {
            debug!(resource = %rule.name, "Firewall rule exists");
            continue;
        }

        info!(resource = %rule.name, direction = ?rule.direction, "Creating firewall rule");
        compute_call(
            cancel,
            format!("failed to create firewall rule {}", rule.name),
            compute.insert_firewall(project, &rule),
        )
        .await?;
        metrics::record_resource_created(KIND_FIREWALL);
    }

    let name = opt.firewall_allow_ssh.as_str();
    let current = compute_call(
        cancel,
        format!("failed to get firewall rule {name}"),
        compute.get_firewall(project, name),
    )
    .await?
    .ok_or_else(|| BastionError::ResourceCreate {
        kind: KIND_FIREWALL,
        name: name.to_string(),
    })?;

    if current.source_ranges != opt.cidrs {
        info!(
            resource = %name,
            current = ?current.source_ranges,
            desired = ?opt.cidrs,
            "Patching firewall rule source ranges"
        );
        let patch = FirewallPatch {
            source_ranges: opt.cidrs.clone(),
        };
        compute_call(
            cancel,
            format!("failed to patch firewall rule {name}"),
            compute.patch_firewall(project, name, &patch),
        )
        .await?;
        metrics::record_resource_patched(KIND_FIREWALL);
    }

    Ok(())
}

/// Ensure the boot disk exists.
///
/// # Errors
///
/// Returns an error if a provider call fails or the disk is still missing
/// after creation.
pub async fn ensure_disk(
    compute: &dyn ComputeClient,
    opt: &ResolvedOptions,
    cancel: &CancellationToken,
) -> Result<(), BastionError> {
    let (project, zone, name) = (
        opt.project_id.as_str(),
        opt.zone.as_str(),
        opt.disk_name.as_str(),
    );
    let get_context = || format!("failed to get disk {name}");

    if compute_call(cancel, get_context(), compute.get_disk(project, zone, name))
        .await?
        .is_some()
    {
        debug!(resource = %name, zone = %zone, "Disk exists");
        return Ok(());
    }

    info!(resource = %name, zone = %zone, "Creating bastion disk");
    compute_call(
        cancel,
        format!("failed to create disk {name}"),
        compute.insert_disk(project, zone, &disk(opt)),
    )
    .await?;
    metrics::record_resource_created(KIND_DISK);

    compute_call(cancel, get_context(), compute.get_disk(project, zone, name))
        .await?
        .map(|_| ())
        .ok_or_else(|| BastionError::ResourceCreate {
            kind: KIND_DISK,
            name: name.to_string(),
        })
}

/// Ensure the bastion instance exists and return it as currently stored.
///
/// # Errors
///
/// Returns an error if a provider call fails or the instance is still
/// missing after creation.
pub async fn ensure_instance(
    compute: &dyn ComputeClient,
    opt: &ResolvedOptions,
    cancel: &CancellationToken,
) -> Result<Instance, BastionError> {
    let (project, zone, name) = (
        opt.project_id.as_str(),
        opt.zone.as_str(),
        opt.instance_name.as_str(),
    );
    let get_context = || format!("failed to get instance {name}");

    if let Some(existing) =
        compute_call(cancel, get_context(), compute.get_instance(project, zone, name)).await?
    {
        debug!(resource = %name, zone = %zone, status = ?existing.status, "Instance exists");
        return Ok(existing);
    }

    info!(resource = %name, zone = %zone, "Creating bastion instance");
    compute_call(
        cancel,
        format!("failed to create instance {name}"),
        compute.insert_instance(project, zone, &instance(opt)),
    )
    .await?;
    metrics::record_resource_created(KIND_INSTANCE);

    compute_call(cancel, get_context(), compute.get_instance(project, zone, name))
        .await?
        .ok_or_else(|| BastionError::ResourceCreate {
            kind: KIND_INSTANCE,
            name: name.to_string(),
        })
}

#[cfg(test)]
#[path = "ensure_tests.rs"]
mod ensure_tests;
