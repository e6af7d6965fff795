// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Options resolution for a bastion pass.
//!
//! Turns a [`BastionIntent`] and the [`ClusterContext`] into concrete
//! [`ResolvedOptions`]: provider resource names, network paths, normalised
//! source ranges and the zone. Only the zone may need a provider round-trip,
//! and only when neither the intent nor an earlier pass pinned one.

use super::types::{BastionIntent, ClusterContext, ResolvedOptions};
use super::until_cancelled;
use crate::compute::{ComputeClient, Zone};
use crate::constants::{
    DEFAULT_INGRESS_CIDR, DISK_SUFFIX, FIREWALL_ALLOW_SSH_SUFFIX, FIREWALL_DENY_ALL_SUFFIX,
    FIREWALL_EGRESS_WORKER_SUFFIX, MAX_BASE_NAME_LEN, NAME_HASH_LEN, ZONE_STATUS_UP,
};
use crate::errors::BastionError;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolve the options of one pass.
///
/// The zone comes from the intent, then from the zone an earlier pass wrote to
/// `status.providerStatus`, and only then from the region listing. Reading that
/// status field back is the one place the core consumes its own status: it
/// keeps later passes and teardown on the zone the disk and instance were
/// created in, even when the zone listing has since changed.
///
/// # Errors
///
/// - [`BastionError::InvalidIntent`] for malformed CIDRs or missing cluster fields
/// - [`BastionError::ProviderQuery`] if no zone could be selected
/// - [`BastionError::Cancelled`] if `cancel` fires during the zone lookup
pub async fn resolve_options(
    compute: &dyn ComputeClient,
    intent: &BastionIntent,
    cluster: &ClusterContext,
    project_id: &str,
    cancel: &CancellationToken,
) -> Result<ResolvedOptions, BastionError> {
    let base_name = base_resource_name(&cluster.cluster_name, intent.name())?;

    if project_id.is_empty() {
        return Err(BastionError::InvalidIntent("project id is empty".into()));
    }
    let region = intent
        .region
        .clone()
        .unwrap_or_else(|| cluster.region.clone());
    for (field, value) in [
        ("region", region.as_str()),
        ("network", cluster.network.as_str()),
        ("subnetwork", cluster.subnetwork.as_str()),
        ("workers CIDR", cluster.workers_cidr.as_str()),
    ] {
        if value.is_empty() {
            return Err(BastionError::InvalidIntent(format!(
                "cluster {field} is not set"
            )));
        }
    }

    let workers_cidr = parse_workers_cidr(&cluster.workers_cidr)?;
    let cidrs = normalize_cidrs(&intent.ingress_cidrs)?;

    let zone = match intent.zone.as_ref().or(intent.recorded_zone.as_ref()) {
        Some(zone) => zone.clone(),
        None => default_zone(compute, project_id, &region, cancel).await?,
    };

    Ok(ResolvedOptions {
        project_id: project_id.to_string(),
        network: format!("projects/{project_id}/global/networks/{}", cluster.network),
        subnetwork: format!("regions/{region}/subnetworks/{}", cluster.subnetwork),
        region,
        zone,
        cidrs,
        workers_cidr,
        instance_name: base_name.clone(),
        disk_name: format!("{base_name}{DISK_SUFFIX}"),
        firewall_allow_ssh: format!("{base_name}{FIREWALL_ALLOW_SSH_SUFFIX}"),
        firewall_egress_worker: format!("{base_name}{FIREWALL_EGRESS_WORKER_SUFFIX}"),
        firewall_deny_all: format!("{base_name}{FIREWALL_DENY_ALL_SUFFIX}"),
        user_data: intent.user_data.clone(),
    })
}

/// Name shared by every provider resource of a bastion.
///
/// `<cluster>-<bastion>` cut to 33 characters, then `-bastion-` and the first
/// five hex digits of the SHA-256 of the uncut name. Names are lower-cased
/// because Compute Engine rejects upper-case resource names.
///
/// # Errors
///
/// Returns [`BastionError::InvalidIntent`] if either name is empty.
pub fn base_resource_name(cluster_name: &str, bastion_name: &str) -> Result<String, BastionError> {
    if cluster_name.is_empty() {
        return Err(BastionError::InvalidIntent("cluster name is empty".into()));
    }
    if bastion_name.is_empty() {
        return Err(BastionError::InvalidIntent("bastion name is empty".into()));
    }

    let static_name = format!("{cluster_name}-{bastion_name}");
    let mut hasher = Sha256::new();
    hasher.update(static_name.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let truncated: String = static_name.chars().take(MAX_BASE_NAME_LEN).collect();
    Ok(format!("{truncated}-bastion-{}", &hash[..NAME_HASH_LEN]).to_lowercase())
}

/// Parse the worker nodes CIDR, which must be an IPv4 block.
///
/// # Errors
///
/// Returns [`BastionError::InvalidIntent`] if the value is malformed or IPv6.
pub fn parse_workers_cidr(cidr: &str) -> Result<String, BastionError> {
    parse_ipv4_cidr(cidr)?.ok_or_else(|| {
        BastionError::InvalidIntent(format!("workers CIDR {cidr} is not an IPv4 block"))
    })
}

/// Normalise declared source ranges.
///
/// Host bits are masked, IPv6 blocks are dropped and an empty result allows
/// any IPv4 source.
///
/// # Errors
///
/// Returns [`BastionError::InvalidIntent`] for the first malformed CIDR.
pub fn normalize_cidrs(cidrs: &[String]) -> Result<Vec<String>, BastionError> {
    let mut normalized = Vec::with_capacity(cidrs.len());
    for cidr in cidrs {
        match parse_ipv4_cidr(cidr)? {
            Some(block) => normalized.push(block),
            None => debug!(cidr = %cidr, "Skipping IPv6 ingress CIDR"),
        }
    }

    if normalized.is_empty() {
        normalized.push(DEFAULT_INGRESS_CIDR.to_string());
    }
    Ok(normalized)
}

/// Parse `addr/prefix`. IPv4 blocks come back with host bits masked, IPv6
/// blocks as `None`.
fn parse_ipv4_cidr(cidr: &str) -> Result<Option<String>, BastionError> {
    let invalid = || BastionError::InvalidIntent(format!("invalid CIDR {cidr:?}"));

    let (addr, prefix) = cidr.trim().split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

    match addr {
        IpAddr::V4(v4) => {
            if prefix > 32 {
                return Err(invalid());
            }
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            let network = Ipv4Addr::from(u32::from(v4) & mask);
            Ok(Some(format!("{network}/{prefix}")))
        }
        IpAddr::V6(_) => {
            if prefix > 128 {
                return Err(invalid());
            }
            Ok(None)
        }
    }
}

/// Pick the zone a bastion goes to when none is pinned.
///
/// Zones reported `UP` win; if the listing carries no status at all every
/// zone is a candidate. The lexicographically first candidate is chosen.
#[must_use]
pub fn select_zone(zones: &[Zone]) -> Option<String> {
    let any_status = zones.iter().any(|z| z.status.is_some());
    let mut candidates: Vec<&str> = zones
        .iter()
        .filter(|z| !any_status || z.status.as_deref() == Some(ZONE_STATUS_UP))
        .map(|z| z.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    candidates.sort_unstable();
    candidates.first().map(|name| (*name).to_string())
}

/// Ask the provider for a usable zone of `region`.
///
/// # Errors
///
/// [`BastionError::ProviderQuery`] if the listing fails or yields no zone.
pub async fn default_zone(
    compute: &dyn ComputeClient,
    project_id: &str,
    region: &str,
    cancel: &CancellationToken,
) -> Result<String, BastionError> {
    let zones = until_cancelled(cancel, compute.list_zones(project_id, region))
        .await?
        .map_err(|e| {
            BastionError::ProviderQuery(format!("failed to list zones of region {region}: {e}"))
        })?;

    let zone = select_zone(&zones).ok_or_else(|| {
        BastionError::ProviderQuery(format!("no usable zone found in region {region}"))
    })?;
    debug!(region = %region, zone = %zone, candidates = zones.len(), "Selected default zone");
    Ok(zone)
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod options_tests;
