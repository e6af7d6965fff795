// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Value types flowing through a bastion reconcile pass.
//!
//! Everything here is rebuilt on every pass; nothing is cached between
//! invocations.

use crate::compute::ComputeClient;
use crate::constants::{DEFAULT_RECONCILE_TIMEOUT_SECS, ENDPOINT_REQUEUE_SECS};
use crate::crd::Bastion;
use crate::errors::BastionError;
use crate::reconcilers::retry::BackoffPolicy;
use crate::reconcilers::status::{BastionKey, StatusStore};
use base64::Engine;
use k8s_openapi::api::core::v1::LoadBalancerIngress;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;

/// What the user asked for, detached from the Kubernetes object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BastionIntent {
    /// Namespace and name of the `Bastion`
    pub key: BastionKey,
    /// Allowed source CIDRs, in declaration order
    pub ingress_cidrs: Vec<String>,
    /// Startup script, already base64-decoded
    pub user_data: String,
    /// Zone hint
    pub zone: Option<String>,
    /// Region hint, overrides the cluster region
    pub region: Option<String>,
    /// Zone persisted in `status.providerStatus` by an earlier pass
    pub recorded_zone: Option<String>,
    /// `metadata.generation` the intent was read from
    pub generation: Option<i64>,
}

impl BastionIntent {
    /// Build the intent from a `Bastion` resource.
    ///
    /// # Errors
    ///
    /// Returns [`BastionError::InvalidIntent`] if `userData` is not valid
    /// base64 or does not decode to UTF-8 text.
    pub fn from_bastion(bastion: &Bastion) -> Result<Self, BastionError> {
        let spec = &bastion.spec;

        let user_data = match spec.user_data.as_deref().map(str::trim) {
            None | Some("") => String::new(),
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| {
                        BastionError::InvalidIntent(format!("userData is not valid base64: {e}"))
                    })?;
                String::from_utf8(bytes).map_err(|e| {
                    BastionError::InvalidIntent(format!("userData is not UTF-8 text: {e}"))
                })?
            }
        };

        let ingress_cidrs = spec
            .ingress
            .iter()
            .flatten()
            .map(|policy| policy.ip_block.cidr.clone())
            .collect();

        Ok(Self {
            ingress_cidrs,
            user_data,
            ..Self::for_teardown(bastion)
        })
    }

    /// Intent carrying only what deletion needs: identity, placement hints
    /// and the recorded zone. Never fails, so a malformed spec cannot block
    /// teardown.
    #[must_use]
    pub fn for_teardown(bastion: &Bastion) -> Self {
        let spec = &bastion.spec;
        Self {
            key: BastionKey::new(bastion.namespace().unwrap_or_default(), bastion.name_any()),
            ingress_cidrs: Vec::new(),
            user_data: String::new(),
            zone: spec.zone.clone().filter(|z| !z.is_empty()),
            region: spec.region.clone().filter(|r| !r.is_empty()),
            recorded_zone: bastion
                .status
                .as_ref()
                .and_then(|s| s.provider_status.as_ref())
                .map(|p| p.zone.clone())
                .filter(|z| !z.is_empty()),
            generation: bastion.metadata.generation,
        }
    }

    /// Logical name of the bastion.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }
}

/// Read-only facts about the cluster hosting the bastion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterContext {
    /// Cluster name, prefixes every provider resource name
    pub cluster_name: String,
    /// Default region
    pub region: String,
    /// VPC network name
    pub network: String,
    /// Subnetwork name, within `region`
    pub subnetwork: String,
    /// CIDR of the worker nodes, the only egress destination allowed
    pub workers_cidr: String,
}

/// Concrete configuration of one pass, derived from intent and cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub project_id: String,
    pub region: String,
    pub zone: String,
    /// `projects/<project>/global/networks/<network>`
    pub network: String,
    /// `regions/<region>/subnetworks/<subnetwork>`
    pub subnetwork: String,
    /// Normalised IPv4 source ranges, declaration order kept
    pub cidrs: Vec<String>,
    pub workers_cidr: String,
    pub instance_name: String,
    pub disk_name: String,
    pub firewall_allow_ssh: String,
    pub firewall_egress_worker: String,
    pub firewall_deny_all: String,
    pub user_data: String,
}

impl ResolvedOptions {
    /// Names of the three firewall rules, in creation order.
    #[must_use]
    pub fn firewall_names(&self) -> [&str; 3] {
        [
            &self.firewall_allow_ssh,
            &self.firewall_deny_all,
            &self.firewall_egress_worker,
        ]
    }
}

/// One way of reaching the bastion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: Option<String>,
    pub hostname: Option<String>,
}

impl Endpoint {
    /// `true` if either the IP or the hostname is non-empty.
    #[must_use]
    pub fn is_present(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.ip) || filled(&self.hostname)
    }
}

impl From<&Endpoint> for LoadBalancerIngress {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            ip: endpoint.ip.clone().filter(|s| !s.is_empty()),
            hostname: endpoint.hostname.clone().filter(|s| !s.is_empty()),
            ..Default::default()
        }
    }
}

/// Private and public endpoints of a running bastion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BastionEndpoints {
    pub private: Option<Endpoint>,
    pub public: Option<Endpoint>,
}

impl BastionEndpoints {
    /// Both endpoints are present.
    #[must_use]
    pub fn ready(&self) -> bool {
        let present = |e: &Option<Endpoint>| e.as_ref().is_some_and(Endpoint::is_present);
        present(&self.private) && present(&self.public)
    }
}

/// Tunables of a reconcile pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconcileSettings {
    /// Delay before re-checking endpoints that are not ready yet
    pub requeue_after: Duration,
    /// Upper bound of a whole pass
    pub timeout: Duration,
    /// Backoff of status writes
    pub status_backoff: BackoffPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            requeue_after: Duration::from_secs(ENDPOINT_REQUEUE_SECS),
            timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            status_backoff: BackoffPolicy::default(),
        }
    }
}

/// Collaborators and settings shared by every pass.
#[derive(Clone)]
pub struct BastionContext {
    pub compute: Arc<dyn ComputeClient>,
    pub status: Arc<dyn StatusStore>,
    pub project_id: String,
    pub settings: ReconcileSettings,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
