// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for bastion hosts.
//!
//! A [`Bastion`] asks the operator for a short-lived SSH jump host inside the
//! cluster's VPC. The operator creates three firewall rules, a boot disk and a
//! Compute Engine instance for it, and publishes the public address in
//! `status.ingress` once the host is reachable.
//!
//! # Example: Declaring a Bastion
//!
//! ```rust,no_run
//! use gcp_bastion::crd::{BastionIngressPolicy, BastionSpec, IpBlock};
//!
//! let spec = BastionSpec {
//!     user_data: Some("IyEvYmluL2Jhc2gKZWNobyBoZWxsbwo=".to_string()),
//!     ingress: Some(vec![BastionIngressPolicy {
//!         ip_block: IpBlock {
//!             cidr: "203.0.113.0/24".to_string(),
//!         },
//!     }]),
//!     zone: None,
//!     region: None,
//! };
//! ```

use k8s_openapi::api::core::v1::LoadBalancerIngress;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Bastions only report `Ready`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// A CIDR block allowed to reach the bastion over SSH.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpBlock {
    /// CIDR notation, e.g. "203.0.113.0/24". IPv6 blocks are accepted but ignored.
    pub cidr: String,
}

/// One ingress permission of a bastion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionIngressPolicy {
    /// Source address block
    pub ip_block: IpBlock,
}

/// `Bastion` requests an ephemeral SSH jump host on Google Compute Engine.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "bastion.gcp.io",
    version = "v1alpha1",
    kind = "Bastion",
    namespaced,
    shortname = "bst",
    doc = "Bastion requests a temporary SSH jump host inside the cluster network. The operator provisions firewall rules, a disk and a Compute Engine instance, and publishes the public endpoint once the host is running."
)]
#[kube(status = "BastionStatus")]
#[kube(printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".status.providerStatus.zone"}"#)]
#[kube(printcolumn = r#"{"name":"IP","type":"string","jsonPath":".status.ingress.ip"}"#)]
#[kube(printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    /// Base64-encoded script injected as the instance's `startup-script`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    /// Source CIDRs allowed to connect. When empty, SSH is open to `0.0.0.0/0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Vec<BastionIngressPolicy>>,

    /// Zone to place the bastion in. Picked from the region when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Region override. Defaults to the cluster region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Provider specific status of a bastion.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Zone the bastion's disk and instance live in
    pub zone: String,
}

/// Last error reported for a bastion.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Human-readable error message
    pub description: String,

    /// Error reason (CamelCase)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// When the error was recorded (RFC3339 format)
    pub last_update_time: String,
}

/// `Bastion` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionStatus {
    /// Provider data persisted as soon as the zone is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<ProviderStatus>,

    /// Public endpoint, set once the bastion is reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<LoadBalancerIngress>,

    /// Most recent reconciliation failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
