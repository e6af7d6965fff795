// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Compute Engine access for the bastion reconciler.
//!
//! The reconciler only talks to the provider through the [`ComputeClient`]
//! capability trait. Two implementations ship with the crate:
//!
//! - [`rest::RestComputeClient`] - the Compute Engine v1 REST API over `reqwest`
//! - [`fake::InMemoryComputeClient`] - a deterministic in-memory double for tests
//!
//! # Contract
//!
//! - Getters return `Ok(None)` when the resource does not exist.
//! - Deleters return `Ok(false)` when the resource was already gone.
//! - Mutations return once the provider's [`Operation`] is `DONE`. A deleted
//!   instance has released its disk by the time `delete_instance` returns.
//!   A finished operation that reports errors is a failure.
//! - No call is retried by the client. Waits are bounded by the caller's
//!   timeout and cancellation.

pub mod fake;
pub mod rest;
pub mod types;

pub use types::{
    AccessConfig, AttachedDisk, Disk, Firewall, FirewallPatch, FirewallRuleProtocol, Instance,
    Metadata, MetadataItem, NetworkInterface, Operation, Tags, Zone,
};

use crate::errors::ComputeError;
use async_trait::async_trait;

/// Getters, inserters, patchers and deleters for the resources a bastion owns.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Fetch a global firewall rule by name.
    async fn get_firewall(&self, project: &str, name: &str)
        -> Result<Option<Firewall>, ComputeError>;

    /// Create a global firewall rule.
    async fn insert_firewall(
        &self,
        project: &str,
        firewall: &Firewall,
    ) -> Result<Operation, ComputeError>;

    /// Patch the source ranges of an existing firewall rule.
    async fn patch_firewall(
        &self,
        project: &str,
        name: &str,
        patch: &FirewallPatch,
    ) -> Result<Operation, ComputeError>;

    /// Delete a firewall rule. `Ok(false)` if it did not exist.
    async fn delete_firewall(&self, project: &str, name: &str) -> Result<bool, ComputeError>;

    /// Fetch a zonal disk by name.
    async fn get_disk(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Disk>, ComputeError>;

    /// Create a zonal disk.
    async fn insert_disk(
        &self,
        project: &str,
        zone: &str,
        disk: &Disk,
    ) -> Result<Operation, ComputeError>;

    /// Delete a zonal disk. `Ok(false)` if it did not exist.
    async fn delete_disk(&self, project: &str, zone: &str, name: &str)
        -> Result<bool, ComputeError>;

    /// Fetch an instance by name.
    async fn get_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Instance>, ComputeError>;

    /// Create an instance.
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError>;

    /// Delete an instance. `Ok(false)` if it did not exist.
    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<bool, ComputeError>;

    /// List the zones of `region` visible to `project`.
    async fn list_zones(&self, project: &str, region: &str) -> Result<Vec<Zone>, ComputeError>;
}
