// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic in-memory [`ComputeClient`] for tests.
//!
//! Resources live in ordered maps keyed by name (and zone). Every call is
//! recorded so tests can assert which provider operations a pass issued.
//! Inserted instances come up with a configurable lifecycle state and
//! addresses, which lets tests walk an instance from `PROVISIONING` to
//! `RUNNING` between reconcile passes.

use super::types::{Disk, Firewall, FirewallPatch, Instance, Operation, Zone};
use super::ComputeClient;
use crate::constants::{INSTANCE_STATUS_RUNNING, OPERATION_STATUS_DONE};
use crate::errors::ComputeError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// One recorded provider call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComputeCall {
    GetFirewall(String),
    InsertFirewall(String),
    PatchFirewall(String),
    DeleteFirewall(String),
    GetDisk(String),
    InsertDisk(String),
    DeleteDisk(String),
    GetInstance(String),
    InsertInstance(String),
    DeleteInstance(String),
    ListZones(String),
}

impl ComputeCall {
    /// `true` for calls that create a resource.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(
            self,
            Self::InsertFirewall(_) | Self::InsertDisk(_) | Self::InsertInstance(_)
        )
    }

    /// `true` for calls that change provider state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.is_insert()
            || matches!(
                self,
                Self::PatchFirewall(_)
                    | Self::DeleteFirewall(_)
                    | Self::DeleteDisk(_)
                    | Self::DeleteInstance(_)
            )
    }
}

#[derive(Default)]
struct State {
    firewalls: BTreeMap<String, Firewall>,
    disks: BTreeMap<(String, String), Disk>,
    instances: BTreeMap<(String, String), Instance>,
    zones: Vec<Zone>,
    calls: Vec<ComputeCall>,
    new_instance_status: Option<String>,
    internal_ip: Option<String>,
    external_ip: Option<String>,
    swallow_inserts: bool,
    fail_next_insert: Option<(u16, String)>,
}

/// In-memory Compute Engine double.
pub struct InMemoryComputeClient {
    state: Mutex<State>,
}

impl Default for InMemoryComputeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryComputeClient {
    /// Empty project; new instances come up `RUNNING` with `10.0.0.5` / `34.1.2.3`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                internal_ip: Some("10.0.0.5".to_string()),
                external_ip: Some("34.1.2.3".to_string()),
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the zone listing returned by `list_zones`.
    #[must_use]
    pub fn with_zones(self, zones: Vec<Zone>) -> Self {
        self.lock().zones = zones;
        self
    }

    /// Lifecycle state given to instances created from now on.
    pub fn set_new_instance_status(&self, status: &str) {
        self.lock().new_instance_status = Some(status.to_string());
    }

    /// Addresses given to instances created from now on.
    pub fn set_new_instance_addresses(&self, internal: Option<&str>, external: Option<&str>) {
        let mut state = self.lock();
        state.internal_ip = internal.map(str::to_string);
        state.external_ip = external.map(str::to_string);
    }

    /// Accept inserts without storing anything (eventual-consistency anomaly).
    pub fn set_swallow_inserts(&self, swallow: bool) {
        self.lock().swallow_inserts = swallow;
    }

    /// Make the next insert fail with an API error.
    pub fn fail_next_insert(&self, status: u16, message: &str) {
        self.lock().fail_next_insert = Some((status, message.to_string()));
    }

    /// Store a firewall rule directly, bypassing call recording.
    pub fn put_firewall(&self, firewall: Firewall) {
        self.lock()
            .firewalls
            .insert(firewall.name.clone(), firewall);
    }

    /// Store an instance directly, bypassing call recording.
    pub fn put_instance(&self, zone: &str, instance: Instance) {
        self.lock()
            .instances
            .insert((zone.to_string(), instance.name.clone()), instance);
    }

    /// Mutate a stored instance, e.g. to flip it to `RUNNING`.
    pub fn update_instance(&self, zone: &str, name: &str, update: impl FnOnce(&mut Instance)) {
        if let Some(instance) = self
            .lock()
            .instances
            .get_mut(&(zone.to_string(), name.to_string()))
        {
            update(instance);
        }
    }

    #[must_use]
    pub fn firewall(&self, name: &str) -> Option<Firewall> {
        self.lock().firewalls.get(name).cloned()
    }

    #[must_use]
    pub fn disk(&self, zone: &str, name: &str) -> Option<Disk> {
        self.lock()
            .disks
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn instance(&self, zone: &str, name: &str) -> Option<Instance> {
        self.lock()
            .instances
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of all stored firewall rules, sorted.
    #[must_use]
    pub fn firewall_names(&self) -> Vec<String> {
        self.lock().firewalls.keys().cloned().collect()
    }

    /// Total number of stored resources of any kind.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        let state = self.lock();
        state.firewalls.len() + state.disks.len() + state.instances.len()
    }

    /// All calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, call: ComputeCall) {
        self.lock().calls.push(call);
    }

    /// Apply the injected insert failure, if any. Returns `Ok(true)` when the
    /// insert should be stored.
    fn begin_insert(&self, url: &str) -> Result<bool, ComputeError> {
        let mut state = self.lock();
        if let Some((status, message)) = state.fail_next_insert.take() {
            return Err(ComputeError::Api {
                url: url.to_string(),
                status,
                message,
            });
        }
        Ok(!state.swallow_inserts)
    }

    fn already_exists(url: &str, name: &str) -> ComputeError {
        ComputeError::Api {
            url: url.to_string(),
            status: 409,
            message: format!("The resource '{name}' already exists"),
        }
    }

    fn operation(kind: &str, target: &str) -> Operation {
        Operation {
            name: Some(format!("operation-{kind}-{target}")),
            operation_type: Some(kind.to_string()),
            status: Some(OPERATION_STATUS_DONE.to_string()),
            target_link: Some(target.to_string()),
            error: None,
        }
    }
}

#[async_trait]
impl ComputeClient for InMemoryComputeClient {
    async fn get_firewall(
        &self,
        _project: &str,
        name: &str,
    ) -> Result<Option<Firewall>, ComputeError> {
        self.record(ComputeCall::GetFirewall(name.to_string()));
        Ok(self.firewall(name))
    }

    async fn insert_firewall(
        &self,
        _project: &str,
        firewall: &Firewall,
    ) -> Result<Operation, ComputeError> {
        self.record(ComputeCall::InsertFirewall(firewall.name.clone()));
        let url = format!("firewalls/{}", firewall.name);
        if !self.begin_insert(&url)? {
            return Ok(Self::operation("insert", &firewall.name));
        }

        let mut state = self.lock();
        if state.firewalls.contains_key(&firewall.name) {
            return Err(Self::already_exists(&url, &firewall.name));
        }
        state
            .firewalls
            .insert(firewall.name.clone(), firewall.clone());
        Ok(Self::operation("insert", &firewall.name))
    }

    async fn patch_firewall(
        &self,
        _project: &str,
        name: &str,
        patch: &FirewallPatch,
    ) -> Result<Operation, ComputeError> {
        self.record(ComputeCall::PatchFirewall(name.to_string()));
        let mut state = self.lock();
        match state.firewalls.get_mut(name) {
            Some(firewall) => {
                firewall.source_ranges.clone_from(&patch.source_ranges);
                Ok(Self::operation("patch", name))
            }
            None => Err(ComputeError::Api {
                url: format!("firewalls/{name}"),
                status: 404,
                message: format!("The resource '{name}' was not found"),
            }),
        }
    }

    async fn delete_firewall(&self, _project: &str, name: &str) -> Result<bool, ComputeError> {
        self.record(ComputeCall::DeleteFirewall(name.to_string()));
        Ok(self.lock().firewalls.remove(name).is_some())
    }

    async fn get_disk(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Disk>, ComputeError> {
        self.record(ComputeCall::GetDisk(name.to_string()));
        Ok(self.disk(zone, name))
    }

    async fn insert_disk(
        &self,
        _project: &str,
        zone: &str,
        disk: &Disk,
    ) -> Result<Operation, ComputeError> {
        self.record(ComputeCall::InsertDisk(disk.name.clone()));
        let url = format!("zones/{zone}/disks/{}", disk.name);
        if !self.begin_insert(&url)? {
            return Ok(Self::operation("insert", &disk.name));
        }

        let key = (zone.to_string(), disk.name.clone());
        let mut state = self.lock();
        if state.disks.contains_key(&key) {
            return Err(Self::already_exists(&url, &disk.name));
        }
        let mut stored = disk.clone();
        stored.status = Some("READY".to_string());
        state.disks.insert(key, stored);
        Ok(Self::operation("insert", &disk.name))
    }

    async fn delete_disk(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
    ) -> Result<bool, ComputeError> {
        self.record(ComputeCall::DeleteDisk(name.to_string()));
        Ok(self
            .lock()
            .disks
            .remove(&(zone.to_string(), name.to_string()))
            .is_some())
    }

    async fn get_instance(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Instance>, ComputeError> {
        self.record(ComputeCall::GetInstance(name.to_string()));
        Ok(self.instance(zone, name))
    }

    async fn insert_instance(
        &self,
        _project: &str,
        zone: &str,
        instance: &Instance,
    ) -> Result<Operation, ComputeError> {
        self.record(ComputeCall::InsertInstance(instance.name.clone()));
        let url = format!("zones/{zone}/instances/{}", instance.name);
        if !self.begin_insert(&url)? {
            return Ok(Self::operation("insert", &instance.name));
        }

        let key = (zone.to_string(), instance.name.clone());
        let mut state = self.lock();
        if state.instances.contains_key(&key) {
            return Err(Self::already_exists(&url, &instance.name));
        }

        let mut stored = instance.clone();
        stored.status = Some(
            state
                .new_instance_status
                .clone()
                .unwrap_or_else(|| INSTANCE_STATUS_RUNNING.to_string()),
        );
        for nic in &mut stored.network_interfaces {
            nic.network_ip.clone_from(&state.internal_ip);
            for access in &mut nic.access_configs {
                access.nat_ip.clone_from(&state.external_ip);
            }
        }
        state.instances.insert(key, stored);
        Ok(Self::operation("insert", &instance.name))
    }

    async fn delete_instance(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
    ) -> Result<bool, ComputeError> {
        self.record(ComputeCall::DeleteInstance(name.to_string()));
        Ok(self
            .lock()
            .instances
            .remove(&(zone.to_string(), name.to_string()))
            .is_some())
    }

    async fn list_zones(&self, _project: &str, region: &str) -> Result<Vec<Zone>, ComputeError> {
        self.record(ComputeCall::ListZones(region.to_string()));
        Ok(self
            .lock()
            .zones
            .iter()
            .filter(|zone| zone.in_region(region))
            .cloned()
            .collect())
    }
}
