// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Optimistic status updates for `Bastion` resources.
//!
//! The reconciler never reads the status back; it only hands a mutation to a
//! [`StatusStore`]. A store re-reads the stored object, applies the mutation
//! to a copy and writes it back guarded by the object's `resourceVersion`.
//! Conflicting writes are retried with [`retry_on_conflict`].
//!
//! # Condition Format
//!
//! Conditions follow the standard Kubernetes shape:
//! - `type`: always `Ready` for bastions
//! - `status`: "True" or "False"
//! - `reason`: a programmatic identifier (CamelCase)
//! - `message`: a human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status flip
//!
//! # Example
//!
//! ```rust,no_run
//! use gcp_bastion::reconcilers::status::create_condition;
//!
//! let condition = create_condition("Ready", "True", "EndpointsReady", "Reachable at 34.1.2.3");
//! ```

use super::retry::{retry_on_conflict, BackoffPolicy, Retryable};
use crate::constants::FIELD_MANAGER;
use crate::crd::{Bastion, BastionStatus, Condition, LastError, ProviderStatus};
use crate::errors::StatusError;
use crate::status_reasons::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::LoadBalancerIngress;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Mutation applied to a freshly read status. May run more than once.
pub type StatusMutation<'a> = &'a (dyn Fn(&mut BastionStatus) + Send + Sync);

/// Namespace and name of a `Bastion`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BastionKey {
    pub namespace: String,
    pub name: String,
}

impl BastionKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BastionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl Retryable for StatusError {
    fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    fn exhausted(self, attempts: u32) -> Self {
        match self {
            Self::Conflict { key } => Self::RetriesExhausted { key, attempts },
            other => other,
        }
    }
}

/// Compare-and-retry access to the `Bastion` status.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Re-read the status, apply `mutate` and write it back, retrying on
    /// conflicts according to `backoff`.
    ///
    /// # Errors
    ///
    /// - [`StatusError::NotFound`] if the resource disappeared
    /// - [`StatusError::RetriesExhausted`] if every attempt conflicted
    /// - [`StatusError::Api`] for any other failure
    async fn try_update_status(
        &self,
        key: &BastionKey,
        backoff: &BackoffPolicy,
        mutate: StatusMutation<'_>,
    ) -> Result<(), StatusError>;
}

/// [`StatusStore`] writing to the `Bastion` status subresource.
#[derive(Clone)]
pub struct KubeStatusStore {
    client: Client,
}

impl KubeStatusStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn update_once(
        &self,
        key: &BastionKey,
        mutate: StatusMutation<'_>,
    ) -> Result<(), StatusError> {
        let api: Api<Bastion> = Api::namespaced(self.client.clone(), &key.namespace);

        let current = api
            .get_status(&key.name)
            .await
            .map_err(|e| map_kube_error(key, e))?;
        let old_status = current.status.clone().unwrap_or_default();
        let mut new_status = old_status.clone();
        mutate(&mut new_status);

        if new_status == old_status {
            debug!(bastion = %key, "Status unchanged, skipping write");
            return Ok(());
        }

        let status_patch =
            status_merge_patch(&old_status, &new_status).map_err(|reason| StatusError::Api {
                key: key.to_string(),
                reason,
            })?;
        let patch = json!({
            "metadata": { "resourceVersion": current.resource_version() },
            "status": status_patch,
        });

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };
        api.patch_status(&key.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(key, e))?;

        debug!(bastion = %key, "Status updated");
        Ok(())
    }
}

#[async_trait]
impl StatusStore for KubeStatusStore {
    async fn try_update_status(
        &self,
        key: &BastionKey,
        backoff: &BackoffPolicy,
        mutate: StatusMutation<'_>,
    ) -> Result<(), StatusError> {
        retry_on_conflict(backoff, "update bastion status", || {
            self.update_once(key, mutate)
        })
        .await
    }
}

fn map_kube_error(key: &BastionKey, err: kube::Error) -> StatusError {
    match err {
        kube::Error::Api(response) if response.code == 409 => StatusError::Conflict {
            key: key.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => StatusError::NotFound {
            key: key.to_string(),
        },
        other => StatusError::Api {
            key: key.to_string(),
            reason: other.to_string(),
        },
    }
}

/// JSON merge patch turning `old` into `new`.
///
/// Fields that are set in `old` but absent in `new` are sent as `null` so the
/// API server removes them; everything present in `new` is sent as-is.
///
/// # Errors
///
/// Returns the serializer message if either status fails to serialize.
pub fn status_merge_patch(old: &BastionStatus, new: &BastionStatus) -> Result<Value, String> {
    let old = serde_json::to_value(old).map_err(|e| e.to_string())?;
    let new = serde_json::to_value(new).map_err(|e| e.to_string())?;

    let mut patch = match new {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    if let Value::Object(old_fields) = old {
        for field in old_fields.keys() {
            if !patch.contains_key(field) {
                patch.insert(field.clone(), Value::Null);
            }
        }
    }
    Ok(Value::Object(patch))
}

#[derive(Default)]
struct StoredBastion {
    resource_version: u64,
    status: BastionStatus,
}

type ConcurrentWriter = Box<dyn Fn(&mut BastionStatus) + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<BastionKey, StoredBastion>,
    pending_conflicts: u32,
    concurrent_writer: Option<ConcurrentWriter>,
    attempts: u32,
}

/// In-memory [`StatusStore`] with conflict injection.
///
/// Every successful write bumps a per-object resource version. Injected
/// conflicts fail the next N attempts; an optional concurrent writer is
/// applied to the stored status each time a conflict fires, simulating another
/// controller winning the race.
#[derive(Default)]
pub struct InMemoryStatusStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a bastion with an empty status.
    pub fn insert(&self, key: &BastionKey) {
        self.lock().objects.entry(key.clone()).or_default();
    }

    /// Fail the next `count` attempts with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().pending_conflicts = count;
    }

    /// Fail the next `count` attempts with a conflict, applying `writer` to
    /// the stored status each time.
    pub fn inject_concurrent_writes(
        &self,
        count: u32,
        writer: impl Fn(&mut BastionStatus) + Send + Sync + 'static,
    ) {
        let mut state = self.lock();
        state.pending_conflicts = count;
        state.concurrent_writer = Some(Box::new(writer));
    }

    #[must_use]
    pub fn status(&self, key: &BastionKey) -> Option<BastionStatus> {
        self.lock().objects.get(key).map(|o| o.status.clone())
    }

    #[must_use]
    pub fn resource_version(&self, key: &BastionKey) -> Option<u64> {
        self.lock().objects.get(key).map(|o| o.resource_version)
    }

    /// Number of write attempts seen, including conflicting ones.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn update_once(&self, key: &BastionKey, mutate: StatusMutation<'_>) -> Result<(), StatusError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.attempts += 1;

        let Some(stored) = state.objects.get_mut(key) else {
            return Err(StatusError::NotFound {
                key: key.to_string(),
            });
        };

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            if let Some(writer) = &state.concurrent_writer {
                writer(&mut stored.status);
                stored.resource_version += 1;
            }
            return Err(StatusError::Conflict {
                key: key.to_string(),
            });
        }

        let mut status = stored.status.clone();
        mutate(&mut status);
        if status != stored.status {
            stored.status = status;
            stored.resource_version += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn try_update_status(
        &self,
        key: &BastionKey,
        backoff: &BackoffPolicy,
        mutate: StatusMutation<'_>,
    ) -> Result<(), StatusError> {
        retry_on_conflict(backoff, "update bastion status", || async {
            self.update_once(key, mutate)
        })
        .await
    }
}

/// Create a new Kubernetes condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place.
///
/// `lastTransitionTime` is preserved when the status does not flip.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(Utc::now().to_rfc3339());
        }
        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Set the `Ready` condition.
pub fn set_ready_condition(status: &mut BastionStatus, ready: bool, reason: &str, message: &str) {
    let value = if ready {
        CONDITION_STATUS_TRUE
    } else {
        CONDITION_STATUS_FALSE
    };
    update_condition_in_memory(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        value,
        reason,
        message,
    );
}

/// Record the zone the bastion lives in.
pub fn record_zone(status: &mut BastionStatus, zone: &str) {
    status.provider_status = Some(ProviderStatus {
        zone: zone.to_string(),
    });
}

/// Publish the public endpoint and mark the bastion ready.
pub fn publish_ingress(status: &mut BastionStatus, ingress: &LoadBalancerIngress, reason: &str) {
    let address = ingress
        .ip
        .as_deref()
        .or(ingress.hostname.as_deref())
        .unwrap_or_default();
    status.ingress = Some(ingress.clone());
    status.last_error = None;
    set_ready_condition(status, true, reason, &format!("Bastion reachable at {address}"));
}

/// Record a failed pass and mark the bastion not ready.
///
/// Repeating the error already on record leaves the status untouched, so a
/// persistent failure does not rewrite the object on every pass.
pub fn record_error(status: &mut BastionStatus, reason: &str, description: &str) {
    let unchanged = status.last_error.as_ref().is_some_and(|e| {
        e.description == description && e.reason.as_deref() == Some(reason)
    });
    if !unchanged {
        status.last_error = Some(LastError {
            description: description.to_string(),
            reason: Some(reason.to_string()),
            last_update_time: Utc::now().to_rfc3339(),
        });
    }
    set_ready_condition(status, false, reason, description);
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
