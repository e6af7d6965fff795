// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Compute Engine calls, status updates and bastion reconciliation.
//!
//! This module provides specialized error types for:
//! - Compute Engine REST API failures (transport, API-reported, decoding)
//! - Optimistic status updates against the `Bastion` status subresource
//! - The reconciliation core (invalid intent, provider anomalies, cancellation)
//!
//! These errors provide structured error handling for the reconciler,
//! enabling better error reporting in status conditions and metrics.

use crate::status_reasons::{
    REASON_CANCELLED, REASON_COMPUTE_ERROR, REASON_DEADLINE_EXCEEDED, REASON_INSTANCE_NOT_RUNNING,
    REASON_INVALID_INTENT, REASON_NO_ACCESS_CONFIG, REASON_NO_NETWORK_INTERFACE,
    REASON_PROVIDER_QUERY_FAILED, REASON_RESOURCE_CREATE_FAILED, REASON_STATUS_UPDATE_FAILED,
};
use thiserror::Error;

/// Errors returned by a [`ComputeClient`](crate::compute::ComputeClient).
///
/// The reconciler does not distinguish these beyond wrapping them with
/// context; the variants exist for logging and tests.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// The request never produced an HTTP response (DNS, TLS, connection reset, timeout)
    #[error("compute API request to {url} failed: {source}")]
    Transport {
        /// URL of the failed request
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status (quota, invalid field, conflict, ...)
    #[error("compute API returned HTTP {status} for {url}: {message}")]
    Api {
        /// URL of the failed request
        url: String,
        /// HTTP status code
        status: u16,
        /// Message from the Google error envelope, or the raw body
        message: String,
    },

    /// The response body did not match the expected resource shape
    #[error("failed to decode compute API response from {url}: {reason}")]
    Decode {
        /// URL of the request whose response failed to decode
        url: String,
        /// Decoder error message
        reason: String,
    },

    /// A long-running operation finished with errors
    #[error("compute operation {url} failed: {message}")]
    OperationFailed {
        /// URL of the operation
        url: String,
        /// `code: message` pairs reported by the operation
        message: String,
    },

    /// No bearer token could be read for the request
    #[error("compute API access token unavailable: {0}")]
    TokenUnavailable(String),
}

impl ComputeError {
    /// Returns `true` when the API reported that the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Errors that can occur while writing the `Bastion` status.
#[derive(Error, Debug)]
pub enum StatusError {
    /// The stored object changed since it was read (HTTP 409)
    #[error("status of {key} was modified concurrently")]
    Conflict {
        /// `namespace/name` of the resource
        key: String,
    },

    /// The resource no longer exists
    #[error("bastion {key} not found")]
    NotFound {
        /// `namespace/name` of the resource
        key: String,
    },

    /// Any other API failure
    #[error("status update of {key} failed: {reason}")]
    Api {
        /// `namespace/name` of the resource
        key: String,
        /// Explanation of the failure
        reason: String,
    },

    /// Every attempt hit a conflict
    #[error("status update of {key} still conflicting after {attempts} attempts")]
    RetriesExhausted {
        /// `namespace/name` of the resource
        key: String,
        /// Number of attempts made
        attempts: u32,
    },
}

impl StatusError {
    /// Returns `true` for optimistic-concurrency conflicts that warrant a re-read.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors produced by a reconcile or delete pass over a bastion.
///
/// Every variant is terminal for the current pass. "Endpoints not ready yet"
/// is deliberately not an error; it is expressed as
/// [`Verdict::RequeueAfter`](crate::reconcilers::bastion::Verdict::RequeueAfter).
#[derive(Error, Debug)]
pub enum BastionError {
    /// The declared intent or the cluster context is malformed
    #[error("invalid bastion intent: {0}")]
    InvalidIntent(String),

    /// A provider lookup needed before any resource work failed
    #[error("provider query failed: {0}")]
    ProviderQuery(String),

    /// A resource was created but could not be found afterwards
    #[error("failed to get (create) {kind} {name}: not found after creation")]
    ResourceCreate {
        /// Resource kind (`disk`, `instance`, `firewall`)
        kind: &'static str,
        /// Resource name
        name: String,
    },

    /// The instance exists but is not in the `RUNNING` state
    #[error("instance {name} not running, status: {status}")]
    InstanceNotRunning {
        /// Instance name
        name: String,
        /// Reported lifecycle state
        status: String,
    },

    /// The instance has no network interface at all
    #[error("no network interfaces found: {0}")]
    NoNetworkInterface(String),

    /// The first network interface has no access config (no external address slot)
    #[error("no access config found for network interface: {0}")]
    NoAccessConfig(String),

    /// A Compute Engine call failed
    #[error("{context}: {source}")]
    Compute {
        /// What the reconciler was doing
        context: String,
        /// Underlying client error
        #[source]
        source: ComputeError,
    },

    /// Publishing the status failed after retries
    #[error("failed to store {what} in status: {source}")]
    StatusUpdate {
        /// Which status field was being written
        what: &'static str,
        /// Underlying store error
        #[source]
        source: StatusError,
    },

    /// The pass was cancelled by the caller
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The pass ran into its deadline
    #[error("reconciliation exceeded its deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl BastionError {
    /// Wrap a compute error with a description of the failed step.
    pub fn compute(context: impl Into<String>, source: ComputeError) -> Self {
        Self::Compute {
            context: context.into(),
            source,
        }
    }

    /// Condition reason reported on the `Bastion` for this error.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidIntent(_) => REASON_INVALID_INTENT,
            Self::ProviderQuery(_) => REASON_PROVIDER_QUERY_FAILED,
            Self::ResourceCreate { .. } => REASON_RESOURCE_CREATE_FAILED,
            Self::InstanceNotRunning { .. } => REASON_INSTANCE_NOT_RUNNING,
            Self::NoNetworkInterface(_) => REASON_NO_NETWORK_INTERFACE,
            Self::NoAccessConfig(_) => REASON_NO_ACCESS_CONFIG,
            Self::Compute { .. } => REASON_COMPUTE_ERROR,
            Self::StatusUpdate { .. } => REASON_STATUS_UPDATE_FAILED,
            Self::Cancelled => REASON_CANCELLED,
            Self::DeadlineExceeded(_) => REASON_DEADLINE_EXCEEDED,
        }
    }

    /// Low-cardinality label used for the `errors_total` metric.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::InvalidIntent(_) => "invalid_intent",
            Self::ProviderQuery(_) => "provider_query",
            Self::ResourceCreate { .. } => "resource_create",
            Self::InstanceNotRunning { .. } => "instance_not_running",
            Self::NoNetworkInterface(_) | Self::NoAccessConfig(_) => "network_anomaly",
            Self::Compute { .. } => "compute_api",
            Self::StatusUpdate { .. } => "status_update",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
