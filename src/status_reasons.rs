// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for `Bastion` resources.
//!
//! This module defines constants for condition reasons following Kubernetes conventions.
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! A `Bastion` carries a single `type: Ready` condition. It turns `True` once
//! both the private and the public endpoint of the instance are known and the
//! public one has been published in `status.ingress`.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   providerStatus:
//!     zone: europe-west1-b
//!   ingress:
//!     ip: 34.1.2.3
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: EndpointsReady
//!       message: "Bastion is reachable at 34.1.2.3"
//! ```

// ============================================================================
// Progress Reasons
// ============================================================================

/// Public and private endpoints are both available.
pub const REASON_ENDPOINTS_READY: &str = "EndpointsReady";

// ============================================================================
// Failure Reasons
// ============================================================================

/// The `Bastion` spec or the cluster context is malformed (bad CIDR, missing network).
pub const REASON_INVALID_INTENT: &str = "InvalidIntent";

/// A lookup against the provider failed, e.g. no usable zone in the region.
pub const REASON_PROVIDER_QUERY_FAILED: &str = "ProviderQueryFailed";

/// A resource was accepted by the provider but could not be read back.
pub const REASON_RESOURCE_CREATE_FAILED: &str = "ResourceCreateFailed";

/// The instance exists but is stopped, suspended or otherwise not `RUNNING`.
pub const REASON_INSTANCE_NOT_RUNNING: &str = "InstanceNotRunning";

/// The instance has no network interface.
pub const REASON_NO_NETWORK_INTERFACE: &str = "NoNetworkInterface";

/// The instance's network interface has no external access config.
pub const REASON_NO_ACCESS_CONFIG: &str = "NoAccessConfig";

/// A Compute Engine API call failed (transport, quota, invalid field, conflict).
pub const REASON_COMPUTE_ERROR: &str = "ComputeError";

/// Writing the status kept conflicting or failed.
pub const REASON_STATUS_UPDATE_FAILED: &str = "StatusUpdateFailed";

/// The pass was cancelled before it finished.
pub const REASON_CANCELLED: &str = "Cancelled";

/// The pass ran longer than the configured reconcile timeout.
pub const REASON_DEADLINE_EXCEEDED: &str = "DeadlineExceeded";

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition of a `Bastion`
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition status string for a satisfied condition
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status string for an unsatisfied condition
pub const CONDITION_STATUS_FALSE: &str = "False";
