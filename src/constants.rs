// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the bastion operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for `Bastion` resource
pub const KIND_BASTION: &str = "Bastion";

/// Finalizer guarding cloud resources owned by a `Bastion`
pub const BASTION_FINALIZER: &str = "bastion.gcp.io/finalizer";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "gcp-bastion-controller";

// ============================================================================
// Compute Engine Constants
// ============================================================================

/// Default Compute Engine v1 REST endpoint
pub const DEFAULT_COMPUTE_API_URL: &str = "https://compute.googleapis.com/compute/v1";

/// SSH port opened on the bastion
pub const SSH_PORT: u16 = 22;

/// Boot disk size for the bastion instance
pub const BASTION_DISK_SIZE_GB: i64 = 10;

/// Image family the bastion boots from
pub const BASTION_DISK_IMAGE: &str = "projects/debian-cloud/global/images/family/debian-11";

/// Machine type of the bastion instance
pub const BASTION_MACHINE_TYPE: &str = "n1-standard-1";

/// Lifecycle state of a usable instance
pub const INSTANCE_STATUS_RUNNING: &str = "RUNNING";

/// Status of a finished long-running operation
pub const OPERATION_STATUS_DONE: &str = "DONE";

/// Lifecycle state of a usable zone
pub const ZONE_STATUS_UP: &str = "UP";

/// Firewall priority of the deny-all egress rule
pub const EGRESS_DENY_ALL_PRIORITY: i64 = 1000;

/// Firewall priority of the worker egress rule (must win over deny-all)
pub const EGRESS_ALLOW_ONLY_PRIORITY: i64 = 60;

/// Source range used when a `Bastion` does not declare any ingress CIDRs
pub const DEFAULT_INGRESS_CIDR: &str = "0.0.0.0/0";

/// Destination range of the deny-all egress rule
pub const ANY_IPV4_CIDR: &str = "0.0.0.0/0";

/// Access config name for the external NAT address
pub const EXTERNAL_NAT_NAME: &str = "External NAT";

/// Access config type for the external NAT address
pub const EXTERNAL_NAT_TYPE: &str = "ONE_TO_ONE_NAT";

/// Metadata key holding the boot-time user data
pub const METADATA_STARTUP_SCRIPT: &str = "startup-script";

/// Metadata key disabling project-wide SSH keys
pub const METADATA_BLOCK_PROJECT_SSH_KEYS: &str = "block-project-ssh-keys";

// ============================================================================
// Resource Naming Constants
// ============================================================================

/// Longest `<cluster>-<bastion>` prefix kept in generated resource names.
///
/// Compute Engine names are capped at 63 characters; 33 leaves room for the
/// `-bastion-` infix, the hash and the longest suffix (`-egress-worker`).
pub const MAX_BASE_NAME_LEN: usize = 33;

/// Number of hex digits of the SHA-256 appended to generated names
pub const NAME_HASH_LEN: usize = 5;

/// Suffix of the boot disk name
pub const DISK_SUFFIX: &str = "-disk";

/// Suffix of the ingress SSH firewall rule name
pub const FIREWALL_ALLOW_SSH_SUFFIX: &str = "-allow-ssh";

/// Suffix of the worker egress firewall rule name
pub const FIREWALL_EGRESS_WORKER_SUFFIX: &str = "-egress-worker";

/// Suffix of the deny-all egress firewall rule name
pub const FIREWALL_DENY_ALL_SUFFIX: &str = "-deny-all";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Delay before re-checking a bastion whose endpoints are not published yet
pub const ENDPOINT_REQUEUE_SECS: u64 = 5;

/// Requeue delay used by the error policy after a failed reconciliation
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Upper bound for a single reconcile or delete pass
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;

/// Default number of bastions reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 5;

/// Default bind address of the metrics server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Timeout for a single Compute Engine HTTP request
pub const COMPUTE_HTTP_TIMEOUT_SECS: u64 = 30;

/// Pause between two polls of a pending Compute Engine operation
pub const COMPUTE_OPERATION_POLL_INTERVAL_SECS: u64 = 2;

/// Page size requested from paginated Compute Engine list calls
pub const COMPUTE_LIST_PAGE_SIZE: u32 = 500;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
