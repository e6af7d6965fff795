// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # gcp-bastion - SSH bastion hosts on Google Compute Engine
//!
//! A Kubernetes operator that turns `Bastion` custom resources into a running
//! Compute Engine instance with its disk and firewall rules, and reports the
//! instance's public address back in the resource status.
//!
//! ## Overview
//!
//! Every pass is idempotent: provider resources are looked up by their
//! deterministic names and created only when missing. A pass ends in a
//! [`reconcilers::Verdict`]: success, a requeue while the instance is still
//! being assigned addresses, or a failure.
//!
//! ## Modules
//!
//! - [`crd`] - The `Bastion` custom resource
//! - [`reconcilers`] - Reconcile and teardown passes, status store
//! - [`compute`] - Compute Engine client capability and implementations
//! - [`controller`] - `kube::runtime::Controller` wiring
//! - [`config`] - Command-line and environment configuration
//! - [`context`] - Shared controller context
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use gcp_bastion::crd::{BastionIngressPolicy, BastionSpec, IpBlock};
//!
//! let spec = BastionSpec {
//!     user_data: None,
//!     ingress: Some(vec![BastionIngressPolicy {
//!         ip_block: IpBlock {
//!             cidr: "203.0.113.0/24".to_string(),
//!         },
//!     }]),
//!     zone: None,
//!     region: None,
//! };
//! ```

pub mod compute;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;
