// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `Bastion` resources.
//!
//! # Available Reconcilers
//!
//! - [`reconcile_bastion`] - Creates firewall rules, disk and instance, then
//!   publishes the public endpoint
//! - [`delete_bastion`] - Removes every provider resource of a bastion
//!
//! # Supporting Modules
//!
//! - [`status`] - Status store with optimistic concurrency and condition helpers
//! - [`retry`] - Exponential backoff for conflicting status writes
//!
//! # Example: Running a pass against the in-memory doubles
//!
//! ```rust,no_run
//! use gcp_bastion::compute::fake::InMemoryComputeClient;
//! use gcp_bastion::reconcilers::bastion::{BastionContext, BastionIntent, ClusterContext};
//! use gcp_bastion::reconcilers::reconcile_bastion;
//! use gcp_bastion::reconcilers::status::InMemoryStatusStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(intent: BastionIntent, cluster: ClusterContext) {
//!     let ctx = BastionContext {
//!         compute: Arc::new(InMemoryComputeClient::new()),
//!         status: Arc::new(InMemoryStatusStore::new()),
//!         project_id: "my-project".to_string(),
//!         settings: Default::default(),
//!     };
//!     let verdict = reconcile_bastion(&ctx, &intent, &cluster, &CancellationToken::new()).await;
//!     println!("{verdict:?}");
//! }
//! ```

pub mod bastion;
pub mod retry;
pub mod status;

pub use bastion::{delete_bastion, reconcile_bastion, Verdict};
