// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the bastion controller.
//!
//! The controller receives an `Arc<Context>` that contains:
//! - the Kubernetes client used for finalizer patches
//! - the [`BastionContext`] handed to every reconcile and delete pass
//! - the cluster facts every bastion of this controller shares
//! - the shutdown token raced by every provider call

use crate::compute::rest::{RestComputeClient, TokenSource};
use crate::compute::ComputeClient;
use crate::config::ControllerConfig;
use crate::errors::ComputeError;
use crate::reconcilers::bastion::{BastionContext, ClusterContext};
use crate::reconcilers::status::{KubeStatusStore, StatusStore};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared context passed to the bastion controller.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Capabilities and settings of a bastion pass
    pub bastion: BastionContext,

    /// Cluster the bastions belong to
    pub cluster: ClusterContext,

    /// Cancelled when the process shuts down
    pub shutdown: CancellationToken,
}

impl Context {
    /// Assemble a context from explicit capabilities.
    #[must_use]
    pub fn new(
        client: Client,
        config: &ControllerConfig,
        compute: Arc<dyn ComputeClient>,
        status: Arc<dyn StatusStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            bastion: BastionContext {
                compute,
                status,
                project_id: config.project_id.clone(),
                settings: config.settings,
            },
            cluster: config.cluster.clone(),
            shutdown,
        }
    }

    /// Context backed by the Compute Engine REST API and the Kubernetes
    /// status subresource.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        client: Client,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ComputeError> {
        let token = config
            .access_token_file
            .clone()
            .map_or(TokenSource::Anonymous, TokenSource::File);
        let compute = RestComputeClient::new(config.compute_api_url.clone(), token)?;
        let status = KubeStatusStore::new(client.clone());

        Ok(Self::new(
            client,
            config,
            Arc::new(compute),
            Arc::new(status),
            shutdown,
        ))
    }
}
