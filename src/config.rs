// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every setting comes from a command-line flag with an environment variable
//! fallback. [`Args::controller_config`] validates the raw values once at
//! startup and produces an immutable [`ControllerConfig`] that is handed to
//! the controller context.

use crate::constants::{
    DEFAULT_COMPUTE_API_URL, DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_METRICS_ADDR,
    DEFAULT_RECONCILE_TIMEOUT_SECS, ENDPOINT_REQUEUE_SECS,
};
use crate::reconcilers::bastion::options::parse_workers_cidr;
use crate::reconcilers::bastion::{ClusterContext, ReconcileSettings};
use crate::reconcilers::retry::BackoffPolicy;
use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line arguments of the controller.
#[derive(Clone, Debug, Parser)]
#[command(name = "gcp-bastion", version, about = "GCP bastion host controller")]
pub struct Args {
    /// Project that owns the bastion resources
    #[arg(long, env = "GCP_PROJECT_ID")]
    pub project_id: String,

    /// Name of the cluster the bastions belong to
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Region of the cluster
    #[arg(long, env = "GCP_REGION")]
    pub region: String,

    /// VPC network name
    #[arg(long, env = "GCP_NETWORK")]
    pub network: String,

    /// Subnetwork name of the worker nodes
    #[arg(long, env = "GCP_SUBNETWORK")]
    pub subnetwork: String,

    /// CIDR of the worker nodes, the only egress target of a bastion
    #[arg(long, env = "WORKERS_CIDR")]
    pub workers_cidr: String,

    /// Base URL of the Compute Engine v1 API
    #[arg(long, env = "COMPUTE_API_URL", default_value = DEFAULT_COMPUTE_API_URL)]
    pub compute_api_url: Url,

    /// File holding an OAuth2 access token, re-read on every request
    #[arg(long, env = "GCP_ACCESS_TOKEN_FILE")]
    pub access_token_file: Option<PathBuf>,

    #[arg(
        long,
        env = "MAX_CONCURRENT_RECONCILES",
        default_value_t = DEFAULT_MAX_CONCURRENT_RECONCILES
    )]
    pub max_concurrent_reconciles: u16,

    /// Delay before re-checking a bastion whose endpoints are not assigned yet
    #[arg(long, env = "REQUEUE_DELAY_SECS", default_value_t = ENDPOINT_REQUEUE_SECS)]
    pub requeue_delay_secs: u64,

    /// Upper bound of a single reconcile or delete pass
    #[arg(
        long,
        env = "RECONCILE_TIMEOUT_SECS",
        default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS
    )]
    pub reconcile_timeout_secs: u64,

    /// Listen address of the `/metrics` and `/healthz` endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    #[arg(
        long,
        env = "RUST_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value = "text"
    )]
    pub log_format: LogFormat,
}

/// Validated controller settings.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub project_id: String,
    pub cluster: ClusterContext,
    pub settings: ReconcileSettings,
    pub compute_api_url: Url,
    pub access_token_file: Option<PathBuf>,
    pub max_concurrent_reconciles: u16,
    pub metrics_addr: SocketAddr,
}

impl Args {
    /// Validate the arguments and build the controller configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a required value is blank, the workers CIDR does
    /// not parse, or a duration or concurrency limit is zero.
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        for (flag, value) in [
            ("--project-id", &self.project_id),
            ("--cluster-name", &self.cluster_name),
            ("--region", &self.region),
            ("--network", &self.network),
            ("--subnetwork", &self.subnetwork),
        ] {
            if value.trim().is_empty() {
                bail!("{flag} must not be empty");
            }
        }

        parse_workers_cidr(&self.workers_cidr).context("invalid --workers-cidr")?;

        if self.max_concurrent_reconciles == 0 {
            bail!("--max-concurrent-reconciles must be at least 1");
        }
        if self.requeue_delay_secs == 0 {
            bail!("--requeue-delay-secs must be at least 1");
        }
        if self.reconcile_timeout_secs == 0 {
            bail!("--reconcile-timeout-secs must be at least 1");
        }

        Ok(ControllerConfig {
            project_id: self.project_id.clone(),
            cluster: ClusterContext {
                cluster_name: self.cluster_name.clone(),
                region: self.region.clone(),
                network: self.network.clone(),
                subnetwork: self.subnetwork.clone(),
                workers_cidr: self.workers_cidr.clone(),
            },
            settings: ReconcileSettings {
                requeue_after: Duration::from_secs(self.requeue_delay_secs),
                timeout: Duration::from_secs(self.reconcile_timeout_secs),
                status_backoff: BackoffPolicy::default(),
            },
            compute_api_url: self.compute_api_url.clone(),
            access_token_file: self.access_token_file.clone(),
            max_concurrent_reconciles: self.max_concurrent_reconciles,
            metrics_addr: self.metrics_addr,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
