// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use gcp_bastion::{
    config::{Args, LogFormat},
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    controller::run_bastion_controller,
    metrics,
};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("gcp-bastion-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging(format: LogFormat) {
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_logging(args.log_format);

    info!("Starting GCP Bastion Controller");
    let config = args.controller_config()?;
    debug!(
        project = %config.project_id,
        cluster = %config.cluster.cluster_name,
        region = %config.cluster.region,
        "Configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(Context::from_config(client, &config, shutdown.clone())?);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let metrics_addr = config.metrics_addr;
    let metrics_token = shutdown.clone();
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, metrics_token).await {
            error!(error = %e, addr = %metrics_addr, "Metrics server failed");
        }
    });

    let result = run_bastion_controller(ctx, config.max_concurrent_reconciles).await;
    shutdown.cancel();
    if let Err(e) = metrics_server.await {
        error!(error = %e, "Metrics server task panicked");
    }

    info!("GCP Bastion Controller stopped");
    result
}
