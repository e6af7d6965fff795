// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the bastion operator.
//!
//! All metrics share the namespace prefix `gcp_bastion` and are registered in
//! [`METRICS_REGISTRY`], which the binary serves on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - passes by operation and outcome, their duration and requeues
//! - **Provider Resource Metrics** - Compute Engine resources created, patched and deleted
//! - **Error Metrics** - failed passes by error category
//!
//! # Example
//!
//! ```rust,no_run
//! use gcp_bastion::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("reconcile", std::time::Duration::from_secs(1));
//! ```

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "gcp_bastion";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).expect("valid counter definition");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of passes
///
/// Labels:
/// - `operation`: `reconcile` or `delete`
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "reconciliations_total",
        "Total number of bastion passes by operation and status",
        &["operation", "status"],
    )
});

/// Duration of passes in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of bastion passes in seconds by operation",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).expect("valid histogram definition");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("histogram registered once");
    histogram
});

/// Total number of requeues
///
/// Labels:
/// - `reason`: `endpoints_pending` or `error`
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "requeues_total",
        "Total number of requeues by reason",
        &["reason"],
    )
});

// ============================================================================
// Provider Resource Metrics
// ============================================================================

/// Compute Engine resources created, by kind (`firewall`, `disk`, `instance`)
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "resources_created_total",
        "Total number of provider resources created by kind",
        &["kind"],
    )
});

/// Firewall rules patched to fix source range drift
pub static RESOURCES_PATCHED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "resources_patched_total",
        "Total number of provider resources patched by kind",
        &["kind"],
    )
});

/// Compute Engine resources deleted, by kind
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "resources_deleted_total",
        "Total number of provider resources deleted by kind",
        &["kind"],
    )
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed passes by error category
///
/// Labels:
/// - `error_type`: see `BastionError::metric_label`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "errors_total",
        "Total number of failed bastion passes by error category",
        &["error_type"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

fn observe(operation: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a pass that finished its work.
pub fn record_reconciliation_success(operation: &str, duration: Duration) {
    observe(operation, "success", duration);
}

/// Record a pass that stopped early and asked to run again.
pub fn record_reconciliation_requeue(operation: &str, reason: &str, duration: Duration) {
    observe(operation, "requeue", duration);
    REQUEUE_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a requeue scheduled by the controller's error policy.
pub fn record_error_requeue() {
    REQUEUE_TOTAL.with_label_values(&["error"]).inc();
}

/// Record a failed pass.
pub fn record_reconciliation_error(operation: &str, error_type: &str, duration: Duration) {
    observe(operation, "error", duration);
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Record resource creation
pub fn record_resource_created(kind: &str) {
    RESOURCES_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a drift patch
pub fn record_resource_patched(kind: &str) {
    RESOURCES_PATCHED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record resource deletion
pub fn record_resource_deleted(kind: &str) {
    RESOURCES_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

/// Router serving `/metrics` and `/healthz`.
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

/// Serve the metrics router on `addr` until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Serving /metrics and /healthz");

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
