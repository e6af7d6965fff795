// Common test utilities for integration tests

#![allow(dead_code)]

use gcp_bastion::compute::fake::InMemoryComputeClient;
use gcp_bastion::compute::Zone;
use gcp_bastion::crd::{Bastion, BastionIngressPolicy, BastionSpec, IpBlock};
use gcp_bastion::reconcilers::bastion::{
    BastionContext, BastionIntent, ClusterContext, ReconcileSettings,
};
use gcp_bastion::reconcilers::retry::BackoffPolicy;
use gcp_bastion::reconcilers::status::InMemoryStatusStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::sync::Arc;
use std::time::Duration;

pub const PROJECT: &str = "my-project";
pub const REGION: &str = "europe-west1";
pub const NAMESPACE: &str = "shoot--dev";
pub const CLUSTER: &str = "shoot--dev-cluster";

/// Everything a lifecycle test needs, wired to in-memory doubles.
pub struct Harness {
    pub compute: Arc<InMemoryComputeClient>,
    pub status: Arc<InMemoryStatusStore>,
    pub ctx: BastionContext,
    pub cluster: ClusterContext,
}

pub fn zone(name: &str, status: &str) -> Zone {
    Zone {
        name: name.to_string(),
        region: Some(format!(
            "https://www.googleapis.com/compute/v1/projects/{PROJECT}/regions/{REGION}"
        )),
        status: Some(status.to_string()),
    }
}

pub fn cluster() -> ClusterContext {
    ClusterContext {
        cluster_name: CLUSTER.to_string(),
        region: REGION.to_string(),
        network: "shoot-net".to_string(),
        subnetwork: "shoot-nodes".to_string(),
        workers_cidr: "10.250.0.0/16".to_string(),
    }
}

/// Harness whose region lists `zones`, with status writes retried instantly.
pub fn harness(zones: Vec<Zone>) -> Harness {
    let compute = Arc::new(InMemoryComputeClient::new().with_zones(zones));
    let status = Arc::new(InMemoryStatusStore::new());
    let ctx = BastionContext {
        compute: compute.clone(),
        status: status.clone(),
        project_id: PROJECT.to_string(),
        settings: ReconcileSettings {
            status_backoff: BackoffPolicy {
                initial_interval: Duration::ZERO,
                max_interval: Duration::ZERO,
                randomization_factor: 0.0,
                ..BackoffPolicy::default()
            },
            ..ReconcileSettings::default()
        },
    };
    Harness {
        compute,
        status,
        ctx,
        cluster: cluster(),
    }
}

/// A `Bastion` resource allowing SSH from `cidrs`.
pub fn bastion(name: &str, cidrs: &[&str]) -> Bastion {
    Bastion {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: BastionSpec {
            // "#!/bin/sh\necho ready\n"
            user_data: Some("IyEvYmluL3NoCmVjaG8gcmVhZHkK".to_string()),
            ingress: Some(
                cidrs
                    .iter()
                    .map(|cidr| BastionIngressPolicy {
                        ip_block: IpBlock {
                            cidr: (*cidr).to_string(),
                        },
                    })
                    .collect(),
            ),
            zone: None,
            region: None,
        },
        status: None,
    }
}

/// Intent of [`bastion`], registered with the status store.
pub fn intent(harness: &Harness, name: &str, cidrs: &[&str]) -> BastionIntent {
    let intent = BastionIntent::from_bastion(&bastion(name, cidrs)).expect("valid bastion");
    harness.status.insert(&intent.key);
    intent
}
