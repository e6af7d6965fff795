// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `teardown.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::compute::fake::{ComputeCall, InMemoryComputeClient};
    use crate::errors::BastionError;
    use crate::reconcilers::bastion::ensure::{ensure_disk, ensure_firewall_rules, ensure_instance};
    use crate::reconcilers::bastion::types::ResolvedOptions;
    use crate::compute::rest::{RestComputeClient, TokenSource};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> ResolvedOptions {
        ResolvedOptions {
            project_id: "my-project".into(),
            region: "europe-west1".into(),
            zone: "europe-west1-b".into(),
            network: "projects/my-project/global/networks/net".into(),
            subnetwork: "regions/europe-west1/subnetworks/nodes".into(),
            cidrs: vec!["0.0.0.0/0".into()],
            workers_cidr: "10.250.0.0/16".into(),
            instance_name: "c-b-bastion-abcde".into(),
            disk_name: "c-b-bastion-abcde-disk".into(),
            firewall_allow_ssh: "c-b-bastion-abcde-allow-ssh".into(),
            firewall_egress_worker: "c-b-bastion-abcde-egress-worker".into(),
            firewall_deny_all: "c-b-bastion-abcde-deny-all".into(),
            user_data: String::new(),
        }
    }

    async fn provision(compute: &InMemoryComputeClient, opt: &ResolvedOptions) {
        let cancel = CancellationToken::new();
        ensure_firewall_rules(compute, opt, &cancel).await.unwrap();
        ensure_disk(compute, opt, &cancel).await.unwrap();
        ensure_instance(compute, opt, &cancel).await.unwrap();
        compute.clear_calls();
    }

    #[tokio::test]
    async fn test_deletes_in_reverse_dependency_order() {
        let compute = InMemoryComputeClient::new();
        let opt = options();
        provision(&compute, &opt).await;
        assert_eq!(compute.resource_count(), 5);

        delete_resources(&compute, &opt, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            compute.calls(),
            vec![
                ComputeCall::DeleteInstance(opt.instance_name.clone()),
                ComputeCall::DeleteDisk(opt.disk_name.clone()),
                ComputeCall::DeleteFirewall(opt.firewall_allow_ssh.clone()),
                ComputeCall::DeleteFirewall(opt.firewall_deny_all.clone()),
                ComputeCall::DeleteFirewall(opt.firewall_egress_worker.clone()),
            ]
        );
        assert_eq!(compute.resource_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_of_nothing_succeeds() {
        let compute = InMemoryComputeClient::new();

        delete_resources(&compute, &options(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(compute.calls().iter().all(|c| !c.is_insert()));
    }

    #[tokio::test]
    async fn test_cancelled_teardown_stops() {
        let compute = InMemoryComputeClient::new();
        let opt = options();
        provision(&compute, &opt).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = delete_resources(&compute, &opt, &cancel).await.unwrap_err();

        assert!(matches!(err, BastionError::Cancelled));
        assert_eq!(compute.resource_count(), 5);
    }

    #[tokio::test]
    async fn test_disk_is_deleted_only_after_instance_is_released() {
        let server = MockServer::start().await;
        let zone_path = "/compute/v1/projects/my-project/zones/europe-west1-b";
        Mock::given(method("DELETE"))
            .and(path(format!("{zone_path}/instances/c-b-bastion-abcde")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-instance",
                "status": "RUNNING"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{zone_path}/operations/op-instance")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-instance",
                "status": "RUNNING"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{zone_path}/operations/op-instance")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-instance",
                "status": "DONE"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{zone_path}/disks/c-b-bastion-abcde-disk")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "op-disk",
                "status": "DONE"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"/global/firewalls/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/compute/v1", server.uri())).unwrap();
        let compute = RestComputeClient::new(base, TokenSource::Anonymous)
            .unwrap()
            .with_operation_poll_interval(Duration::ZERO);

        delete_resources(&compute, &options(), &CancellationToken::new())
            .await
            .unwrap();

        let seen: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect();
        let disk_delete = seen
            .iter()
            .position(|r| r.ends_with("/disks/c-b-bastion-abcde-disk"))
            .unwrap();
        let last_poll = seen
            .iter()
            .rposition(|r| r.ends_with("/operations/op-instance"))
            .unwrap();
        assert_eq!(seen.len(), 8, "{seen:?}");
        assert!(last_poll < disk_delete, "{seen:?}");
    }
}
