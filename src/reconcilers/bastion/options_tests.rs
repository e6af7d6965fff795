// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `options.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::compute::fake::{ComputeCall, InMemoryComputeClient};
    use crate::compute::Zone;
    use crate::errors::BastionError;
    use crate::reconcilers::bastion::types::{BastionIntent, ClusterContext};
    use crate::reconcilers::status::BastionKey;
    use tokio_util::sync::CancellationToken;

    fn zone(name: &str, region: &str, status: Option<&str>) -> Zone {
        Zone {
            name: name.to_string(),
            region: Some(format!(
                "https://www.googleapis.com/compute/v1/projects/p/regions/{region}"
            )),
            status: status.map(str::to_string),
        }
    }

    fn cluster() -> ClusterContext {
        ClusterContext {
            cluster_name: "shoot--dev-cluster".into(),
            region: "europe-west1".into(),
            network: "shoot-net".into(),
            subnetwork: "shoot-nodes".into(),
            workers_cidr: "10.250.0.0/16".into(),
        }
    }

    fn intent() -> BastionIntent {
        BastionIntent {
            key: BastionKey::new("shoot--dev", "jump"),
            ingress_cidrs: vec!["1.2.3.4/24".into()],
            user_data: "echo hi".into(),
            ..Default::default()
        }
    }

    fn compute() -> InMemoryComputeClient {
        InMemoryComputeClient::new().with_zones(vec![
            zone("europe-west1-d", "europe-west1", Some("UP")),
            zone("europe-west1-b", "europe-west1", Some("UP")),
            zone("europe-west1-a", "europe-west1", Some("DOWN")),
            zone("us-east1-a", "us-east1", Some("UP")),
        ])
    }

    #[test]
    fn test_base_resource_name() {
        assert_eq!(
            base_resource_name("shoot--dev-cluster", "jump").unwrap(),
            "shoot--dev-cluster-jump-bastion-cf315"
        );
    }

    #[test]
    fn test_base_resource_name_truncates_but_hashes_full_name() {
        let name =
            base_resource_name("shoot--garden-very-long-project-name", "bastion-one").unwrap();
        assert_eq!(name, "shoot--garden-very-long-project-n-bastion-0647c");
    }

    #[test]
    fn test_base_resource_name_is_lowercase() {
        let name = base_resource_name("Shoot", "Jump").unwrap();
        assert_eq!(name, name.to_lowercase());
    }

    #[test]
    fn test_base_resource_name_requires_both_parts() {
        assert!(matches!(
            base_resource_name("", "jump"),
            Err(BastionError::InvalidIntent(_))
        ));
        assert!(matches!(
            base_resource_name("cluster", ""),
            Err(BastionError::InvalidIntent(_))
        ));
    }

    #[test]
    fn test_normalize_cidrs_masks_host_bits_and_keeps_order() {
        let cidrs = normalize_cidrs(&["5.6.7.8/24".into(), "1.2.3.4/32".into()]).unwrap();
        assert_eq!(cidrs, vec!["5.6.7.0/24", "1.2.3.4/32"]);
    }

    #[test]
    fn test_normalize_cidrs_skips_ipv6() {
        let cidrs = normalize_cidrs(&["2001:db8::/32".into(), "10.1.2.3/8".into()]).unwrap();
        assert_eq!(cidrs, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_normalize_cidrs_defaults_to_any() {
        assert_eq!(normalize_cidrs(&[]).unwrap(), vec!["0.0.0.0/0"]);
        assert_eq!(
            normalize_cidrs(&["2001:db8::/32".into()]).unwrap(),
            vec!["0.0.0.0/0"]
        );
    }

    #[test]
    fn test_normalize_cidrs_rejects_malformed() {
        for bad in ["1.2.3.4", "1.2.3.4/33", "nope/8", "1.2.3.4/x", "2001:db8::/129"] {
            assert!(
                matches!(
                    normalize_cidrs(&[bad.to_string()]),
                    Err(BastionError::InvalidIntent(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_select_zone_prefers_up_and_sorts() {
        let zones = vec![
            zone("b", "r", Some("UP")),
            zone("a", "r", Some("DOWN")),
            zone("c", "r", Some("UP")),
        ];
        assert_eq!(select_zone(&zones).as_deref(), Some("b"));
    }

    #[test]
    fn test_select_zone_without_status_uses_all() {
        let zones = vec![zone("c", "r", None), zone("a", "r", None)];
        assert_eq!(select_zone(&zones).as_deref(), Some("a"));
        assert_eq!(select_zone(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_options_derives_names_and_paths() {
        let compute = compute();
        let options = resolve_options(
            &compute,
            &intent(),
            &cluster(),
            "my-project",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let base = "shoot--dev-cluster-jump-bastion-cf315";
        assert_eq!(options.instance_name, base);
        assert_eq!(options.disk_name, format!("{base}-disk"));
        assert_eq!(options.firewall_allow_ssh, format!("{base}-allow-ssh"));
        assert_eq!(options.firewall_egress_worker, format!("{base}-egress-worker"));
        assert_eq!(options.firewall_deny_all, format!("{base}-deny-all"));
        assert_eq!(options.network, "projects/my-project/global/networks/shoot-net");
        assert_eq!(options.subnetwork, "regions/europe-west1/subnetworks/shoot-nodes");
        assert_eq!(options.cidrs, vec!["1.2.3.0/24"]);
        assert_eq!(options.workers_cidr, "10.250.0.0/16");
        assert_eq!(options.zone, "europe-west1-b");
        assert_eq!(options.user_data, "echo hi");
    }

    #[tokio::test]
    async fn test_zone_selection_is_deterministic() {
        let compute = compute();
        let cancel = CancellationToken::new();

        let mut zones = Vec::new();
        for _ in 0..5 {
            let options = resolve_options(&compute, &intent(), &cluster(), "p", &cancel)
                .await
                .unwrap();
            zones.push(options.zone);
        }

        assert!(zones.iter().all(|z| z == "europe-west1-b"));
    }

    #[tokio::test]
    async fn test_pinned_zone_skips_provider_query() {
        let compute = compute();
        let cancel = CancellationToken::new();

        let pinned = BastionIntent {
            zone: Some("europe-west1-d".into()),
            ..intent()
        };
        let recorded = BastionIntent {
            recorded_zone: Some("europe-west1-a".into()),
            ..intent()
        };

        let a = resolve_options(&compute, &pinned, &cluster(), "p", &cancel)
            .await
            .unwrap();
        let b = resolve_options(&compute, &recorded, &cluster(), "p", &cancel)
            .await
            .unwrap();

        assert_eq!(a.zone, "europe-west1-d");
        assert_eq!(b.zone, "europe-west1-a");
        assert!(compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_region_hint_overrides_cluster_region() {
        let compute = compute();
        let hinted = BastionIntent {
            region: Some("us-east1".into()),
            ..intent()
        };

        let options = resolve_options(
            &compute,
            &hinted,
            &cluster(),
            "p",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(options.zone, "us-east1-a");
        assert_eq!(options.subnetwork, "regions/us-east1/subnetworks/shoot-nodes");
        assert_eq!(compute.calls(), vec![ComputeCall::ListZones("us-east1".into())]);
    }

    #[tokio::test]
    async fn test_no_zone_is_a_provider_query_error() {
        let compute = InMemoryComputeClient::new();
        let err = resolve_options(
            &compute,
            &intent(),
            &cluster(),
            "p",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BastionError::ProviderQuery(_)));
    }

    #[tokio::test]
    async fn test_missing_cluster_fields_are_invalid() {
        let compute = compute();
        let cancel = CancellationToken::new();

        for broken in [
            ClusterContext {
                network: String::new(),
                ..cluster()
            },
            ClusterContext {
                subnetwork: String::new(),
                ..cluster()
            },
            ClusterContext {
                workers_cidr: "not-a-cidr".into(),
                ..cluster()
            },
            ClusterContext {
                cluster_name: String::new(),
                ..cluster()
            },
        ] {
            let err = resolve_options(&compute, &intent(), &broken, "p", &cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, BastionError::InvalidIntent(_)), "{broken:?}");
        }
        assert!(compute.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_zone_lookup() {
        let compute = compute();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolve_options(&compute, &intent(), &cluster(), "p", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, BastionError::Cancelled));
    }
}
