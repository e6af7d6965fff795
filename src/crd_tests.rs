// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use k8s_openapi::api::core::v1::LoadBalancerIngress;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_bastion_spec_deserializes_camel_case() {
        let spec: BastionSpec = serde_json::from_value(json!({
            "userData": "ZWNobyBoaQ==",
            "ingress": [{"ipBlock": {"cidr": "203.0.113.0/24"}}],
            "zone": "europe-west1-b"
        }))
        .unwrap();

        assert_eq!(spec.user_data.as_deref(), Some("ZWNobyBoaQ=="));
        assert_eq!(spec.ingress.unwrap()[0].ip_block.cidr, "203.0.113.0/24");
        assert_eq!(spec.zone.as_deref(), Some("europe-west1-b"));
        assert!(spec.region.is_none());
    }

    #[test]
    fn test_empty_spec_is_valid() {
        let spec: BastionSpec = serde_json::from_value(json!({})).unwrap();
        assert!(spec.ingress.is_none());
        assert!(spec.user_data.is_none());
    }

    #[test]
    fn test_status_serializes_provider_status_and_ingress() {
        let status = BastionStatus {
            provider_status: Some(ProviderStatus {
                zone: "us-central1-a".into(),
            }),
            ingress: Some(LoadBalancerIngress {
                ip: Some("34.1.2.3".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["providerStatus"]["zone"], "us-central1-a");
        assert_eq!(value["ingress"]["ip"], "34.1.2.3");
        assert!(value.get("lastError").is_none());
    }

    #[test]
    fn test_condition_uses_camel_case_time() {
        let condition = Condition {
            r#type: "Ready".into(),
            status: "True".into(),
            reason: None,
            message: None,
            last_transition_time: Some("2025-01-01T00:00:00Z".into()),
        };

        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["lastTransitionTime"], "2025-01-01T00:00:00Z");
        assert_eq!(value["type"], "Ready");
    }

    #[test]
    fn test_crd_metadata() {
        let crd = Bastion::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("bastions.bastion.gcp.io")
        );
        assert_eq!(crd.spec.group, "bastion.gcp.io");
        assert_eq!(crd.spec.names.kind, "Bastion");
        assert_eq!(crd.spec.scope, "Namespaced");
    }
}
