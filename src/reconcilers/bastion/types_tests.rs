// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `types.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{
        Bastion, BastionIngressPolicy, BastionSpec, BastionStatus, IpBlock, ProviderStatus,
    };
    use crate::errors::BastionError;
    use k8s_openapi::api::core::v1::LoadBalancerIngress;
    use kube::api::ObjectMeta;

    fn bastion(spec: BastionSpec) -> Bastion {
        Bastion {
            metadata: ObjectMeta {
                name: Some("jump".into()),
                namespace: Some("shoot--dev".into()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn spec() -> BastionSpec {
        BastionSpec {
            user_data: None,
            ingress: None,
            zone: None,
            region: None,
        }
    }

    fn ip(ip: &str) -> Endpoint {
        Endpoint {
            ip: Some(ip.into()),
            hostname: None,
        }
    }

    #[test]
    fn test_intent_from_bastion_decodes_user_data() {
        let intent = BastionIntent::from_bastion(&bastion(BastionSpec {
            user_data: Some("ZWNobyBoZWxsbw==".into()),
            ingress: Some(vec![
                BastionIngressPolicy {
                    ip_block: IpBlock {
                        cidr: "5.6.7.0/24".into(),
                    },
                },
                BastionIngressPolicy {
                    ip_block: IpBlock {
                        cidr: "1.2.3.0/24".into(),
                    },
                },
            ]),
            zone: Some("europe-west1-c".into()),
            region: Some(String::new()),
        }))
        .unwrap();

        assert_eq!(intent.name(), "jump");
        assert_eq!(intent.key.namespace, "shoot--dev");
        assert_eq!(intent.user_data, "echo hello");
        assert_eq!(intent.ingress_cidrs, vec!["5.6.7.0/24", "1.2.3.0/24"]);
        assert_eq!(intent.zone.as_deref(), Some("europe-west1-c"));
        assert_eq!(intent.region, None);
    }

    #[test]
    fn test_intent_picks_up_recorded_zone() {
        let mut resource = bastion(spec());
        resource.status = Some(BastionStatus {
            provider_status: Some(ProviderStatus {
                zone: "europe-west1-d".into(),
            }),
            ..Default::default()
        });

        let intent = BastionIntent::from_bastion(&resource).unwrap();
        assert_eq!(intent.recorded_zone.as_deref(), Some("europe-west1-d"));
        assert_eq!(intent.zone, None);
    }

    #[test]
    fn test_intent_rejects_invalid_base64() {
        let err = BastionIntent::from_bastion(&bastion(BastionSpec {
            user_data: Some("not base64!".into()),
            ..spec()
        }))
        .unwrap_err();

        assert!(matches!(err, BastionError::InvalidIntent(_)));
    }

    #[test]
    fn test_intent_without_user_data() {
        let intent = BastionIntent::from_bastion(&bastion(spec())).unwrap();

        assert!(intent.user_data.is_empty());
        assert!(intent.ingress_cidrs.is_empty());
    }

    #[test]
    fn test_endpoint_presence() {
        assert!(!Endpoint::default().is_present());
        assert!(!Endpoint {
            ip: Some(String::new()),
            hostname: Some(String::new()),
        }
        .is_present());
        assert!(ip("10.0.0.5").is_present());
        assert!(Endpoint {
            ip: None,
            hostname: Some("bastion".into()),
        }
        .is_present());
    }

    #[test]
    fn test_ready_requires_both_endpoints() {
        let both = BastionEndpoints {
            private: Some(ip("10.0.0.5")),
            public: Some(ip("34.1.2.3")),
        };
        let private_only = BastionEndpoints {
            private: Some(ip("10.0.0.5")),
            public: Some(Endpoint::default()),
        };

        assert!(both.ready());
        assert!(both.ready(), "readiness depends only on the pair");
        assert!(!private_only.ready());
        assert!(!BastionEndpoints::default().ready());
    }

    #[test]
    fn test_endpoint_to_ingress_drops_empty_fields() {
        let ingress = LoadBalancerIngress::from(&Endpoint {
            ip: Some("34.1.2.3".into()),
            hostname: Some(String::new()),
        });

        assert_eq!(ingress.ip.as_deref(), Some("34.1.2.3"));
        assert_eq!(ingress.hostname, None);
    }

    #[test]
    fn test_teardown_intent_ignores_broken_user_data() {
        let mut resource = bastion(BastionSpec {
            user_data: Some("%%% not base64".into()),
            ingress: Some(vec![BastionIngressPolicy {
                ip_block: IpBlock {
                    cidr: "garbage".into(),
                },
            }]),
            ..spec()
        });
        resource.metadata.generation = Some(3);

        assert!(BastionIntent::from_bastion(&resource).is_err());
        let intent = BastionIntent::for_teardown(&resource);

        assert_eq!(intent.name(), "jump");
        assert!(intent.ingress_cidrs.is_empty());
        assert!(intent.user_data.is_empty());
        assert_eq!(intent.generation, Some(3));
    }
}
