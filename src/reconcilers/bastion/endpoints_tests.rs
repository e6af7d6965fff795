// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `endpoints.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::compute::{AccessConfig, Instance, NetworkInterface};
    use crate::errors::BastionError;

    fn instance(status: &str, internal: Option<&str>, nat: Option<Option<&str>>) -> Instance {
        Instance {
            name: "bastion-1".into(),
            status: Some(status.into()),
            network_interfaces: vec![NetworkInterface {
                network_ip: internal.map(str::to_string),
                access_configs: nat
                    .map(|ip| {
                        vec![AccessConfig {
                            name: Some("External NAT".into()),
                            r#type: Some("ONE_TO_ONE_NAT".into()),
                            nat_ip: ip.map(str::to_string),
                        }]
                    })
                    .unwrap_or_default(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_running_instance_yields_ready_endpoints() {
        let endpoints =
            resolve_endpoints(&instance("RUNNING", Some("10.0.0.5"), Some(Some("34.1.2.3"))))
                .unwrap();

        let private = endpoints.private.clone().unwrap();
        let public = endpoints.public.clone().unwrap();
        assert_eq!(private.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(private.hostname.as_deref(), Some("bastion-1"));
        assert_eq!(public.ip.as_deref(), Some("34.1.2.3"));
        assert_eq!(public.hostname, None);
        assert!(endpoints.ready());
    }

    #[test]
    fn test_missing_nat_ip_is_not_ready() {
        let endpoints =
            resolve_endpoints(&instance("RUNNING", Some("10.0.0.5"), Some(None))).unwrap();

        assert!(!endpoints.ready());
    }

    #[test]
    fn test_provisioning_instance_fails() {
        let err = resolve_endpoints(&instance(
            "PROVISIONING",
            Some("10.0.0.5"),
            Some(Some("34.1.2.3")),
        ))
        .unwrap_err();

        match err {
            BastionError::InstanceNotRunning { name, status } => {
                assert_eq!(name, "bastion-1");
                assert_eq!(status, "PROVISIONING");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_status_is_not_running() {
        let mut unknown = instance("RUNNING", None, None);
        unknown.status = None;

        assert!(matches!(
            resolve_endpoints(&unknown),
            Err(BastionError::InstanceNotRunning { .. })
        ));
    }

    #[test]
    fn test_no_network_interface() {
        let mut bare = instance("RUNNING", None, None);
        bare.network_interfaces.clear();

        assert!(matches!(
            resolve_endpoints(&bare),
            Err(BastionError::NoNetworkInterface(name)) if name == "bastion-1"
        ));
    }

    #[test]
    fn test_no_access_config_even_with_internal_ip() {
        let err = resolve_endpoints(&instance("RUNNING", Some("10.0.0.5"), None)).unwrap_err();

        assert!(matches!(err, BastionError::NoAccessConfig(_)));
    }
}
