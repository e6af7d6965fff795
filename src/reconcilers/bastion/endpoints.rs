// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Endpoint derivation for a bastion instance.

use super::types::{BastionEndpoints, Endpoint};
use crate::compute::Instance;
use crate::constants::INSTANCE_STATUS_RUNNING;
use crate::errors::BastionError;

/// Derive the private and public endpoints of a running instance.
///
/// The private endpoint is the instance name plus the internal address of
/// the first NIC; the public endpoint is the NAT address of that NIC's first
/// access config. Compute Engine assigns no public DNS name, so the public
/// endpoint never carries a hostname.
///
/// Addresses that are not assigned yet leave the endpoints not ready; that
/// is not an error.
///
/// # Errors
///
/// - [`BastionError::InstanceNotRunning`] unless the instance is `RUNNING`
/// - [`BastionError::NoNetworkInterface`] if the instance has no NIC
/// - [`BastionError::NoAccessConfig`] if the first NIC has no access config
pub fn resolve_endpoints(instance: &Instance) -> Result<BastionEndpoints, BastionError> {
    let status = instance.status.as_deref().unwrap_or_default();
    if status != INSTANCE_STATUS_RUNNING {
        return Err(BastionError::InstanceNotRunning {
            name: instance.name.clone(),
            status: status.to_string(),
        });
    }

    let nic = instance
        .network_interfaces
        .first()
        .ok_or_else(|| BastionError::NoNetworkInterface(instance.name.clone()))?;
    let access = nic
        .access_configs
        .first()
        .ok_or_else(|| BastionError::NoAccessConfig(instance.name.clone()))?;

    Ok(BastionEndpoints {
        private: Some(Endpoint {
            ip: nic.network_ip.clone(),
            hostname: Some(instance.name.clone()),
        }),
        public: Some(Endpoint {
            ip: access.nat_ip.clone(),
            hostname: None,
        }),
    })
}

#[cfg(test)]
#[path = "endpoints_tests.rs"]
mod endpoints_tests;
