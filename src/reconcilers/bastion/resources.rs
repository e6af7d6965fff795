// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider resource descriptors for a bastion.
//!
//! Pure builders: each takes [`ResolvedOptions`] and returns the Compute
//! Engine resource that should exist. No I/O happens here.

use super::types::ResolvedOptions;
use crate::compute::{
    AccessConfig, AttachedDisk, Disk, Firewall, FirewallRuleProtocol, Instance, Metadata,
    MetadataItem, NetworkInterface, Tags,
};
use crate::constants::{
    ANY_IPV4_CIDR, BASTION_DISK_IMAGE, BASTION_DISK_SIZE_GB, BASTION_MACHINE_TYPE,
    EGRESS_ALLOW_ONLY_PRIORITY, EGRESS_DENY_ALL_PRIORITY, EXTERNAL_NAT_NAME, EXTERNAL_NAT_TYPE,
    METADATA_BLOCK_PROJECT_SSH_KEYS, METADATA_STARTUP_SCRIPT, SSH_PORT,
};

const DIRECTION_INGRESS: &str = "INGRESS";
const DIRECTION_EGRESS: &str = "EGRESS";
const DISK_MODE_READ_WRITE: &str = "READ_WRITE";

fn ssh() -> FirewallRuleProtocol {
    FirewallRuleProtocol {
        ip_protocol: "tcp".to_string(),
        ports: vec![SSH_PORT.to_string()],
    }
}

/// Ingress rule allowing SSH from the declared source ranges.
#[must_use]
pub fn ingress_allow_ssh(opt: &ResolvedOptions) -> Firewall {
    Firewall {
        name: opt.firewall_allow_ssh.clone(),
        description: Some(format!("SSH access for bastion {}", opt.instance_name)),
        network: Some(opt.network.clone()),
        direction: Some(DIRECTION_INGRESS.to_string()),
        allowed: vec![ssh()],
        source_ranges: opt.cidrs.clone(),
        target_tags: vec![opt.instance_name.clone()],
        ..Default::default()
    }
}

/// Egress rule denying everything not explicitly allowed.
#[must_use]
pub fn egress_deny_all(opt: &ResolvedOptions) -> Firewall {
    Firewall {
        name: opt.firewall_deny_all.clone(),
        description: Some(format!("Deny all egress of bastion {}", opt.instance_name)),
        network: Some(opt.network.clone()),
        direction: Some(DIRECTION_EGRESS.to_string()),
        priority: Some(EGRESS_DENY_ALL_PRIORITY),
        denied: vec![FirewallRuleProtocol {
            ip_protocol: "all".to_string(),
            ports: Vec::new(),
        }],
        destination_ranges: vec![ANY_IPV4_CIDR.to_string()],
        target_tags: vec![opt.instance_name.clone()],
        ..Default::default()
    }
}

/// Egress rule allowing SSH to the worker nodes only.
#[must_use]
pub fn egress_allow_only(opt: &ResolvedOptions) -> Firewall {
    Firewall {
        name: opt.firewall_egress_worker.clone(),
        description: Some(format!(
            "Allow SSH from bastion {} to the workers",
            opt.instance_name
        )),
        network: Some(opt.network.clone()),
        direction: Some(DIRECTION_EGRESS.to_string()),
        priority: Some(EGRESS_ALLOW_ONLY_PRIORITY),
        allowed: vec![ssh()],
        destination_ranges: vec![opt.workers_cidr.clone()],
        target_tags: vec![opt.instance_name.clone()],
        ..Default::default()
    }
}

/// All three firewall rules in creation order.
#[must_use]
pub fn firewall_rules(opt: &ResolvedOptions) -> [Firewall; 3] {
    [
        ingress_allow_ssh(opt),
        egress_deny_all(opt),
        egress_allow_only(opt),
    ]
}

/// Boot disk of the bastion.
#[must_use]
pub fn disk(opt: &ResolvedOptions) -> Disk {
    Disk {
        name: opt.disk_name.clone(),
        description: Some("Bastion disk".to_string()),
        size_gb: Some(BASTION_DISK_SIZE_GB),
        source_image: Some(BASTION_DISK_IMAGE.to_string()),
        zone: Some(opt.zone.clone()),
        ..Default::default()
    }
}

/// Full path of the bastion's disk.
#[must_use]
pub fn disk_source(opt: &ResolvedOptions) -> String {
    format!(
        "projects/{}/zones/{}/disks/{}",
        opt.project_id, opt.zone, opt.disk_name
    )
}

/// The bastion VM, booting from [`disk`].
#[must_use]
pub fn instance(opt: &ResolvedOptions) -> Instance {
    Instance {
        name: opt.instance_name.clone(),
        description: Some("Bastion Instance".to_string()),
        zone: Some(opt.zone.clone()),
        machine_type: Some(format!(
            "zones/{}/machineTypes/{BASTION_MACHINE_TYPE}",
            opt.zone
        )),
        disks: vec![AttachedDisk {
            auto_delete: Some(true),
            boot: Some(true),
            disk_size_gb: Some(BASTION_DISK_SIZE_GB),
            source: Some(disk_source(opt)),
            mode: Some(DISK_MODE_READ_WRITE.to_string()),
        }],
        network_interfaces: vec![network_interface(opt)],
        tags: Some(Tags {
            items: vec![opt.instance_name.clone()],
        }),
        metadata: Some(Metadata {
            items: vec![
                MetadataItem {
                    key: METADATA_STARTUP_SCRIPT.to_string(),
                    value: Some(opt.user_data.clone()),
                },
                MetadataItem {
                    key: METADATA_BLOCK_PROJECT_SSH_KEYS.to_string(),
                    value: Some("TRUE".to_string()),
                },
            ],
        }),
        deletion_protection: Some(false),
        ..Default::default()
    }
}

/// Single NIC in the cluster subnetwork with an ephemeral external address.
#[must_use]
pub fn network_interface(opt: &ResolvedOptions) -> NetworkInterface {
    NetworkInterface {
        network: Some(opt.network.clone()),
        subnetwork: Some(opt.subnetwork.clone()),
        network_ip: None,
        access_configs: vec![AccessConfig {
            name: Some(EXTERNAL_NAT_NAME.to_string()),
            r#type: Some(EXTERNAL_NAT_TYPE.to_string()),
            nat_ip: None,
        }],
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
