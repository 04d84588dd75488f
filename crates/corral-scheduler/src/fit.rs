//! Capacity fit of a proposed allocation set on a node.

use std::collections::HashMap;

use corral_state::{Allocation, Node, Resources};

use crate::resources::{add_resources, ports_collide};

/// Result of [`allocs_fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub fits: bool,
    /// The first dimension that ran out, if any.
    pub dimension: Option<&'static str>,
    /// Node reservations plus the footprint of every allocation.
    pub used: Resources,
}

/// Check whether `allocs`, together with the node's own reservations, fit
/// within the node's capacity.
///
/// Typically called with the output of `EvalContext::proposed_allocs` plus
/// the allocation being placed.
pub fn allocs_fit(node: &Node, allocs: &[Allocation]) -> FitOutcome {
    let mut used = Resources::default();
    if let Some(reserved) = &node.reserved {
        add_resources(&mut used, reserved);
    }
    for resources in allocs.iter().filter_map(|a| a.resources.as_ref()) {
        add_resources(&mut used, resources);
    }

    let capacity = &node.resources;
    let reserved_networks = node.reserved.iter().flat_map(|r| r.networks.iter());

    let dimension = if used.cpu > capacity.cpu {
        Some("cpu exhausted")
    } else if used.memory_mb > capacity.memory_mb {
        Some("memory exhausted")
    } else if used.disk_mb > capacity.disk_mb {
        Some("disk exhausted")
    } else if used.iops > capacity.iops {
        Some("iops exhausted")
    } else if ports_collide(allocs, reserved_networks).is_some() {
        Some("reserved port collision")
    } else if bandwidth_exceeded(capacity, &used) {
        Some("bandwidth exceeded")
    } else {
        None
    };

    FitOutcome {
        fits: dimension.is_none(),
        dimension,
        used,
    }
}

/// Bandwidth is compared per device, across all of its CIDRs.
fn bandwidth_exceeded(capacity: &Resources, used: &Resources) -> bool {
    let mut available: HashMap<&str, u64> = HashMap::new();
    for net in &capacity.networks {
        let mbits = available.entry(net.device.as_str()).or_default();
        *mbits = mbits.saturating_add(net.mbits);
    }
    let mut demanded: HashMap<&str, u64> = HashMap::new();
    for net in &used.networks {
        let mbits = demanded.entry(net.device.as_str()).or_default();
        *mbits = mbits.saturating_add(net.mbits);
    }

    demanded
        .iter()
        .any(|(device, mbits)| *mbits > available.get(device).copied().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use corral_state::{ClientStatus, DesiredStatus, NetworkResource, NodeStatus};

    fn node(cpu: u64, memory_mb: u64) -> Node {
        Node {
            id: "n1".to_string(),
            datacenter: "dc1".to_string(),
            name: "n1".to_string(),
            node_class: String::new(),
            attributes: HashMap::new(),
            meta: HashMap::new(),
            resources: Resources {
                cpu,
                memory_mb,
                disk_mb: 10_000,
                iops: 100,
                networks: vec![NetworkResource {
                    device: "eth0".to_string(),
                    cidr: "192.168.0.100/32".to_string(),
                    mbits: 1000,
                    ..NetworkResource::default()
                }],
            },
            reserved: None,
            status: NodeStatus::Ready,
            computed_class: 1,
        }
    }

    fn alloc(cpu: u64, memory_mb: u64, networks: Vec<NetworkResource>) -> Allocation {
        Allocation {
            id: format!("a-{cpu}-{memory_mb}"),
            job_id: "job".to_string(),
            eval_id: "eval".to_string(),
            node_id: "n1".to_string(),
            task_group: "web".to_string(),
            resources: Some(Resources {
                cpu,
                memory_mb,
                networks,
                ..Resources::default()
            }),
            desired_status: DesiredStatus::Run,
            client_status: ClientStatus::Running,
        }
    }

    fn eth0(mbits: u64, reserved_ports: &[u16]) -> NetworkResource {
        NetworkResource {
            device: "eth0".to_string(),
            cidr: "192.168.0.100/32".to_string(),
            mbits,
            reserved_ports: reserved_ports.to_vec(),
            ..NetworkResource::default()
        }
    }

    #[test]
    fn perfect_fit() {
        let outcome = allocs_fit(
            &node(2048, 2048),
            &[alloc(1024, 1024, Vec::new()), alloc(1024, 1024, Vec::new())],
        );
        assert!(outcome.fits);
        assert_eq!(outcome.dimension, None);
        assert_eq!(outcome.used.cpu, 2048);
        assert_eq!(outcome.used.memory_mb, 2048);
    }

    #[test]
    fn cpu_and_memory_exhaustion() {
        let n = node(2048, 2048);
        let outcome = allocs_fit(&n, &[alloc(3000, 100, Vec::new())]);
        assert!(!outcome.fits);
        assert_eq!(outcome.dimension, Some("cpu exhausted"));

        let outcome = allocs_fit(&n, &[alloc(100, 3000, Vec::new())]);
        assert_eq!(outcome.dimension, Some("memory exhausted"));
    }

    #[test]
    fn reservations_count_against_capacity() {
        let mut n = node(2048, 2048);
        n.reserved = Some(Resources {
            cpu: 1024,
            ..Resources::default()
        });
        let outcome = allocs_fit(&n, &[alloc(1500, 100, Vec::new())]);
        assert_eq!(outcome.dimension, Some("cpu exhausted"));
        assert_eq!(outcome.used.cpu, 2524);
    }

    #[test]
    fn port_collision_does_not_fit() {
        let n = node(4096, 4096);
        let outcome = allocs_fit(
            &n,
            &[
                alloc(100, 100, vec![eth0(10, &[8000])]),
                alloc(100, 100, vec![eth0(10, &[8000])]),
            ],
        );
        assert!(!outcome.fits);
        assert_eq!(outcome.dimension, Some("reserved port collision"));
    }

    #[test]
    fn collision_with_node_reserved_port() {
        let mut n = node(4096, 4096);
        n.reserved = Some(Resources {
            networks: vec![eth0(0, &[22])],
            ..Resources::default()
        });
        let outcome = allocs_fit(&n, &[alloc(100, 100, vec![eth0(10, &[22])])]);
        assert_eq!(outcome.dimension, Some("reserved port collision"));
    }

    #[test]
    fn overflowing_footprints_do_not_fit() {
        let n = node(2048, 2048);
        let outcome = allocs_fit(&n, &[alloc(u64::MAX, 1, Vec::new()), alloc(2, 1, Vec::new())]);
        assert!(!outcome.fits);
        assert_eq!(outcome.dimension, Some("cpu exhausted"));
        assert_eq!(outcome.used.cpu, u64::MAX);

        let outcome = allocs_fit(
            &n,
            &[
                alloc(1, 1, vec![eth0(u64::MAX, &[])]),
                alloc(2, 1, vec![eth0(2, &[])]),
            ],
        );
        assert_eq!(outcome.dimension, Some("bandwidth exceeded"));
    }

    #[test]
    fn bandwidth_exhaustion() {
        let n = node(4096, 4096);
        let outcome = allocs_fit(
            &n,
            &[
                alloc(100, 100, vec![eth0(600, &[])]),
                alloc(100, 100, vec![eth0(600, &[])]),
            ],
        );
        assert_eq!(outcome.dimension, Some("bandwidth exceeded"));

        let mut unknown_device = eth0(1, &[]);
        unknown_device.device = "eth9".to_string();
        let outcome = allocs_fit(&n, &[alloc(100, 100, vec![unknown_device])]);
        assert_eq!(outcome.dimension, Some("bandwidth exceeded"));
    }
}
