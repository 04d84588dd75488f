//! Resource accounting over sets of allocations.

use std::collections::HashSet;

use corral_state::{Allocation, NetworkResource, Resources};

/// Sum the resource footprint of a set of allocations.
///
/// CPU, memory, disk and IOPS add. Networks are merged per device and
/// CIDR: bandwidth adds, reserved ports are unioned, and dynamic port
/// labels are concatenated so their count adds. Allocations without a
/// footprint contribute nothing. Duplicate reserved ports are not an error
/// here; see [`ports_collide`].
pub fn sum_allocs(allocs: &[Allocation]) -> Resources {
    let mut total = Resources::default();
    for resources in allocs.iter().filter_map(|a| a.resources.as_ref()) {
        add_resources(&mut total, resources);
    }
    total
}

/// Add `delta` into `total` using the merge rules of [`sum_allocs`].
///
/// Sums saturate, so corrupt footprints read as exhausted rather than wrap.
pub(crate) fn add_resources(total: &mut Resources, delta: &Resources) {
    total.cpu = total.cpu.saturating_add(delta.cpu);
    total.memory_mb = total.memory_mb.saturating_add(delta.memory_mb);
    total.disk_mb = total.disk_mb.saturating_add(delta.disk_mb);
    total.iops = total.iops.saturating_add(delta.iops);

    for net in &delta.networks {
        match total.networks.iter_mut().find(|n| n.same_network(net)) {
            Some(existing) => merge_network(existing, net),
            None => {
                let mut fresh = NetworkResource {
                    device: net.device.clone(),
                    cidr: net.cidr.clone(),
                    ..NetworkResource::default()
                };
                merge_network(&mut fresh, net);
                total.networks.push(fresh);
            }
        }
    }
}

fn merge_network(into: &mut NetworkResource, from: &NetworkResource) {
    if into.ip.is_empty() {
        into.ip = from.ip.clone();
    }
    into.mbits = into.mbits.saturating_add(from.mbits);
    for port in &from.reserved_ports {
        if !into.reserved_ports.contains(port) {
            into.reserved_ports.push(*port);
        }
    }
    into.reserved_ports.sort_unstable();
    into.dynamic_ports.extend(from.dynamic_ports.iter().cloned());
}

/// Return the first reserved port claimed twice on the same network.
///
/// Claims are grouped by device and CIDR, matching the merge rules of
/// [`sum_allocs`]. `extra` carries claims that are not allocations, such
/// as ports a node reserves for itself.
pub fn ports_collide<'a>(
    allocs: &'a [Allocation],
    extra: impl IntoIterator<Item = &'a NetworkResource>,
) -> Option<u16> {
    let mut seen: HashSet<(&str, &str, u16)> = HashSet::new();
    let alloc_networks = allocs
        .iter()
        .filter_map(|a| a.resources.as_ref())
        .flat_map(|r| r.networks.iter());

    for net in extra.into_iter().chain(alloc_networks) {
        for port in &net.reserved_ports {
            if !seen.insert((net.device.as_str(), net.cidr.as_str(), *port)) {
                return Some(*port);
            }
        }
    }
    None
}
