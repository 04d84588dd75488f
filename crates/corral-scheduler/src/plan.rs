//! The speculative plan built during one evaluation.
//!
//! A plan is created empty when an evaluation starts, grows as the scheduler
//! decides evictions and placements, and is handed off whole to a separate
//! committer. Nothing here touches durable state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use corral_state::{Allocation, DesiredStatus, NodeId};

/// Evictions and placements proposed by one evaluation, keyed by node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub eval_id: String,
    /// Allocations to stop or evict on each node.
    pub node_update: HashMap<NodeId, Vec<Allocation>>,
    /// New allocations to place on each node.
    pub node_allocation: HashMap<NodeId, Vec<Allocation>>,
}

impl Plan {
    pub fn new(eval_id: &str) -> Self {
        Self {
            eval_id: eval_id.to_string(),
            ..Self::default()
        }
    }

    /// Propose stopping an existing allocation.
    ///
    /// The plan records a copy carrying the new desired status; the durable
    /// record is left alone.
    pub fn append_update(&mut self, alloc: &Allocation, desired_status: DesiredStatus) {
        let mut update = alloc.clone();
        update.desired_status = desired_status;
        self.node_update
            .entry(alloc.node_id.clone())
            .or_default()
            .push(update);
    }

    /// Withdraw a proposed update for `alloc`, e.g. when an eviction turns
    /// into an in-place update that re-places the same allocation.
    pub fn pop_update(&mut self, alloc: &Allocation) -> Option<Allocation> {
        let updates = self.node_update.get_mut(&alloc.node_id)?;
        let pos = updates.iter().rposition(|u| u.id == alloc.id)?;
        let removed = updates.remove(pos);
        if updates.is_empty() {
            self.node_update.remove(&alloc.node_id);
        }
        Some(removed)
    }

    /// Propose placing a new allocation on its node.
    pub fn append_alloc(&mut self, alloc: Allocation) {
        self.node_allocation
            .entry(alloc.node_id.clone())
            .or_default()
            .push(alloc);
    }

    /// Proposed evictions on one node.
    pub fn updates_for(&self, node_id: &str) -> &[Allocation] {
        self.node_update.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Proposed placements on one node.
    pub fn allocs_for(&self, node_id: &str) -> &[Allocation] {
        self.node_allocation
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A plan with nothing in it need not be submitted.
    pub fn is_noop(&self) -> bool {
        self.node_update.values().all(Vec::is_empty)
            && self.node_allocation.values().all(Vec::is_empty)
    }
}
