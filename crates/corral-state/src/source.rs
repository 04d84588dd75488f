//! Read seam between the scheduler and durable state.

use std::sync::Arc;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::Allocation;

/// The only query the evaluation core issues against durable state.
///
/// Implementations must return a consistent snapshot: no allocation twice,
/// none with missing fields. A node with no records yields an empty list,
/// not an error.
pub trait AllocationSource {
    /// All allocations currently recorded for `node_id`, terminal ones included.
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>>;
}

impl AllocationSource for StateStore {
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        StateStore::allocs_by_node(self, node_id)
    }
}

impl<T: AllocationSource + ?Sized> AllocationSource for &T {
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        (**self).allocs_by_node(node_id)
    }
}

impl<T: AllocationSource + ?Sized> AllocationSource for Arc<T> {
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        (**self).allocs_by_node(node_id)
    }
}
