//! Ranked candidate nodes handed to the scoring layer.

use corral_state::{Allocation, AllocationSource, Node};

use crate::context::EvalContext;
use crate::error::EvalResult;

/// A feasible node together with its score for one placement.
#[derive(Debug, Clone)]
pub struct RankedNode {
    pub node: Node,
    pub score: f64,
    proposed: Option<Vec<Allocation>>,
}

impl RankedNode {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            score: 0.0,
            proposed: None,
        }
    }

    /// Proposed allocations on this node, fetched once per ranked node.
    ///
    /// A `RankedNode` lives for a single placement decision, so the cached
    /// answer cannot miss plan changes made for later placements.
    pub fn proposed_allocs<S: AllocationSource>(
        &mut self,
        ctx: &EvalContext<S>,
    ) -> EvalResult<&[Allocation]> {
        if self.proposed.is_none() {
            self.proposed = Some(ctx.proposed_allocs(&self.node.id)?);
        }
        Ok(self.proposed.as_deref().unwrap_or(&[]))
    }
}
