//! Placement metrics for one task group placement attempt.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use corral_state::Node;

/// Why nodes were skipped while placing one allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocMetric {
    /// Nodes considered at all.
    pub nodes_evaluated: u64,
    /// Nodes rejected by feasibility checks.
    pub nodes_filtered: u64,
    /// Filtered nodes, by operator-assigned node class.
    pub class_filtered: HashMap<String, u64>,
    /// Filtered nodes, by the constraint or reason that rejected them.
    pub constraint_filtered: HashMap<String, u64>,
    /// Feasible nodes without enough capacity left.
    pub nodes_exhausted: u64,
    /// Exhausted nodes, by operator-assigned node class.
    pub class_exhausted: HashMap<String, u64>,
    /// Exhausted nodes, by the dimension that ran out.
    pub dimension_exhausted: HashMap<String, u64>,
}

impl AllocMetric {
    pub fn evaluate_node(&mut self) {
        self.nodes_evaluated += 1;
    }

    /// Record that `node` failed a feasibility check.
    pub fn filter_node(&mut self, node: &Node, reason: &str) {
        self.nodes_filtered += 1;
        if !node.node_class.is_empty() {
            *self.class_filtered.entry(node.node_class.clone()).or_default() += 1;
        }
        if !reason.is_empty() {
            *self.constraint_filtered.entry(reason.to_string()).or_default() += 1;
        }
    }

    /// Record that `node` was feasible but out of `dimension`.
    pub fn exhausted_node(&mut self, node: &Node, dimension: &str) {
        self.nodes_exhausted += 1;
        if !node.node_class.is_empty() {
            *self.class_exhausted.entry(node.node_class.clone()).or_default() += 1;
        }
        if !dimension.is_empty() {
            *self.dimension_exhausted.entry(dimension.to_string()).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_state::{NodeStatus, Resources};

    fn node(class: &str) -> Node {
        Node {
            id: "n1".to_string(),
            datacenter: "dc1".to_string(),
            name: "n1".to_string(),
            node_class: class.to_string(),
            attributes: HashMap::new(),
            meta: HashMap::new(),
            resources: Resources::default(),
            reserved: None,
            status: NodeStatus::Ready,
            computed_class: 0,
        }
    }

    #[test]
    fn counts_filtered_and_exhausted() {
        let mut m = AllocMetric::default();
        m.evaluate_node();
        m.evaluate_node();
        m.filter_node(&node("gpu"), "${attr.kernel.name} = linux");
        m.exhausted_node(&node(""), "memory exhausted");

        assert_eq!(m.nodes_evaluated, 2);
        assert_eq!(m.nodes_filtered, 1);
        assert_eq!(m.class_filtered.get("gpu"), Some(&1));
        assert_eq!(m.constraint_filtered.get("${attr.kernel.name} = linux"), Some(&1));
        assert_eq!(m.nodes_exhausted, 1);
        assert_eq!(m.dimension_exhausted.get("memory exhausted"), Some(&1));
    }

    #[test]
    fn exhaustion_does_not_count_as_filtering() {
        let mut m = AllocMetric::default();
        m.exhausted_node(&node("gpu"), "cpu exhausted");
        m.exhausted_node(&node("gpu"), "memory exhausted");
        m.filter_node(&node("gpu"), "missing driver exec");

        assert_eq!(m.nodes_filtered, 1);
        assert_eq!(m.class_filtered.get("gpu"), Some(&1));
        assert_eq!(m.nodes_exhausted, 2);
        assert_eq!(m.class_exhausted.get("gpu"), Some(&2));
    }
}
