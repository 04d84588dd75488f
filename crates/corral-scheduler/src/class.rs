//! Computed node classes.
//!
//! A computed class is a signature over the attributes of a node that the
//! attribute registry marks class-stable. Nodes with equal signatures are
//! assumed to answer every non-escaping constraint identically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use corral_core::AttributeRegistry;
use corral_state::Node;

/// Equivalence signature of a node. Zero means "no usable class".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ComputedClass(pub u64);

impl ComputedClass {
    pub const NONE: ComputedClass = ComputedClass(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// The class recorded on a node record.
    pub fn of(node: &Node) -> Self {
        ComputedClass(node.computed_class)
    }
}

impl From<u64> for ComputedClass {
    fn from(value: u64) -> Self {
        ComputedClass(value)
    }
}

impl fmt::Display for ComputedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Compute the class signature of `node`.
///
/// Only class-stable fields contribute. The result is never
/// [`ComputedClass::NONE`].
pub fn compute_class(node: &Node, registry: &AttributeRegistry) -> ComputedClass {
    let mut fields: BTreeMap<String, &str> = BTreeMap::new();

    if registry.is_class_stable("node.datacenter") {
        fields.insert("node.datacenter".to_string(), &node.datacenter);
    }
    if registry.is_class_stable("node.class") {
        fields.insert("node.class".to_string(), &node.node_class);
    }
    for (key, value) in &node.attributes {
        let key = format!("attr.{key}");
        if registry.is_class_stable(&key) {
            fields.insert(key, value);
        }
    }
    for (key, value) in &node.meta {
        let key = format!("meta.{key}");
        if registry.is_class_stable(&key) {
            fields.insert(key, value);
        }
    }

    let mut hasher = Sha256::new();
    for (key, value) in &fields {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    match u64::from_be_bytes(prefix) {
        0 => ComputedClass(1),
        class => ComputedClass(class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_core::UnknownAttributePolicy;
    use corral_state::{NodeStatus, Resources};
    use std::collections::HashMap;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            datacenter: "dc1".to_string(),
            name: id.to_string(),
            node_class: "compute".to_string(),
            attributes: HashMap::from([
                ("kernel.name".to_string(), "linux".to_string()),
                ("cpu.arch".to_string(), "amd64".to_string()),
                ("unique.hostname".to_string(), format!("{id}.example.com")),
            ]),
            meta: HashMap::from([("unique.serial".to_string(), format!("sn-{id}"))]),
            resources: Resources::default(),
            reserved: None,
            status: NodeStatus::Ready,
            computed_class: 0,
        }
    }

    #[test]
    fn unique_attributes_do_not_split_classes() {
        let registry = AttributeRegistry::default();
        let a = compute_class(&node("n1"), &registry);
        let b = compute_class(&node("n2"), &registry);
        assert_eq!(a, b);
        assert!(!a.is_none());
    }

    #[test]
    fn class_stable_attributes_split_classes() {
        let registry = AttributeRegistry::default();
        let a = node("n1");
        let mut b = node("n2");
        b.attributes.insert("cpu.arch".to_string(), "arm64".to_string());
        assert_ne!(compute_class(&a, &registry), compute_class(&b, &registry));

        let mut c = node("n3");
        c.datacenter = "dc2".to_string();
        assert_ne!(compute_class(&a, &registry), compute_class(&c, &registry));
    }

    #[test]
    fn unknown_attributes_follow_policy() {
        let escape = AttributeRegistry::empty(UnknownAttributePolicy::Escape);
        let stable = AttributeRegistry::empty(UnknownAttributePolicy::ClassStable);

        // With nothing class-stable, every node hashes the same.
        assert_eq!(
            compute_class(&node("n1"), &escape),
            compute_class(&node("n2"), &escape)
        );
        // Treating unknown attributes as stable pulls in the hostnames.
        assert_ne!(
            compute_class(&node("n1"), &stable),
            compute_class(&node("n2"), &stable)
        );
    }

    #[test]
    fn class_of_reads_record() {
        let mut n = node("n1");
        assert!(ComputedClass::of(&n).is_none());
        n.computed_class = 42;
        assert_eq!(ComputedClass::of(&n), ComputedClass(42));
        assert_eq!(ComputedClass(42).to_string(), "000000000000002a");
    }
}
