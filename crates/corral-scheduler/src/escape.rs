//! Constraint escape analysis.
//!
//! A constraint "escapes" when its answer can differ between two nodes of
//! the same computed class, because one of its targets addresses a unique
//! attribute. Escaping constraints must be checked node by node.

use corral_core::{AttributeRegistry, AttributeTarget, UnknownAttributePolicy};
use corral_state::Constraint;

/// Decides which constraints defeat class-based eligibility caching.
#[derive(Debug, Clone, Default)]
pub struct EscapeAnalyzer {
    registry: AttributeRegistry,
}

impl EscapeAnalyzer {
    pub fn new(registry: AttributeRegistry) -> Self {
        Self { registry }
    }

    /// Whether either side of `constraint` references a target that is not
    /// summarized by the computed class.
    pub fn escapes(&self, constraint: &Constraint) -> bool {
        self.target_escapes(&constraint.l_target) || self.target_escapes(&constraint.r_target)
    }

    /// Whether any constraint in the list escapes.
    pub fn constraints_escape(&self, constraints: &[Constraint]) -> bool {
        constraints.iter().any(|c| self.escapes(c))
    }

    fn target_escapes(&self, target: &str) -> bool {
        let parsed = AttributeTarget::parse(target);
        match parsed {
            AttributeTarget::Literal(_) => false,
            AttributeTarget::Unresolved(_) => {
                self.registry.unknown_attribute == UnknownAttributePolicy::Escape
            }
            AttributeTarget::Attr(_) | AttributeTarget::Meta(_) | AttributeTarget::Node(_) => {
                match parsed.registry_key() {
                    Some(key) => !self.registry.is_class_stable(&key),
                    None => true,
                }
            }
        }
    }
}
