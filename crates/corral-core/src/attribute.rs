//! Node attribute targets and the unique/class-stable registry.
//!
//! Constraint targets such as `${attr.kernel.name}` or `${meta.unique.rack}`
//! address a node attribute. Whether an attribute may be summarized by a
//! node's computed class is decided here, from explicit configuration,
//! never from the shape of the attribute name alone.

use serde::{Deserialize, Serialize};

/// A parsed constraint target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTarget<'a> {
    /// A plain value with no interpolation, e.g. `linux`.
    Literal(&'a str),
    /// `${attr.<key>}`: a fingerprinted node attribute.
    Attr(&'a str),
    /// `${meta.<key>}`: operator-supplied node metadata.
    Meta(&'a str),
    /// `${node.<field>}`: a field of the node record itself.
    Node(&'a str),
    /// An interpolation whose root is not known.
    Unresolved(&'a str),
}

impl<'a> AttributeTarget<'a> {
    /// Parse a constraint target. Both `${attr.x}` and `$attr.x` are accepted.
    pub fn parse(target: &'a str) -> Self {
        let inner = if let Some(rest) = target.strip_prefix("${") {
            match rest.strip_suffix('}') {
                Some(inner) => inner,
                None => return AttributeTarget::Unresolved(target),
            }
        } else if let Some(rest) = target.strip_prefix('$') {
            rest
        } else {
            return AttributeTarget::Literal(target);
        };

        match inner.split_once('.') {
            Some(("attr", key)) if !key.is_empty() => AttributeTarget::Attr(key),
            Some(("meta", key)) if !key.is_empty() => AttributeTarget::Meta(key),
            Some(("node", key)) if !key.is_empty() => AttributeTarget::Node(key),
            _ => AttributeTarget::Unresolved(inner),
        }
    }

    /// Fully qualified registry key (`attr.kernel.name`), if the target
    /// addresses a node attribute.
    pub fn registry_key(&self) -> Option<String> {
        match self {
            AttributeTarget::Attr(key) => Some(format!("attr.{key}")),
            AttributeTarget::Meta(key) => Some(format!("meta.{key}")),
            AttributeTarget::Node(key) => Some(format!("node.{key}")),
            AttributeTarget::Literal(_) | AttributeTarget::Unresolved(_) => None,
        }
    }
}

/// How an attribute relates to computed node classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeClass {
    /// Shared by every node of a class.
    ClassStable,
    /// Identity-bearing; differs from node to node.
    Unique,
    /// Neither list mentions the attribute.
    Unknown,
}

/// What to do with attributes the registry does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAttributePolicy {
    /// Treat as unique: constraints on it escape class caching.
    #[default]
    Escape,
    /// Treat as class-stable.
    ClassStable,
}

/// Explicit set of unique and class-stable node attributes.
///
/// Exact keys win over prefixes, and unique wins over class-stable at the
/// same level of specificity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRegistry {
    pub unique: Vec<String>,
    pub unique_prefixes: Vec<String>,
    pub class_stable: Vec<String>,
    pub class_stable_prefixes: Vec<String>,
    pub unknown_attribute: UnknownAttributePolicy,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self {
            unique: Vec::new(),
            unique_prefixes: vec![
                "attr.unique.".to_string(),
                "meta.unique.".to_string(),
                "node.unique.".to_string(),
            ],
            class_stable: Vec::new(),
            class_stable_prefixes: vec![
                "attr.".to_string(),
                "meta.".to_string(),
                "node.".to_string(),
            ],
            unknown_attribute: UnknownAttributePolicy::Escape,
        }
    }
}

impl AttributeRegistry {
    /// A registry that knows nothing; every attribute is `Unknown`.
    pub fn empty(unknown_attribute: UnknownAttributePolicy) -> Self {
        Self {
            unique: Vec::new(),
            unique_prefixes: Vec::new(),
            class_stable: Vec::new(),
            class_stable_prefixes: Vec::new(),
            unknown_attribute,
        }
    }

    /// Classify a fully qualified key such as `attr.kernel.name`.
    pub fn classify(&self, key: &str) -> AttributeClass {
        if self.unique.iter().any(|k| k == key) {
            return AttributeClass::Unique;
        }
        if self.class_stable.iter().any(|k| k == key) {
            return AttributeClass::ClassStable;
        }
        if self.unique_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            return AttributeClass::Unique;
        }
        if self
            .class_stable_prefixes
            .iter()
            .any(|p| key.starts_with(p.as_str()))
        {
            return AttributeClass::ClassStable;
        }
        AttributeClass::Unknown
    }

    /// Whether a key may be folded into a computed class, i.e. whether
    /// constraints against it can be answered once per class.
    pub fn is_class_stable(&self, key: &str) -> bool {
        match self.classify(key) {
            AttributeClass::ClassStable => true,
            AttributeClass::Unique => false,
            AttributeClass::Unknown => {
                self.unknown_attribute == UnknownAttributePolicy::ClassStable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interpolated_targets() {
        assert_eq!(
            AttributeTarget::parse("${attr.kernel.name}"),
            AttributeTarget::Attr("kernel.name")
        );
        assert_eq!(
            AttributeTarget::parse("$meta.unique.key_foo"),
            AttributeTarget::Meta("unique.key_foo")
        );
        assert_eq!(
            AttributeTarget::parse("${node.datacenter}"),
            AttributeTarget::Node("datacenter")
        );
    }

    #[test]
    fn parse_literal_and_unresolved() {
        assert_eq!(AttributeTarget::parse("linux"), AttributeTarget::Literal("linux"));
        assert_eq!(
            AttributeTarget::parse("${env.HOME}"),
            AttributeTarget::Unresolved("env.HOME")
        );
        assert!(matches!(
            AttributeTarget::parse("${attr.arch"),
            AttributeTarget::Unresolved(_)
        ));
        assert!(matches!(
            AttributeTarget::parse("$attr."),
            AttributeTarget::Unresolved(_)
        ));
    }

    #[test]
    fn registry_key_is_qualified() {
        let target = AttributeTarget::parse("${attr.cpu.arch}");
        assert_eq!(target.registry_key().as_deref(), Some("attr.cpu.arch"));
        assert_eq!(AttributeTarget::parse("amd64").registry_key(), None);
    }

    #[test]
    fn default_registry_classifies_unique_prefixes() {
        let registry = AttributeRegistry::default();
        assert_eq!(registry.classify("attr.kernel.name"), AttributeClass::ClassStable);
        assert_eq!(registry.classify("attr.unique.kernel.name"), AttributeClass::Unique);
        assert_eq!(registry.classify("meta.unique.key_foo"), AttributeClass::Unique);
        assert_eq!(registry.classify("node.unique.id"), AttributeClass::Unique);
        assert_eq!(registry.classify("driver.docker"), AttributeClass::Unknown);
    }

    #[test]
    fn exact_entries_override_prefixes() {
        let mut registry = AttributeRegistry::default();
        registry.unique.push("attr.platform.aws.instance-id".to_string());
        registry.class_stable.push("meta.unique.rack".to_string());

        assert_eq!(
            registry.classify("attr.platform.aws.instance-id"),
            AttributeClass::Unique
        );
        assert_eq!(registry.classify("meta.unique.rack"), AttributeClass::ClassStable);
    }

    #[test]
    fn unknown_policy_decides_class_stability() {
        let escape = AttributeRegistry::empty(UnknownAttributePolicy::Escape);
        assert!(!escape.is_class_stable("attr.kernel.name"));

        let stable = AttributeRegistry::empty(UnknownAttributePolicy::ClassStable);
        assert!(stable.is_class_stable("attr.kernel.name"));
    }
}
