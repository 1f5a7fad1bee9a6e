use serde::{Deserialize, Serialize};

use classdesk_core::{ClassId, CustomerId};

/// Breadth of a grant.
///
/// A grant applies either everywhere or to exactly one named resource. Scopes
/// never imply each other: a customer grant says nothing about classes, and
/// the only escalation path is [`Scope::Global`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Customer(CustomerId),
    Class(ClassId),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Global => ScopeKind::Global,
            Scope::Customer(_) => ScopeKind::Customer,
            Scope::Class(_) => ScopeKind::Class,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Customer(id) => write!(f, "customer:{id}"),
            Scope::Class(id) => write!(f, "class:{id}"),
        }
    }
}

impl From<CustomerId> for Scope {
    fn from(value: CustomerId) -> Self {
        Scope::Customer(value)
    }
}

impl From<ClassId> for Scope {
    fn from(value: ClassId) -> Self {
        Scope::Class(value)
    }
}

/// Discriminant of a [`Scope`] without its resource id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Customer,
    Class,
}

impl core::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ScopeKind::Global => f.write_str("global"),
            ScopeKind::Customer => f.write_str("customer"),
            ScopeKind::Class => f.write_str("class"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_serializes_as_tagged_object() {
        assert_eq!(
            serde_json::to_value(Scope::Global).unwrap(),
            serde_json::json!({ "kind": "global" })
        );
        assert_eq!(
            serde_json::to_value(Scope::Customer(CustomerId::new(42))).unwrap(),
            serde_json::json!({ "kind": "customer", "id": 42 })
        );
        let class: Scope = serde_json::from_value(serde_json::json!({ "kind": "class", "id": 3 })).unwrap();
        assert_eq!(class, Scope::Class(ClassId::new(3)));
    }

    #[test]
    fn display_includes_resource_id() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(Scope::from(CustomerId::new(9)).to_string(), "customer:9");
        assert_eq!(Scope::from(ClassId::new(7)).to_string(), "class:7");
    }

    #[test]
    fn kind_strips_the_id() {
        assert_eq!(Scope::Customer(CustomerId::new(1)).kind(), ScopeKind::Customer);
        assert_eq!(Scope::Class(ClassId::new(1)).kind(), ScopeKind::Class);
        assert!(Scope::Global.is_global());
    }
}
