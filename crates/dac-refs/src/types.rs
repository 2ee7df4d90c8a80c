//! The reference record.

use serde::{Deserialize, Serialize};

use dac_types::ObjectId;

/// A named, mutable pointer at an object.
///
/// `name` is the stable lookup key; `target` is reassigned by explicit move
/// operations. An absent reference is represented by `None` at the storage
/// boundary rather than by a null target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Short reference name (e.g. "main", "feature/auth").
    pub name: String,
    /// The object this reference currently points at.
    pub target: ObjectId,
}

impl Reference {
    /// Create a reference record.
    pub fn new(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    /// The name under a namespace prefix (e.g. "refs/heads/main").
    pub fn qualified_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_prepends_prefix() {
        let r = Reference::new("B", ObjectId::from_digest([1; 64]));
        assert_eq!(r.qualified_name("refs/heads/"), "refs/heads/B");
    }

    #[test]
    fn serde_roundtrip() {
        let r = Reference::new("main", ObjectId::from_digest([2; 64]));
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
    }
}
