use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one of the external transparency trees.
///
/// The storage layer talks to three trees: the operation log, the sparse
/// map, and the anchor log that certifies map roots. All three identifiers
/// are assigned by the external services and supplied via configuration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(i64);

impl TreeId {
    /// Wrap a raw tree identifier.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeId({})", self.0)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TreeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_unwraps() {
        let id = TreeId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(format!("{id}"), "42");
    }

    #[test]
    fn serde_roundtrip() {
        let id = TreeId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: TreeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
