use serde::{Deserialize, Serialize};
use vkv_types::TreeId;

/// Tree identifiers the storage core operates against.
///
/// All three are assigned by the external transparency services and
/// supplied by deployment configuration; the signing key pair travels
/// separately (see [`crate::StorageService::from_key_bytes`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Append-only log of operation records (one per issued promise).
    pub op_log: TreeId,
    /// The versioned sparse map holding `key -> content hash` leaves.
    pub map: TreeId,
    /// Log anchoring certified map roots.
    pub anchor_log: TreeId,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            op_log: TreeId::new(1),
            map: TreeId::new(2),
            anchor_log: TreeId::new(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ids_are_distinct() {
        let config = ServiceConfig::default();
        assert_ne!(config.op_log, config.map);
        assert_ne!(config.map, config.anchor_log);
    }

    #[test]
    fn serde_roundtrip() {
        let config = ServiceConfig {
            op_log: TreeId::new(10),
            map: TreeId::new(20),
            anchor_log: TreeId::new(30),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
