use vkv_types::ContentHash;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"vkv-value-v1"`) that is
/// prepended to every hash computation. This prevents cross-type hash
/// collisions: a stored value and a queue-slot key with identical bytes
/// will produce different hashes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored value bytes (the content address of an object).
    pub const VALUE: Self = Self {
        domain: "vkv-value-v1",
    };
    /// Hasher for queue-slot map keys.
    pub const QUEUE_SLOT: Self = Self {
        domain: "vkv-queue-slot-v1",
    };
    /// Hasher for serialized map roots, as committed to the anchor log.
    pub const MAP_ROOT: Self = Self {
        domain: "vkv-map-root-v1",
    };
    /// Hasher for operation-log leaf payloads.
    pub const LOG_LEAF: Self = Self {
        domain: "vkv-log-leaf-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_digest(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected content hash.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
