//! Client boundary for the two external transparency services.
//!
//! The storage layer depends on an append-only log and a versioned sparse
//! map, both operated outside this repository. This crate specifies that
//! boundary as async traits ([`LogClient`], [`MapClient`]) plus the wire
//! types they exchange, and provides [`InMemoryTransparency`], a single
//! in-process implementation of both traits for tests and embedding.
//!
//! Proof blobs are opaque at this boundary: real deployments verify them
//! against the external tree's public key, and this crate never interprets
//! them beyond carrying bytes.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{TreeError, TreeResult};
pub use memory::InMemoryTransparency;
pub use traits::{LogClient, MapClient};
pub use types::{Ack, MapLeafInclusion, MapLookup, SignedLogRoot, SignedMapRoot};
