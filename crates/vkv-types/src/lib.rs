//! Foundation types for the vkv verifiable storage layer.
//!
//! This crate provides the identity, commitment, and wire types used
//! throughout vkv. Every other vkv crate depends on `vkv-types`.
//!
//! # Key Types
//!
//! - [`ContentHash`]: content-addressed identifier (BLAKE3 hash)
//! - [`MapKey`]: opaque key into the versioned sparse map
//! - [`QueueId`]: opaque identifier of an application-level queue
//! - [`TreeId`]: identifier of one of the three external trees
//! - [`MergePromise`]: signed operator commitment that a pending write
//!   will eventually appear in the map
//! - [`SmrDescriptor`]: cached descriptor of the latest log-anchored
//!   signed map root
//! - [`GetResponse`]: proof-carrying read response wire bundle

pub mod descriptor;
pub mod error;
pub mod hash;
pub mod key;
pub mod promise;
pub mod response;
pub mod tree;

pub use descriptor::SmrDescriptor;
pub use error::TypeError;
pub use hash::ContentHash;
pub use key::{MapKey, QueueId};
pub use promise::{MergePromise, PromiseObject};
pub use response::GetResponse;
pub use tree::TreeId;
