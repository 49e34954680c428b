//! Cryptographic primitives for the vkv storage layer.
//!
//! Provides domain-separated BLAKE3 hashing and Ed25519 signing/verification
//! for merge promises and map roots.
//!
//! All operations wrap established libraries; nothing here is custom
//! cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{PromiseSigner, Signature, SignatureError, SigningKey, VerifyingKey};
