//! Verifiable key-value storage core.
//!
//! Sits atop two external transparency primitives, an append-only log and a
//! versioned sparse map, and stores content-addressed objects durably and
//! provably. Writers get an immediate, signed commitment (a merge promise)
//! that their write will be included; readers get proof-carrying answers
//! even when the map has not yet absorbed the write.
//!
//! # Components
//!
//! - [`StorageService`]: the public entry points, [`StorageService::insert`]
//!   (merge coordination) and [`StorageService::get`] /
//!   [`StorageService::get_live`] (proof-carrying reads with revision
//!   stabilization)
//! - [`PromiseRegistry`]: in-memory table of keys with writes pending merge
//! - [`queue`]: derivation of a queue's current length from a
//!   point-existence-only map
//!
//! All shared state lives on the service instance; construct one per
//! deployment or tenant. There are no package-level globals.

pub mod config;
pub mod error;
pub mod queue;
pub mod registry;
pub mod service;

pub use config::ServiceConfig;
pub use error::{StorageError, StorageResult};
pub use queue::resolve_tail;
pub use registry::PromiseRegistry;
pub use service::StorageService;
