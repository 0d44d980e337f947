//! Revmap Map - verified access to versioned key-value maps.
//!
//! This crate provides:
//! - [`MapBackend`]: the boundary to a verifiable map engine (allocate,
//!   initialise, conditional writes, revision-scoped reads, signed roots)
//! - [`VerifiableMapClient`] / [`MapClient`]: a per-map client that verifies
//!   every root it is handed, checks every leaf against that root, and bounds
//!   every call by the caller's deadline
//! - [`MemoryMapEngine`]: an in-process engine with optional JSON persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use revmap_crypto::Hash256;
//! use revmap_map::{DEFAULT_CALL_TIMEOUT, MapBackend, MapClient, MapLeaf, MapSpec,
//!     MemoryMapEngine, VerifiableMapClient};
//! use revmap_telemetry::RequestContext;
//!
//! # async fn example() -> Result<(), revmap_map::MapError> {
//! let engine = Arc::new(MemoryMapEngine::new());
//! let descriptor = engine.create_map(MapSpec::new("demo", "example map")).await?;
//! engine.init_map(descriptor.map_id).await?;
//!
//! let ctx = RequestContext::new("example");
//! let client = MapClient::connect(engine, &ctx, descriptor.map_id, DEFAULT_CALL_TIMEOUT).await?;
//! let index = Hash256::hash(b"key");
//! client.add(&ctx, vec![MapLeaf::new(index, b"value".to_vec())], 1).await?;
//! let leaves = client.get(&ctx, &[index]).await?;
//! assert_eq!(leaves.root.revision, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod backend;
mod client;
mod error;
mod memory;
mod types;
mod verifier;

pub use backend::MapBackend;
pub use client::{DEFAULT_CALL_TIMEOUT, MapAdmin, MapClient, VerifiableMapClient};
pub use error::{MapError, MapResult};
pub use memory::MemoryMapEngine;
pub use types::{
    LeafCommitment, MapDescriptor, MapLeaf, MapLeafInclusion, MapLeaves, MapRoot, MapSpec,
    RootWitness, SignedMapRoot, VerifiedLeaves,
};
pub use verifier::MapVerifier;
