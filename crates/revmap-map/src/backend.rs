//! The verifiable map engine boundary.
//!
//! A [`MapBackend`] is whatever actually stores leaves and publishes signed
//! roots: a remote map server, or the in-process
//! [`MemoryMapEngine`](crate::MemoryMapEngine). Callers never use it
//! directly for reads; they go through a
//! [`MapClient`](crate::MapClient), which verifies everything the backend
//! returns.

use async_trait::async_trait;
use revmap_core::{MapId, Revision};
use revmap_crypto::Hash256;

use crate::error::MapResult;
use crate::types::{MapDescriptor, MapLeaf, MapLeaves, MapSpec, SignedMapRoot};

/// Administrative and data operations of a verifiable map engine.
///
/// Revision semantics:
/// - a freshly initialised map is at revision 0 with an empty root;
/// - `write_leaves` succeeds only when `expect_revision == current + 1`
///   and produces exactly that revision;
/// - reads return the signed root of the revision they were served at.
#[async_trait]
pub trait MapBackend: Send + Sync {
    /// Allocate a new, uninitialised map.
    async fn create_map(&self, spec: MapSpec) -> MapResult<MapDescriptor>;

    /// Publish revision 0 of a map.
    async fn init_map(&self, map_id: MapId) -> MapResult<SignedMapRoot>;

    /// Fetch a map's administrative metadata.
    async fn get_map_metadata(&self, map_id: MapId) -> MapResult<MapDescriptor>;

    /// Conditionally write leaves, producing revision `expect_revision`.
    ///
    /// Fails with [`MapError::RevisionConflict`](crate::MapError::RevisionConflict)
    /// when the map is not at `expect_revision - 1`.
    async fn write_leaves(
        &self,
        map_id: MapId,
        leaves: Vec<MapLeaf>,
        expect_revision: Revision,
    ) -> MapResult<SignedMapRoot>;

    /// Read the latest value of each index.
    async fn get_leaves(&self, map_id: MapId, indexes: &[Hash256]) -> MapResult<MapLeaves>;

    /// Read each index as it was at `revision`.
    async fn get_leaves_by_revision(
        &self,
        map_id: MapId,
        indexes: &[Hash256],
        revision: Revision,
    ) -> MapResult<MapLeaves>;

    /// Fetch the latest signed root.
    async fn get_signed_map_root(&self, map_id: MapId) -> MapResult<SignedMapRoot>;
}
