//! Verifying client for a single map.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use revmap_core::{MapId, Revision};
use revmap_crypto::Hash256;
use revmap_telemetry::RequestContext;
use tracing::{debug, warn};

use crate::backend::MapBackend;
use crate::error::{MapError, MapResult};
use crate::types::{MapDescriptor, MapLeaf, MapLeaves, MapRoot, MapSpec, VerifiedLeaves};
use crate::verifier::MapVerifier;

/// Default bound on a single round trip to the engine.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Revision-scoped, verified access to one map.
///
/// Nothing returned by an implementation has skipped verification: a root
/// whose signature fails, or a leaf the signed root does not commit to, is an
/// error, never a value.
#[async_trait]
pub trait VerifiableMapClient: Send + Sync {
    /// The map this client talks to.
    fn map_id(&self) -> MapId;

    /// Write leaves so that the map moves to `expected_revision`.
    ///
    /// # Errors
    ///
    /// [`MapError::RevisionConflict`] if the map is not at
    /// `expected_revision - 1`, or any transport, verification or deadline
    /// failure.
    async fn add(
        &self,
        ctx: &RequestContext,
        leaves: Vec<MapLeaf>,
        expected_revision: Revision,
    ) -> MapResult<MapRoot>;

    /// Read the latest value of each index together with the verified root.
    ///
    /// # Errors
    ///
    /// Any transport, verification or deadline failure.
    async fn get(&self, ctx: &RequestContext, indexes: &[Hash256]) -> MapResult<VerifiedLeaves>;

    /// Read each index as of `revision` together with that revision's verified root.
    ///
    /// # Errors
    ///
    /// [`MapError::RevisionOutOfRange`] for a revision the map does not have,
    /// or any transport, verification or deadline failure.
    async fn get_by_revision(
        &self,
        ctx: &RequestContext,
        indexes: &[Hash256],
        revision: Revision,
    ) -> MapResult<VerifiedLeaves>;

    /// Verified current revision of the map.
    ///
    /// # Errors
    ///
    /// Any transport, verification or deadline failure.
    async fn get_current_revision(&self, ctx: &RequestContext) -> MapResult<Revision>;
}

/// [`VerifiableMapClient`] over any [`MapBackend`].
///
/// Every backend call is bounded by the smaller of the context's remaining
/// time and the configured per-call timeout. Dropping a pending call
/// abandons it.
pub struct MapClient {
    backend: Arc<dyn MapBackend>,
    verifier: MapVerifier,
    map_id: MapId,
    call_timeout: Duration,
}

impl MapClient {
    /// Resolve a map id into a live client.
    ///
    /// Fetches the map's metadata to learn its signing key.
    ///
    /// # Errors
    ///
    /// [`MapError::MapNotFound`] for an unknown map, [`MapError::NotInitialized`]
    /// if revision 0 was never published, or any transport or deadline failure.
    pub async fn connect(
        backend: Arc<dyn MapBackend>,
        ctx: &RequestContext,
        map_id: MapId,
        call_timeout: Duration,
    ) -> MapResult<Self> {
        let descriptor = bounded(
            ctx,
            map_id,
            call_timeout,
            "get_map_metadata",
            backend.get_map_metadata(map_id),
        )
        .await?;

        if descriptor.map_id != map_id {
            return Err(MapError::Verification(format!(
                "metadata for map {map_id} describes map {}",
                descriptor.map_id
            )));
        }
        if !descriptor.initialized {
            return Err(MapError::NotInitialized(map_id));
        }

        debug!(map_id = %map_id, key_id = %descriptor.public_key.key_id_hex(), "Connected to map");

        Ok(Self {
            verifier: MapVerifier::from_descriptor(&descriptor),
            backend,
            map_id,
            call_timeout,
        })
    }

    /// Per-call timeout in effect.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    async fn call<T, F>(&self, ctx: &RequestContext, operation: &str, fut: F) -> MapResult<T>
    where
        F: Future<Output = MapResult<T>> + Send,
    {
        bounded(ctx, self.map_id, self.call_timeout, operation, fut).await
    }

    fn verify_leaves(
        &self,
        indexes: &[Hash256],
        leaves: MapLeaves,
    ) -> MapResult<VerifiedLeaves> {
        let root = self.verifier.verify_root(&leaves.signed_root)?;
        self.verifier
            .verify_inclusions(&root, indexes, &leaves.inclusions, &leaves.witness)?;
        Ok(VerifiedLeaves {
            inclusions: leaves.inclusions,
            root,
        })
    }
}

impl std::fmt::Debug for MapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapClient")
            .field("map_id", &self.map_id)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VerifiableMapClient for MapClient {
    fn map_id(&self) -> MapId {
        self.map_id
    }

    async fn add(
        &self,
        ctx: &RequestContext,
        leaves: Vec<MapLeaf>,
        expected_revision: Revision,
    ) -> MapResult<MapRoot> {
        let count = leaves.len();
        let signed = self
            .call(
                ctx,
                "write_leaves",
                self.backend
                    .write_leaves(self.map_id, leaves, expected_revision),
            )
            .await
            .inspect_err(|e| {
                warn!(
                    map_id = %self.map_id,
                    revision = expected_revision,
                    error = %e,
                    "Conditional write rejected"
                );
            })?;

        let root = self.verifier.verify_root(&signed)?;
        if root.revision != expected_revision {
            return Err(MapError::Verification(format!(
                "write to map {} expected revision {expected_revision}, engine published {}",
                self.map_id, root.revision
            )));
        }

        debug!(
            map_id = %self.map_id,
            revision = root.revision,
            leaves = count,
            "Leaves written"
        );
        Ok(root)
    }

    async fn get(&self, ctx: &RequestContext, indexes: &[Hash256]) -> MapResult<VerifiedLeaves> {
        let leaves = self
            .call(ctx, "get_leaves", self.backend.get_leaves(self.map_id, indexes))
            .await?;
        self.verify_leaves(indexes, leaves)
    }

    async fn get_by_revision(
        &self,
        ctx: &RequestContext,
        indexes: &[Hash256],
        revision: Revision,
    ) -> MapResult<VerifiedLeaves> {
        let leaves = self
            .call(
                ctx,
                "get_leaves_by_revision",
                self.backend
                    .get_leaves_by_revision(self.map_id, indexes, revision),
            )
            .await?;
        let verified = self.verify_leaves(indexes, leaves)?;

        if verified.root.revision != revision {
            return Err(MapError::Verification(format!(
                "read of map {} at revision {revision} was served at revision {}",
                self.map_id, verified.root.revision
            )));
        }
        Ok(verified)
    }

    async fn get_current_revision(&self, ctx: &RequestContext) -> MapResult<Revision> {
        let signed = self
            .call(
                ctx,
                "get_signed_map_root",
                self.backend.get_signed_map_root(self.map_id),
            )
            .await?;
        Ok(self.verifier.verify_root(&signed)?.revision)
    }
}

/// Administrative access to an engine: allocate maps and open clients.
///
/// Carries the same per-call timeout as the clients it opens.
#[derive(Clone)]
pub struct MapAdmin {
    backend: Arc<dyn MapBackend>,
    call_timeout: Duration,
}

impl MapAdmin {
    /// Create an admin handle over an engine.
    #[must_use]
    pub fn new(backend: Arc<dyn MapBackend>, call_timeout: Duration) -> Self {
        Self {
            backend,
            call_timeout,
        }
    }

    /// The engine behind this handle.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn MapBackend> {
        &self.backend
    }

    /// Allocate a map and publish its revision 0.
    ///
    /// # Errors
    ///
    /// Any engine, verification or deadline failure. A failure after
    /// allocation leaves an unused map behind.
    pub async fn create_map(
        &self,
        ctx: &RequestContext,
        spec: MapSpec,
    ) -> MapResult<MapDescriptor> {
        let mut descriptor = bounded(
            ctx,
            MapId(0),
            self.call_timeout,
            "create_map",
            self.backend.create_map(spec),
        )
        .await?;
        let map_id = descriptor.map_id;

        let signed = bounded(
            ctx,
            map_id,
            self.call_timeout,
            "init_map",
            self.backend.init_map(map_id),
        )
        .await?;

        let root = MapVerifier::from_descriptor(&descriptor).verify_root(&signed)?;
        if root.revision != 0 {
            return Err(MapError::Verification(format!(
                "map {map_id} initialised at revision {}",
                root.revision
            )));
        }

        descriptor.initialized = true;
        debug!(map_id = %map_id, name = %descriptor.display_name, "Map allocated");
        Ok(descriptor)
    }

    /// Open a verifying client for an existing map.
    ///
    /// # Errors
    ///
    /// See [`MapClient::connect`].
    pub async fn connect(&self, ctx: &RequestContext, map_id: MapId) -> MapResult<MapClient> {
        MapClient::connect(Arc::clone(&self.backend), ctx, map_id, self.call_timeout).await
    }
}

impl std::fmt::Debug for MapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapAdmin")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

/// Run one backend call under the context deadline and the per-call timeout.
async fn bounded<T, F>(
    ctx: &RequestContext,
    map_id: MapId,
    call_timeout: Duration,
    operation: &str,
    fut: F,
) -> MapResult<T>
where
    F: Future<Output = MapResult<T>>,
{
    let budget = ctx
        .remaining()
        .map_or(call_timeout, |remaining| remaining.min(call_timeout));

    let deadline_exceeded = || MapError::DeadlineExceeded {
        map_id,
        operation: operation.to_string(),
    };

    if budget.is_zero() {
        return Err(deadline_exceeded());
    }

    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| deadline_exceeded())?
}
