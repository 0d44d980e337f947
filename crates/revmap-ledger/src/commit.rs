//! The commit state machine.
//!
//! A commit resolves its channel, reads the channel map's current revision
//! and the resource's latest version, decides what the new version links
//! to, and writes it at `current + 1`. The map's conditional write is the
//! only thing that orders concurrent commits, so a lost write surfaces as a
//! revision conflict and the whole sequence is run again, up to the
//! configured number of retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use revmap_core::retry::{RetryConfig, RetryOutcome, retry};
use revmap_core::{ChannelId, CommitType, MapId, ResourceId, Revision};
use revmap_telemetry::RequestContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::ChannelRegistry;
use crate::error::{InternalError, LedgerError, LedgerResult};
use crate::record::{RecordStore, RecordWrite};

/// A caller's request to write one version.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRequest {
    /// Target channel.
    pub channel_id: ChannelId,
    /// Target resource.
    pub resource_id: ResourceId,
    /// Commit type as supplied by the caller, parsed by the coordinator.
    pub commit_type: String,
    /// Document to store.
    pub payload: serde_json::Value,
}

impl CommitRequest {
    /// Create a request.
    #[must_use]
    pub fn new(
        channel_id: impl Into<ChannelId>,
        resource_id: impl Into<ResourceId>,
        commit_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            resource_id: resource_id.into(),
            commit_type: commit_type.into(),
            payload,
        }
    }
}

/// Where a successful commit landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Channel written to.
    pub channel_id: ChannelId,
    /// Resource written.
    pub resource_id: ResourceId,
    /// The channel's map.
    pub map_id: MapId,
    /// Revision of the new version.
    pub revision: Revision,
    /// Revision it supersedes, 0 for a first version.
    pub previous_revision: Revision,
    /// Whether this commit registered the channel.
    pub channel_created: bool,
}

/// Runs commits against a channel registry and a record store.
pub struct CommitCoordinator {
    registry: Arc<dyn ChannelRegistry>,
    records: Arc<dyn RecordStore>,
    retry: RetryConfig,
}

impl CommitCoordinator {
    /// Create a single-shot coordinator.
    ///
    /// A lost race comes back to the caller as a revision conflict until a
    /// policy is installed with [`Self::with_retry`].
    #[must_use]
    pub fn new(registry: Arc<dyn ChannelRegistry>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            records,
            retry: RetryConfig::no_retry(),
        }
    }

    /// Replace the conflict retry policy. `max_retries = 0` disables retries.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The conflict retry policy.
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Commit one version.
    ///
    /// `CREATE` and `TRANSFER-IN` register the channel if needed and require
    /// the resource to have no version yet. The other types require both the
    /// channel and a latest version, which the new version links to.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidCommitType`] before any map access.
    /// - [`LedgerError::ChannelNotFound`] for a non-creating type on an
    ///   unknown channel.
    /// - [`LedgerError::ResourceExists`] / [`LedgerError::ResourceNotFound`]
    ///   per the rules above. Nothing is written.
    /// - [`LedgerError::Internal`] on map failure, including a revision
    ///   conflict that outlived every retry.
    pub async fn commit(
        &self,
        ctx: &RequestContext,
        request: CommitRequest,
    ) -> LedgerResult<CommitReceipt> {
        let commit_type: CommitType = request.commit_type.parse().map_err(|_| {
            warn!(
                channel_id = %request.channel_id,
                resource_id = %request.resource_id,
                commit_type = %request.commit_type,
                "Rejected commit with unknown type"
            );
            LedgerError::InvalidCommitType(request.commit_type.clone())
        })?;

        let channel_created = AtomicBool::new(false);
        let request = &request;
        let created = &channel_created;

        let outcome = retry(
            &self.retry,
            move |attempt| self.attempt(ctx, request, commit_type, created, attempt),
            LedgerError::is_revision_conflict,
        )
        .await;

        match outcome {
            RetryOutcome::Success(mut receipt) => {
                receipt.channel_created = channel_created.load(Ordering::Relaxed);
                info!(
                    channel_id = %receipt.channel_id,
                    resource_id = %receipt.resource_id,
                    commit_type = %commit_type,
                    map_id = %receipt.map_id,
                    revision = receipt.revision,
                    previous_revision = receipt.previous_revision,
                    channel_created = receipt.channel_created,
                    "Record committed"
                );
                Ok(receipt)
            },
            RetryOutcome::Exhausted { error, attempts } => {
                warn!(
                    channel_id = %request.channel_id,
                    resource_id = %request.resource_id,
                    commit_type = %commit_type,
                    kind = %error.kind(),
                    attempts,
                    error = %error,
                    "Commit failed"
                );
                Err(error)
            },
        }
    }

    /// One read-decide-write pass.
    async fn attempt(
        &self,
        ctx: &RequestContext,
        request: &CommitRequest,
        commit_type: CommitType,
        channel_created: &AtomicBool,
        attempt: u32,
    ) -> LedgerResult<CommitReceipt> {
        if attempt > 0 {
            debug!(
                channel_id = %request.channel_id,
                resource_id = %request.resource_id,
                attempt,
                "Retrying commit after revision conflict"
            );
        }

        let channel = if commit_type.creates_resource() {
            let ensured = self.registry.ensure(ctx, &request.channel_id).await?;
            if ensured.created {
                channel_created.store(true, Ordering::Relaxed);
            }
            ensured.channel
        } else {
            self.registry
                .get(ctx, &request.channel_id)
                .await?
                .ok_or_else(|| LedgerError::ChannelNotFound(request.channel_id.clone()))?
        };

        let map = self.registry.map_handle(ctx, channel.map_id).await?;
        let current = map.get_current_revision(ctx).await?;
        let existing = self
            .records
            .fetch(ctx, map.as_ref(), &request.resource_id, 0)
            .await?;

        let previous_revision = match (commit_type.creates_resource(), existing) {
            (true, None) => 0,
            (false, Some(latest)) => latest.revision,
            (true, Some(_)) => {
                return Err(LedgerError::ResourceExists {
                    channel_id: request.channel_id.clone(),
                    resource_id: request.resource_id.clone(),
                });
            },
            (false, None) => {
                return Err(LedgerError::ResourceNotFound {
                    channel_id: request.channel_id.clone(),
                    resource_id: request.resource_id.clone(),
                });
            },
        };

        let revision = current
            .checked_add(1)
            .ok_or(InternalError::RevisionOverflow(channel.map_id))?;

        let record = self
            .records
            .put(
                ctx,
                map.as_ref(),
                RecordWrite {
                    channel_id: request.channel_id.clone(),
                    resource_id: request.resource_id.clone(),
                    commit_type,
                    payload: request.payload.clone(),
                    revision,
                    previous_revision,
                },
            )
            .await?;

        Ok(CommitReceipt {
            channel_id: channel.channel_id,
            resource_id: record.audit.resource_id,
            map_id: channel.map_id,
            revision: record.revision,
            previous_revision: record.previous_revision,
            channel_created: false,
        })
    }
}

impl std::fmt::Debug for CommitCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitCoordinator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EnsuredChannel, MapChannelRegistry};
    use crate::provision::provision_master_map;
    use crate::record::MapRecordStore;
    use crate::{ErrorKind, RetryClass};
    use async_trait::async_trait;
    use revmap_core::{Channel, Record};
    use revmap_map::{
        DEFAULT_CALL_TIMEOUT, MapAdmin, MapLeaf, MemoryMapEngine, VerifiableMapClient,
    };
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    struct Fixture {
        engine: Arc<MemoryMapEngine>,
        registry: Arc<MapChannelRegistry>,
        coordinator: CommitCoordinator,
    }

    async fn fixture() -> Fixture {
        let engine = Arc::new(MemoryMapEngine::new());
        let admin = MapAdmin::new(engine.clone(), DEFAULT_CALL_TIMEOUT);
        let ctx = RequestContext::new("test");
        let master = provision_master_map(&admin, &ctx).await.unwrap();
        let registry = Arc::new(
            MapChannelRegistry::connect(admin, &ctx, master)
                .await
                .unwrap(),
        );
        let coordinator =
            CommitCoordinator::new(registry.clone(), Arc::new(MapRecordStore::new()))
                .with_retry(RetryConfig::fast());
        Fixture {
            engine,
            registry,
            coordinator,
        }
    }

    async fn channel_revision(fixture: &Fixture, channel: &str) -> Revision {
        let ctx = RequestContext::new("test");
        let channel = fixture
            .registry
            .get(&ctx, &channel.into())
            .await
            .unwrap()
            .unwrap();
        let map = fixture
            .registry
            .map_handle(&ctx, channel.map_id)
            .await
            .unwrap();
        map.get_current_revision(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_on_new_channel() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");

        let receipt = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();

        assert!(receipt.channel_created);
        assert_eq!(receipt.revision, 1);
        assert_eq!(receipt.previous_revision, 0);
    }

    #[tokio::test]
    async fn test_second_create_reuses_channel() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");

        let first = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({})))
            .await
            .unwrap();
        let maps = f.engine.map_count().unwrap();

        let second = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c1", "r2", "TRANSFER-IN", json!({})))
            .await
            .unwrap();

        assert!(!second.channel_created);
        assert_eq!(second.map_id, first.map_id);
        assert_eq!(second.revision, 2);
        assert_eq!(second.previous_revision, 0);
        assert_eq!(f.engine.map_count().unwrap(), maps);
    }

    #[tokio::test]
    async fn test_update_links_to_latest() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");

        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();
        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r2", "CREATE", json!({})))
            .await
            .unwrap();
        let receipt = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "DETACH", json!({"k": "v2"})))
            .await
            .unwrap();

        assert_eq!(receipt.revision, 3);
        assert_eq!(receipt.previous_revision, 1);
        assert!(!receipt.channel_created);
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_map_untouched() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");

        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({})))
            .await
            .unwrap();
        let err = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "TRANSFERIN", json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ResourceExists);
        assert_eq!(err.retry_class(), RetryClass::ChangeCommitType);
        assert_eq!(channel_revision(&f, "c1").await, 1);
    }

    #[tokio::test]
    async fn test_update_on_missing_resource() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");

        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({})))
            .await
            .unwrap();
        for commit_type in ["UPDATE", "ATTACH", "DETACH", "TRANSFER-OUT"] {
            let err = f
                .coordinator
                .commit(&ctx, CommitRequest::new("c1", "r2", commit_type, json!({})))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ResourceNotFound, "{commit_type}");
        }
        assert_eq!(channel_revision(&f, "c1").await, 1);
    }

    #[tokio::test]
    async fn test_update_on_unknown_channel() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");
        let maps = f.engine.map_count().unwrap();

        let err = f
            .coordinator
            .commit(&ctx, CommitRequest::new("c9", "r1", "UPDATE", json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ChannelNotFound(ref id) if id.as_str() == "c9"));
        assert_eq!(f.engine.map_count().unwrap(), maps);
    }

    #[tokio::test]
    async fn test_invalid_commit_type_touches_nothing() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");
        let maps = f.engine.map_count().unwrap();

        for commit_type in ["DELETE", "create", ""] {
            let err = f
                .coordinator
                .commit(&ctx, CommitRequest::new("c1", "r1", commit_type, json!({})))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCommitType);
        }
        assert_eq!(f.engine.map_count().unwrap(), maps);
        assert!(f.registry.get(&ctx, &"c1".into()).await.unwrap().is_none());
    }

    /// Registry whose channel map gets one foreign write just before the
    /// first record write.
    struct Interloper {
        inner: Arc<MapChannelRegistry>,
        pending: AtomicU32,
    }

    struct InterloperMap {
        inner: Arc<dyn VerifiableMapClient>,
        pending: Arc<AtomicU32>,
    }

    #[async_trait]
    impl VerifiableMapClient for InterloperMap {
        fn map_id(&self) -> MapId {
            self.inner.map_id()
        }

        async fn add(
            &self,
            ctx: &RequestContext,
            leaves: Vec<MapLeaf>,
            expected_revision: Revision,
        ) -> revmap_map::MapResult<revmap_map::MapRoot> {
            if self.pending.load(Ordering::SeqCst) > 0 {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                let other = Record {
                    audit: revmap_core::AuditDefinition::now(
                        "c1".into(),
                        "other".into(),
                        CommitType::Create,
                        json!({}),
                    ),
                    revision: expected_revision,
                    previous_revision: 0,
                };
                let leaf = MapLeaf::new(
                    other.audit.resource_id.leaf_index(),
                    other.to_leaf_value().unwrap(),
                );
                self.inner.add(ctx, vec![leaf], expected_revision).await?;
            }
            self.inner.add(ctx, leaves, expected_revision).await
        }

        async fn get(
            &self,
            ctx: &RequestContext,
            indexes: &[revmap_crypto::Hash256],
        ) -> revmap_map::MapResult<revmap_map::VerifiedLeaves> {
            self.inner.get(ctx, indexes).await
        }

        async fn get_by_revision(
            &self,
            ctx: &RequestContext,
            indexes: &[revmap_crypto::Hash256],
            revision: Revision,
        ) -> revmap_map::MapResult<revmap_map::VerifiedLeaves> {
            self.inner.get_by_revision(ctx, indexes, revision).await
        }

        async fn get_current_revision(
            &self,
            ctx: &RequestContext,
        ) -> revmap_map::MapResult<Revision> {
            self.inner.get_current_revision(ctx).await
        }
    }

    #[async_trait]
    impl ChannelRegistry for Interloper {
        async fn create(
            &self,
            ctx: &RequestContext,
            channel_id: &ChannelId,
            expected_revision: Revision,
        ) -> LedgerResult<MapId> {
            self.inner.create(ctx, channel_id, expected_revision).await
        }

        async fn get(
            &self,
            ctx: &RequestContext,
            channel_id: &ChannelId,
        ) -> LedgerResult<Option<Channel>> {
            self.inner.get(ctx, channel_id).await
        }

        async fn ensure(
            &self,
            ctx: &RequestContext,
            channel_id: &ChannelId,
        ) -> LedgerResult<EnsuredChannel> {
            self.inner.ensure(ctx, channel_id).await
        }

        async fn map_handle(
            &self,
            ctx: &RequestContext,
            map_id: MapId,
        ) -> LedgerResult<Arc<dyn VerifiableMapClient>> {
            let inner = self.inner.map_handle(ctx, map_id).await?;
            let pending = Arc::new(AtomicU32::new(self.pending.swap(0, Ordering::SeqCst)));
            Ok(Arc::new(InterloperMap { inner, pending }))
        }
    }

    async fn interloper_coordinator(retry: RetryConfig) -> CommitCoordinator {
        let f = fixture().await;
        let ctx = RequestContext::new("test");
        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();

        let registry = Arc::new(Interloper {
            inner: f.registry,
            pending: AtomicU32::new(1),
        });
        CommitCoordinator::new(registry, Arc::new(MapRecordStore::new())).with_retry(retry)
    }

    #[tokio::test]
    async fn test_lost_race_is_retried() {
        let coordinator = interloper_coordinator(RetryConfig::fast()).await;
        let ctx = RequestContext::new("test");

        let receipt = coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v2"})))
            .await
            .unwrap();

        // Revision 2 went to the interloper.
        assert_eq!(receipt.revision, 3);
        assert_eq!(receipt.previous_revision, 1);
    }

    #[tokio::test]
    async fn test_lost_race_without_retry_is_internal() {
        let coordinator = interloper_coordinator(RetryConfig::no_retry()).await;
        let ctx = RequestContext::new("test");

        let err = coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v2"})))
            .await
            .unwrap_err();

        assert!(err.is_revision_conflict());
        assert_eq!(err.retry_class(), RetryClass::SameOperation);
    }

    #[tokio::test]
    async fn test_lost_race_is_returned_by_default() {
        let f = fixture().await;
        let ctx = RequestContext::new("test");
        f.coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();

        let registry = Arc::new(Interloper {
            inner: f.registry,
            pending: AtomicU32::new(1),
        });
        let coordinator = CommitCoordinator::new(registry, Arc::new(MapRecordStore::new()));
        assert_eq!(coordinator.retry_config(), &RetryConfig::no_retry());

        let err = coordinator
            .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v2"})))
            .await
            .unwrap_err();
        assert!(err.is_revision_conflict());
    }
}
