//! Request-boundary facade.
//!
//! [`RecordService`] is what a transport wraps: commit a version, read the
//! latest (or a historical) version, and read the audit history. Every call
//! runs inside the request context's span.

use std::sync::Arc;

use revmap_core::retry::RetryConfig;
use revmap_core::{AuditEntry, ChannelId, MapId, Record, ResourceId, Revision};
use revmap_map::{MapAdmin, VerifiableMapClient};
use revmap_telemetry::RequestContext;
use tracing::{Instrument, debug};

use crate::channel::{ChannelRegistry, MapChannelRegistry};
use crate::commit::{CommitCoordinator, CommitReceipt, CommitRequest};
use crate::error::{LedgerError, LedgerResult};
use crate::history::AuditReconstructor;
use crate::record::{MapRecordStore, RecordStore};

/// Commit, retrieve and audit records.
pub struct RecordService {
    registry: Arc<dyn ChannelRegistry>,
    records: Arc<dyn RecordStore>,
    coordinator: CommitCoordinator,
    reconstructor: AuditReconstructor,
}

impl RecordService {
    /// Create a service over injected collaborators.
    #[must_use]
    pub fn new(registry: Arc<dyn ChannelRegistry>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            coordinator: CommitCoordinator::new(Arc::clone(&registry), Arc::clone(&records)),
            reconstructor: AuditReconstructor::new(Arc::clone(&records)),
            registry,
            records,
        }
    }

    /// Create a service backed by the master map `master_map_id`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] if the master map cannot be opened.
    pub async fn connect(
        admin: MapAdmin,
        ctx: &RequestContext,
        master_map_id: MapId,
    ) -> LedgerResult<Self> {
        let registry = MapChannelRegistry::connect(admin, ctx, master_map_id).await?;
        Ok(Self::new(Arc::new(registry), Arc::new(MapRecordStore::new())))
    }

    /// Replace the commit conflict retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.coordinator = self.coordinator.with_retry(retry);
        self
    }

    /// Commit one version. See [`CommitCoordinator::commit`].
    ///
    /// # Errors
    ///
    /// Any [`LedgerError`] kind.
    pub async fn commit(
        &self,
        ctx: &RequestContext,
        request: CommitRequest,
    ) -> LedgerResult<CommitReceipt> {
        self.coordinator
            .commit(ctx, request)
            .instrument(ctx.span())
            .await
    }

    /// The latest version of a resource.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ChannelNotFound`], [`LedgerError::ResourceNotFound`],
    /// or [`LedgerError::Internal`].
    pub async fn retrieve(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        resource_id: &ResourceId,
    ) -> LedgerResult<Record> {
        self.retrieve_at(ctx, channel_id, resource_id, 0).await
    }

    /// The version of a resource visible at map revision `revision`, or the
    /// latest when `revision <= 0`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ChannelNotFound`], [`LedgerError::ResourceNotFound`]
    /// when the resource had no version at that revision, or
    /// [`LedgerError::Internal`].
    pub async fn retrieve_at(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        resource_id: &ResourceId,
        revision: Revision,
    ) -> LedgerResult<Record> {
        async {
            let map = self.channel_map(ctx, channel_id).await?;
            let record = self
                .records
                .fetch(ctx, map.as_ref(), resource_id, revision)
                .await?;

            record.ok_or_else(|| {
                debug!(
                    channel_id = %channel_id,
                    resource_id = %resource_id,
                    revision,
                    "Resource not found"
                );
                LedgerError::ResourceNotFound {
                    channel_id: channel_id.clone(),
                    resource_id: resource_id.clone(),
                }
            })
        }
        .instrument(ctx.span())
        .await
    }

    /// Every version of a resource, newest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ChannelNotFound`], [`LedgerError::ResourceNotFound`],
    /// or [`LedgerError::Internal`] (including a broken revision chain).
    pub async fn audit(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        resource_id: &ResourceId,
    ) -> LedgerResult<Vec<AuditEntry>> {
        async {
            let map = self.channel_map(ctx, channel_id).await?;
            self.reconstructor
                .history(ctx, channel_id, map.as_ref(), resource_id)
                .await
        }
        .instrument(ctx.span())
        .await
    }

    async fn channel_map(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
    ) -> LedgerResult<Arc<dyn VerifiableMapClient>> {
        let channel = self
            .registry
            .get(ctx, channel_id)
            .await?
            .ok_or_else(|| LedgerError::ChannelNotFound(channel_id.clone()))?;
        self.registry.map_handle(ctx, channel.map_id).await
    }
}

impl std::fmt::Debug for RecordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordService")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::provision::provision_master_map;
    use revmap_core::CommitType;
    use revmap_map::{DEFAULT_CALL_TIMEOUT, MemoryMapEngine};
    use serde_json::json;

    async fn service() -> RecordService {
        let engine = Arc::new(MemoryMapEngine::new());
        let admin = MapAdmin::new(engine, DEFAULT_CALL_TIMEOUT);
        let ctx = RequestContext::new("test");
        let master = provision_master_map(&admin, &ctx).await.unwrap();
        RecordService::connect(admin, &ctx, master)
            .await
            .unwrap()
            .with_retry(RetryConfig::fast())
    }

    #[tokio::test]
    async fn test_commit_retrieve_audit() {
        let service = service().await;
        let ctx = RequestContext::new("test");

        service
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({"k": "v"})))
            .await
            .unwrap();
        service
            .commit(&ctx, CommitRequest::new("c1", "r1", "UPDATE", json!({"k": "v2"})))
            .await
            .unwrap();

        let latest = service
            .retrieve(&ctx, &"c1".into(), &"r1".into())
            .await
            .unwrap();
        assert_eq!(latest.audit.payload, json!({"k": "v2"}));
        assert_eq!(latest.audit.event_type, CommitType::Update);

        let first = service
            .retrieve_at(&ctx, &"c1".into(), &"r1".into(), 1)
            .await
            .unwrap();
        assert_eq!(first.audit.payload, json!({"k": "v"}));

        let history = service
            .audit(&ctx, &"c1".into(), &"r1".into())
            .await
            .unwrap();
        let revisions: Vec<_> = history.iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_reads_on_unknown_channel() {
        let service = service().await;
        let ctx = RequestContext::new("test");

        let err = service
            .retrieve(&ctx, &"c1".into(), &"r1".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelNotFound);

        let err = service
            .audit(&ctx, &"c1".into(), &"r1".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelNotFound);
    }

    #[tokio::test]
    async fn test_reads_on_unknown_resource() {
        let service = service().await;
        let ctx = RequestContext::new("test");
        service
            .commit(&ctx, CommitRequest::new("c1", "r1", "CREATE", json!({})))
            .await
            .unwrap();

        let err = service
            .retrieve(&ctx, &"c1".into(), &"r2".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);

        let err = service
            .audit(&ctx, &"c1".into(), &"r2".into())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);

        // r1 exists at revision 1 but nothing has been written at revision 5.
        let err = service
            .retrieve_at(&ctx, &"c1".into(), &"r1".into(), 5)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }
}
