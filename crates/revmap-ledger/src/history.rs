//! Audit history reconstruction.

use std::sync::Arc;

use revmap_core::{AuditEntry, ChannelId, ResourceId};
use revmap_map::VerifiableMapClient;
use revmap_telemetry::RequestContext;
use tracing::{debug, error};

use crate::error::{InternalError, LedgerError, LedgerResult};
use crate::record::RecordStore;

/// Walks a resource's previous-revision chain.
pub struct AuditReconstructor {
    records: Arc<dyn RecordStore>,
}

impl AuditReconstructor {
    /// Create a reconstructor reading through `records`.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Every version of `resource_id` in `map`, newest first.
    ///
    /// One read per version. `channel_id` only labels the not-found error.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ResourceNotFound`] if the resource has no version.
    /// - [`LedgerError::Internal`] on any read failure, or if the chain
    ///   points at an empty revision, at a revision holding an older version,
    ///   or fails to point strictly backwards.
    pub async fn history(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        map: &dyn VerifiableMapClient,
        resource_id: &ResourceId,
    ) -> LedgerResult<Vec<AuditEntry>> {
        let Some(mut current) = self.records.fetch(ctx, map, resource_id, 0).await? else {
            return Err(LedgerError::ResourceNotFound {
                channel_id: channel_id.clone(),
                resource_id: resource_id.clone(),
            });
        };

        let mut entries = Vec::new();
        loop {
            let revision = current.revision;
            let previous = current.previous_revision;
            entries.push(AuditEntry::from(current));

            if previous <= 0 {
                break;
            }
            if previous >= revision {
                error!(
                    map_id = %map.map_id(),
                    resource_id = %resource_id,
                    revision,
                    previous_revision = previous,
                    "Revision chain does not point backwards"
                );
                return Err(InternalError::CorruptChain {
                    resource_id: resource_id.clone(),
                    revision,
                    previous_revision: previous,
                }
                .into());
            }

            current = match self.records.fetch(ctx, map, resource_id, previous).await? {
                Some(record) => record,
                None => {
                    error!(
                        map_id = %map.map_id(),
                        resource_id = %resource_id,
                        revision = previous,
                        "Revision chain points at a missing version"
                    );
                    return Err(InternalError::BrokenChain {
                        resource_id: resource_id.clone(),
                        revision: previous,
                    }
                    .into());
                },
            };
            if current.revision != previous {
                error!(
                    map_id = %map.map_id(),
                    resource_id = %resource_id,
                    revision,
                    previous_revision = previous,
                    found_revision = current.revision,
                    "Revision chain points at a revision this resource was not written at"
                );
                return Err(InternalError::CorruptChain {
                    resource_id: resource_id.clone(),
                    revision,
                    previous_revision: previous,
                }
                .into());
            }
        }

        debug!(
            map_id = %map.map_id(),
            resource_id = %resource_id,
            versions = entries.len(),
            "Audit history reconstructed"
        );
        Ok(entries)
    }
}

impl std::fmt::Debug for AuditReconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditReconstructor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MapRecordStore, RecordWrite};
    use revmap_core::{CommitType, Record};
    use revmap_map::{DEFAULT_CALL_TIMEOUT, MapAdmin, MapLeaf, MapSpec, MemoryMapEngine};
    use serde_json::json;

    async fn channel_map() -> Arc<dyn VerifiableMapClient> {
        let engine = Arc::new(MemoryMapEngine::new());
        let admin = MapAdmin::new(engine, DEFAULT_CALL_TIMEOUT);
        let ctx = RequestContext::new("test");
        let descriptor = admin
            .create_map(&ctx, MapSpec::new("c1", "test channel"))
            .await
            .unwrap();
        Arc::new(admin.connect(&ctx, descriptor.map_id).await.unwrap())
    }

    async fn put(
        map: &dyn VerifiableMapClient,
        resource: &str,
        commit_type: CommitType,
        payload: serde_json::Value,
        revision: i64,
        previous: i64,
    ) {
        let ctx = RequestContext::new("test");
        MapRecordStore::new()
            .put(
                &ctx,
                map,
                RecordWrite {
                    channel_id: "c1".into(),
                    resource_id: resource.into(),
                    commit_type,
                    payload,
                    revision,
                    previous_revision: previous,
                },
            )
            .await
            .unwrap();
    }

    /// Write a raw record leaf, bypassing the chain rules.
    async fn put_raw(map: &dyn VerifiableMapClient, record: &Record) {
        let ctx = RequestContext::new("test");
        let index = record.audit.resource_id.leaf_index();
        map.add(
            &ctx,
            vec![MapLeaf::new(index, record.to_leaf_value().unwrap())],
            record.revision,
        )
        .await
        .unwrap();
    }

    fn reconstructor() -> AuditReconstructor {
        AuditReconstructor::new(Arc::new(MapRecordStore::new()))
    }

    #[tokio::test]
    async fn test_history_newest_first_across_interleaved_resources() {
        let map = channel_map().await;
        let ctx = RequestContext::new("test");

        put(map.as_ref(), "r1", CommitType::Create, json!({"k": "v"}), 1, 0).await;
        put(map.as_ref(), "r2", CommitType::Create, json!({"other": 1}), 2, 0).await;
        put(map.as_ref(), "r1", CommitType::Update, json!({"k": "v2"}), 3, 1).await;
        put(map.as_ref(), "r1", CommitType::Attach, json!({"k": "v3"}), 4, 3).await;

        let entries = reconstructor()
            .history(&ctx, &"c1".into(), map.as_ref(), &"r1".into())
            .await
            .unwrap();

        let revisions: Vec<_> = entries.iter().map(|e| e.revision).collect();
        assert_eq!(revisions, vec![4, 3, 1]);
        assert_eq!(entries[0].audit.payload, json!({"k": "v3"}));
        assert_eq!(entries[2].audit.payload, json!({"k": "v"}));
        assert_eq!(entries[0].audit.event_type, CommitType::Attach);
    }

    #[tokio::test]
    async fn test_history_of_missing_resource() {
        let map = channel_map().await;
        let ctx = RequestContext::new("test");

        let err = reconstructor()
            .history(&ctx, &"c1".into(), map.as_ref(), &"r1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_broken_chain_is_internal() {
        let map = channel_map().await;
        let ctx = RequestContext::new("test");

        put(map.as_ref(), "r2", CommitType::Create, json!({}), 1, 0).await;
        // Points at revision 1, where r1 has no version.
        put(map.as_ref(), "r1", CommitType::Update, json!({}), 2, 1).await;

        let err = reconstructor()
            .history(&ctx, &"c1".into(), map.as_ref(), &"r1".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Internal(InternalError::BrokenChain { revision: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_forward_pointing_chain_is_rejected() {
        let map = channel_map().await;
        let ctx = RequestContext::new("test");

        let mut record = Record {
            audit: revmap_core::AuditDefinition::now(
                "c1".into(),
                "r1".into(),
                CommitType::Update,
                json!({}),
            ),
            revision: 1,
            previous_revision: 1,
        };
        put_raw(map.as_ref(), &record).await;
        record.revision = 2;
        record.previous_revision = 5;
        put_raw(map.as_ref(), &record).await;

        let err = reconstructor()
            .history(&ctx, &"c1".into(), map.as_ref(), &"r1".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Internal(InternalError::CorruptChain {
                revision: 2,
                previous_revision: 5,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_pointer_past_a_version_is_rejected() {
        let map = channel_map().await;
        let ctx = RequestContext::new("test");

        put(map.as_ref(), "r1", CommitType::Create, json!({"k": "v"}), 1, 0).await;
        put(map.as_ref(), "r2", CommitType::Create, json!({}), 2, 0).await;
        // Revision 2 belongs to r2; reading r1 there yields its revision 1.
        put(map.as_ref(), "r1", CommitType::Update, json!({"k": "v2"}), 3, 2).await;

        let err = reconstructor()
            .history(&ctx, &"c1".into(), map.as_ref(), &"r1".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Internal(InternalError::CorruptChain {
                revision: 3,
                previous_revision: 2,
                ..
            })
        ));
    }
}
