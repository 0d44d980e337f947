//! Versioned record reads and writes against a channel map.
//!
//! Every version of a resource lives at the same leaf index,
//! `SHA-256(resource_id)`. Older versions are reached by reading that index
//! at an earlier map revision, so the previous-revision pointer stored in
//! each [`Record`] is enough to walk the whole chain.

use async_trait::async_trait;
use revmap_core::{AuditDefinition, ChannelId, CommitType, Record, ResourceId, Revision};
use revmap_map::{MapError, MapLeaf, VerifiableMapClient};
use revmap_telemetry::RequestContext;
use tracing::debug;

use crate::error::{InternalError, LedgerError, LedgerResult};

/// The contents of one version to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWrite {
    /// Channel that owns the map.
    pub channel_id: ChannelId,
    /// Resource being versioned.
    pub resource_id: ResourceId,
    /// Commit type recorded as the event type.
    pub commit_type: CommitType,
    /// Caller-supplied document.
    pub payload: serde_json::Value,
    /// Map revision the write must produce.
    pub revision: Revision,
    /// Revision of the superseded version, 0 for a first version.
    pub previous_revision: Revision,
}

/// Reads and writes record versions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stamp, encode and write one version at `write.revision`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] on encoding failure or if the conditional
    /// write is rejected.
    async fn put(
        &self,
        ctx: &RequestContext,
        map: &dyn VerifiableMapClient,
        write: RecordWrite,
    ) -> LedgerResult<Record>;

    /// Read the version visible at `revision`, or the latest when
    /// `revision <= 0`. `None` when the resource had no version then.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] on read, verification or decoding failure.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        map: &dyn VerifiableMapClient,
        resource_id: &ResourceId,
        revision: Revision,
    ) -> LedgerResult<Option<Record>>;
}

/// [`RecordStore`] that stores each version as a JSON leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapRecordStore;

impl MapRecordStore {
    /// Create a store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordStore for MapRecordStore {
    async fn put(
        &self,
        ctx: &RequestContext,
        map: &dyn VerifiableMapClient,
        write: RecordWrite,
    ) -> LedgerResult<Record> {
        let index = write.resource_id.leaf_index();
        let record = Record {
            audit: AuditDefinition::now(
                write.channel_id,
                write.resource_id,
                write.commit_type,
                write.payload,
            ),
            revision: write.revision,
            previous_revision: write.previous_revision,
        };
        let value = record.to_leaf_value().map_err(LedgerError::serialization)?;

        map.add(ctx, vec![MapLeaf::new(index, value)], record.revision)
            .await?;

        debug!(
            map_id = %map.map_id(),
            resource_id = %record.audit.resource_id,
            revision = record.revision,
            previous_revision = record.previous_revision,
            "Record version written"
        );
        Ok(record)
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        map: &dyn VerifiableMapClient,
        resource_id: &ResourceId,
        revision: Revision,
    ) -> LedgerResult<Option<Record>> {
        let index = resource_id.leaf_index();
        let leaves = if revision <= 0 {
            map.get(ctx, &[index]).await
        } else {
            map.get_by_revision(ctx, &[index], revision).await
        };

        let leaves = match leaves {
            Ok(leaves) => leaves,
            // A revision the map has not reached yet holds nothing.
            Err(MapError::RevisionOutOfRange { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(value) = leaves.value_of(&index) else {
            return Ok(None);
        };

        let record = Record::from_leaf_value(value).map_err(LedgerError::serialization)?;
        if record.audit.resource_id != *resource_id {
            return Err(InternalError::Serialization(format!(
                "leaf for resource {resource_id} holds resource {}",
                record.audit.resource_id
            ))
            .into());
        }
        Ok(Some(record))
    }
}
