//! Persisted documents: channels, audit envelopes and record versions.
//!
//! Both channels and records are stored as JSON leaf values. Field names are
//! part of the stored format and must not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commit::CommitType;
use crate::types::{ChannelId, MapId, ResourceId, Revision};

/// Registry entry binding a channel to its dedicated backing map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    /// Identifier of the map holding this channel's records.
    #[serde(rename = "mapID")]
    pub map_id: MapId,
}

impl Channel {
    /// Create a channel entry.
    #[must_use]
    pub fn new(channel_id: ChannelId, map_id: MapId) -> Self {
        Self { channel_id, map_id }
    }

    /// Serialize to the stored leaf value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_leaf_value(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a stored leaf value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid channel document.
    pub fn from_leaf_value(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Event envelope for one version of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDefinition {
    /// Channel the record belongs to.
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    /// Resource the record describes.
    #[serde(rename = "resourceID")]
    pub resource_id: ResourceId,
    /// Commit type that produced this version.
    #[serde(rename = "eventType")]
    pub event_type: CommitType,
    /// Opaque caller-supplied document.
    pub payload: serde_json::Value,
    /// When this version was built.
    pub timestamp: DateTime<Utc>,
}

impl AuditDefinition {
    /// Build an envelope stamped with the current time.
    #[must_use]
    pub fn now(
        channel_id: ChannelId,
        resource_id: ResourceId,
        event_type: CommitType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel_id,
            resource_id,
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// One immutable version of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The envelope, stored flattened alongside the revision fields.
    #[serde(flatten)]
    pub audit: AuditDefinition,
    /// Map revision at which this version was written.
    pub revision: Revision,
    /// Revision of the superseded version, or 0 for the first version.
    #[serde(rename = "previousRevision")]
    pub previous_revision: Revision,
}

impl Record {
    /// Whether this is the first version of its resource.
    #[must_use]
    pub fn is_first_version(&self) -> bool {
        self.previous_revision == 0
    }

    /// Serialize to the stored leaf value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_leaf_value(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a stored leaf value.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid record document.
    pub fn from_leaf_value(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// One element of an audit history: an envelope tagged with its revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Revision identifying this version.
    pub revision: Revision,
    /// The version's envelope.
    #[serde(flatten)]
    pub audit: AuditDefinition,
}

impl From<Record> for AuditEntry {
    fn from(record: Record) -> Self {
        Self {
            revision: record.revision,
            audit: record.audit,
        }
    }
}
