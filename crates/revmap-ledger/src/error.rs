//! Ledger error taxonomy.
//!
//! Callers see five kinds of failure. Everything that goes wrong inside the
//! map or in local encoding collapses into [`LedgerError::Internal`], which
//! still carries the underlying cause for logs.

use revmap_core::{ChannelId, MapId, ResourceId, Revision};
use revmap_map::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Cause of an [`LedgerError::Internal`] failure.
#[derive(Debug, Error)]
pub enum InternalError {
    /// The map engine or client failed.
    #[error(transparent)]
    Map(#[from] MapError),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A previous-revision pointer led to a revision holding no version.
    #[error("broken revision chain for {resource_id}: nothing stored at revision {revision}")]
    BrokenChain {
        /// Resource whose chain broke.
        resource_id: ResourceId,
        /// Revision the chain pointed at.
        revision: Revision,
    },

    /// A previous-revision pointer did not point strictly backwards.
    #[error("corrupt revision chain for {resource_id}: {revision} points to {previous_revision}")]
    CorruptChain {
        /// Resource whose chain is corrupt.
        resource_id: ResourceId,
        /// Revision of the offending version.
        revision: Revision,
        /// Pointer it carries.
        previous_revision: Revision,
    },

    /// The next revision number does not fit in a revision.
    #[error("revision counter exhausted on map {0}")]
    RevisionOverflow(MapId),
}

/// Errors returned by the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No channel is registered under this id.
    #[error("No Such Channel: {0}")]
    ChannelNotFound(ChannelId),

    /// The resource has no version (or none at the requested revision).
    #[error("No Such Resource: {resource_id} in channel {channel_id}")]
    ResourceNotFound {
        /// Channel searched.
        channel_id: ChannelId,
        /// Resource requested.
        resource_id: ResourceId,
    },

    /// A creating commit named a resource that already has a version.
    #[error("Resource Already Exists: {resource_id} in channel {channel_id}")]
    ResourceExists {
        /// Channel written to.
        channel_id: ChannelId,
        /// Resource that already exists.
        resource_id: ResourceId,
    },

    /// The commit type is not one of the recognised values.
    #[error("Invalid Commit Type: {0:?}")]
    InvalidCommitType(String),

    /// Map, verification or encoding failure.
    #[error("Internal Error: {0}")]
    Internal(#[from] InternalError),
}

impl From<MapError> for LedgerError {
    fn from(e: MapError) -> Self {
        Self::Internal(InternalError::Map(e))
    }
}

/// The user-visible kind of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`LedgerError::ChannelNotFound`].
    ChannelNotFound,
    /// See [`LedgerError::ResourceNotFound`].
    ResourceNotFound,
    /// See [`LedgerError::ResourceExists`].
    ResourceExists,
    /// See [`LedgerError::InvalidCommitType`].
    InvalidCommitType,
    /// See [`LedgerError::Internal`].
    Internal,
}

impl ErrorKind {
    /// Stable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChannelNotFound => "channel_not_found",
            Self::ResourceNotFound => "resource_not_found",
            Self::ResourceExists => "resource_exists",
            Self::InvalidCommitType => "invalid_commit_type",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller may usefully do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// Retry as a different operation (e.g. create instead of update).
    DifferentOperation,
    /// Retry only with a different commit type.
    ChangeCommitType,
    /// The same request may succeed if repeated.
    SameOperation,
    /// Never retry the request unmodified.
    Never,
}

impl LedgerError {
    /// The user-visible kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChannelNotFound(_) => ErrorKind::ChannelNotFound,
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::ResourceExists { .. } => ErrorKind::ResourceExists,
            Self::InvalidCommitType(_) => ErrorKind::InvalidCommitType,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// How a caller may retry after this error.
    #[must_use]
    pub fn retry_class(&self) -> RetryClass {
        match self.kind() {
            ErrorKind::ChannelNotFound | ErrorKind::ResourceNotFound => {
                RetryClass::DifferentOperation
            },
            ErrorKind::ResourceExists => RetryClass::ChangeCommitType,
            ErrorKind::Internal => RetryClass::SameOperation,
            ErrorKind::InvalidCommitType => RetryClass::Never,
        }
    }

    /// Whether this error is a conditional write lost to a concurrent writer.
    #[must_use]
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::Internal(InternalError::Map(e)) if e.is_revision_conflict())
    }

    pub(crate) fn serialization(e: impl fmt::Display) -> Self {
        Self::Internal(InternalError::Serialization(e.to_string()))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
