//! Map error types.

use revmap_core::{MapId, Revision};
use thiserror::Error;

/// Errors raised by a map engine or by the client talking to it.
#[derive(Debug, Clone, Error)]
pub enum MapError {
    /// No map with this id exists.
    #[error("map {0} not found")]
    MapNotFound(MapId),

    /// The map exists but has not been initialised.
    #[error("map {0} is not initialised")]
    NotInitialized(MapId),

    /// The map was already initialised.
    #[error("map {0} is already initialised")]
    AlreadyInitialized(MapId),

    /// A conditional write named a revision other than `current + 1`.
    #[error("revision conflict on map {map_id}: expected write at {expected}, map is at {current}")]
    RevisionConflict {
        /// Map written to.
        map_id: MapId,
        /// Revision the writer expected to produce.
        expected: Revision,
        /// Revision the map was actually at.
        current: Revision,
    },

    /// A read named a revision the map does not have.
    #[error("revision {requested} out of range for map {map_id} (current {current})")]
    RevisionOutOfRange {
        /// Map read from.
        map_id: MapId,
        /// Requested revision.
        requested: Revision,
        /// Current revision of the map.
        current: Revision,
    },

    /// A root or leaf failed verification.
    #[error("verification failed: {0}")]
    Verification(String),

    /// The engine could not be reached or answered with garbage.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller's deadline or the per-call timeout elapsed.
    #[error("deadline exceeded during {operation} on map {map_id}")]
    DeadlineExceeded {
        /// Map being called.
        map_id: MapId,
        /// Operation that was cut short.
        operation: String,
    },

    /// Engine state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Engine state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl MapError {
    /// Whether this error means a conditional write lost to another writer.
    #[must_use]
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::RevisionConflict { .. })
    }
}

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;
