//! Revmap Core - domain types for the revmap versioned record store.
//!
//! This crate provides:
//! - Identifier newtypes for channels, resources and backing maps
//! - The commit type vocabulary
//! - The persisted record and channel documents
//! - Leaf index derivation for channel and resource identifiers
//! - Retry utilities with exponential backoff

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod commit;
pub mod error;
pub mod record;
pub mod retry;
pub mod types;

pub use commit::CommitType;
pub use error::{CoreError, CoreResult};
pub use record::{AuditDefinition, AuditEntry, Channel, Record};
pub use retry::{RetryConfig, RetryOutcome, retry};
pub use types::{ChannelId, MapId, ResourceId, Revision, leaf_index};
