//! Revmap Ledger - versioned, auditable records over verifiable maps.
//!
//! This crate provides:
//! - [`ChannelRegistry`]: channel id to dedicated map, stored in a master map
//! - [`RecordStore`]: record versions at `SHA-256(resource_id)`, read at any revision
//! - [`CommitCoordinator`]: the commit-type state machine with opt-in conflict retry
//! - [`AuditReconstructor`]: history by walking previous-revision pointers
//! - [`RecordService`]: the commit / retrieve / audit facade a transport wraps
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use revmap_ledger::{CommitRequest, RecordService, provision_master_map};
//! use revmap_map::{DEFAULT_CALL_TIMEOUT, MapAdmin, MemoryMapEngine};
//! use revmap_telemetry::RequestContext;
//!
//! # async fn example() -> Result<(), revmap_ledger::LedgerError> {
//! let admin = MapAdmin::new(Arc::new(MemoryMapEngine::new()), DEFAULT_CALL_TIMEOUT);
//! let ctx = RequestContext::new("example");
//! let master = provision_master_map(&admin, &ctx).await?;
//! let service = RecordService::connect(admin, &ctx, master).await?;
//!
//! let request = CommitRequest::new("c1", "r1", "CREATE", serde_json::json!({"k": "v"}));
//! let receipt = service.commit(&ctx, request).await?;
//! assert_eq!(receipt.revision, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod channel;
mod commit;
mod error;
mod history;
mod provision;
mod record;
mod service;

pub use channel::{ChannelRegistry, EnsuredChannel, MapChannelRegistry};
pub use commit::{CommitCoordinator, CommitReceipt, CommitRequest};
pub use error::{ErrorKind, InternalError, LedgerError, LedgerResult, RetryClass};
pub use history::AuditReconstructor;
pub use provision::{MASTER_MAP_NAME, provision_master_map};
pub use record::{MapRecordStore, RecordStore, RecordWrite};
pub use service::RecordService;
