//! Revmap Test - Shared test utilities.
//!
//! This crate provides a fault-injecting map backend, fixtures and a
//! provisioned-ledger harness for use as a dev-dependency.
//!
//! ```rust,ignore
//! use revmap_test::{FaultyBackend, TestLedger, memory_engine};
//!
//! #[tokio::test]
//! async fn test_reads_fail() {
//!     let backend = Arc::new(FaultyBackend::new(memory_engine()));
//!     let ledger = TestLedger::new(backend.clone()).await.unwrap();
//!     backend.set_fail_reads(true);
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod faulty;
pub mod fixtures;
pub mod harness;

pub use faulty::*;
pub use fixtures::*;
pub use harness::*;
