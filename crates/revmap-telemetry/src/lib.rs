//! Revmap Telemetry - logging setup and request context.
//!
//! This crate provides:
//! - `tracing-subscriber` setup with pretty, compact, JSON and full formats
//! - A request context carrying correlation ids and an optional deadline
//!   through every map round trip
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use revmap_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), revmap_telemetry::TelemetryError> {
//! setup_logging(&LogConfig::new("info").with_format(LogFormat::Compact))?;
//!
//! let ctx = RequestContext::new("api")
//!     .with_operation("commit")
//!     .with_timeout(Duration::from_secs(5));
//!
//! let _guard = ctx.span().entered();
//! tracing::info!("committing record");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
