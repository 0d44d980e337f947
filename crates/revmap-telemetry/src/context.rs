//! Per-request context.
//!
//! Every call into a backing map is a network round trip. A context travels
//! with each call so the call can be logged under the caller's ids and
//! abandoned once the caller's deadline passes.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Ids, operation name and optional deadline of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique id of this request.
    pub request_id: Uuid,
    /// Id shared with the request this one was started on behalf of.
    pub correlation_id: Uuid,
    /// Component that created the context (`cli`, `api`, `test`).
    pub source: String,
    /// Ledger operation in progress, if known.
    pub operation: Option<String>,
    started: Instant,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A fresh context with no deadline.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            source: source.into(),
            operation: None,
            started: Instant::now(),
            deadline: None,
        }
    }

    /// Log this request under an existing correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Name the operation in progress.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Give up on the request `timeout` from now.
    ///
    /// A timeout too large to represent leaves the context without a deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Time left before the deadline: `None` without one, zero once passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// A span carrying the request ids, for `.instrument()` or `.entered()`.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            source = %self.source,
            operation = self.operation.as_deref(),
        )
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}
