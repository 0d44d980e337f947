//! Test fixtures for common types.

use std::sync::Arc;

use revmap_map::{DEFAULT_CALL_TIMEOUT, MapAdmin, MapBackend, MemoryMapEngine};
use revmap_telemetry::RequestContext;
use serde_json::{Value, json};

use crate::faulty::FaultyBackend;

/// Create a request context for tests.
#[must_use]
pub fn test_context() -> RequestContext {
    RequestContext::new("test")
}

/// Create an empty in-memory engine with a fresh signing key.
#[must_use]
pub fn memory_engine() -> Arc<MemoryMapEngine> {
    Arc::new(MemoryMapEngine::new())
}

/// Create a fault-injecting wrapper around a fresh in-memory engine.
#[must_use]
pub fn faulty_engine() -> Arc<FaultyBackend> {
    Arc::new(FaultyBackend::new(memory_engine()))
}

/// Create an admin handle with the default per-call timeout.
#[must_use]
pub fn test_admin(backend: Arc<dyn MapBackend>) -> MapAdmin {
    MapAdmin::new(backend, DEFAULT_CALL_TIMEOUT)
}

/// A small flat payload.
#[must_use]
pub fn sample_payload() -> Value {
    json!({"k": "v"})
}

/// A payload with no fields.
#[must_use]
pub fn empty_payload() -> Value {
    json!({})
}

/// A payload nested `depth` objects deep, with mixed value types at each level.
#[must_use]
pub fn nested_payload(depth: usize) -> Value {
    let mut value = json!({"leaf": true, "n": 0, "s": "", "list": [1, "two", null]});
    for level in 0..depth {
        value = json!({
            "level": level,
            "tags": ["a", "b"],
            "child": value,
        });
    }
    value
}
