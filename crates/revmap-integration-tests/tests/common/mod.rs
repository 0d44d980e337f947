//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use revmap_core::{ChannelId, ResourceId};
use revmap_ledger::{CommitReceipt, CommitRequest, LedgerResult};
use revmap_map::MapBackend;
use revmap_test::{FaultyBackend, TestLedger, faulty_engine, memory_engine, test_context};
use serde_json::Value;

/// A ledger over a plain in-memory engine.
pub async fn ledger() -> TestLedger {
    TestLedger::new(memory_engine()).await.unwrap()
}

/// A ledger over a fault-injecting engine, with the fault switches.
pub async fn faulty_ledger() -> (Arc<FaultyBackend>, TestLedger) {
    let backend = faulty_engine();
    let ledger = TestLedger::new(Arc::clone(&backend) as Arc<dyn MapBackend>)
        .await
        .unwrap();
    (backend, ledger)
}

/// Commit through the ledger's service with a fresh context.
pub async fn commit(
    ledger: &TestLedger,
    channel: &str,
    resource: &str,
    commit_type: &str,
    payload: Value,
) -> LedgerResult<CommitReceipt> {
    ledger
        .service
        .commit(
            &test_context(),
            CommitRequest::new(channel, resource, commit_type, payload),
        )
        .await
}

/// Payloads of a resource's history, newest first.
pub async fn history_payloads(ledger: &TestLedger, channel: &str, resource: &str) -> Vec<Value> {
    ledger
        .service
        .audit(
            &test_context(),
            &ChannelId::new(channel),
            &ResourceId::new(resource),
        )
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.audit.payload)
        .collect()
}
