//! Fault-injecting map backend.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use revmap_core::{MapId, Revision};
use revmap_crypto::{Hash256, Signature};
use revmap_map::{
    LeafCommitment, MapBackend, MapDescriptor, MapError, MapLeaf, MapLeafInclusion, MapLeaves,
    MapResult, MapSpec, SignedMapRoot,
};

/// Value substituted into leaves by the tampering and forging modes.
pub const TAMPERED_VALUE: &[u8] = b"{\"tampered\":true}";

/// Index written by injected interloper writes.
pub const INTERLOPER_INDEX_SEED: &[u8] = b"revmap-test:interloper";

/// Snapshot of how often each backend operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `create_map` calls.
    pub creates: u64,
    /// `init_map` calls.
    pub inits: u64,
    /// `get_map_metadata` calls.
    pub metadata: u64,
    /// `write_leaves` calls, injected failures included.
    pub writes: u64,
    /// `get_leaves` and `get_leaves_by_revision` calls.
    pub reads: u64,
    /// `get_signed_map_root` calls.
    pub roots: u64,
}

#[derive(Debug, Default)]
struct Counters {
    creates: AtomicU64,
    inits: AtomicU64,
    metadata: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    roots: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Take one unit from `counter` if it is non-zero.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A [`MapBackend`] wrapper that fails, tampers, races or stalls on demand.
///
/// All switches can be flipped while the backend is shared.
pub struct FaultyBackend {
    inner: Arc<dyn MapBackend>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_metadata: AtomicBool,
    fail_creates: AtomicBool,
    tamper_roots: AtomicBool,
    tamper_leaves: AtomicBool,
    forge_leaves: AtomicBool,
    pending_conflicts: AtomicU32,
    pending_interlopers: AtomicU32,
    latency: Mutex<Duration>,
    counters: Counters,
}

impl FaultyBackend {
    /// Wrap `inner` with every fault switched off.
    #[must_use]
    pub fn new(inner: Arc<dyn MapBackend>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_metadata: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            tamper_roots: AtomicBool::new(false),
            tamper_leaves: AtomicBool::new(false),
            forge_leaves: AtomicBool::new(false),
            pending_conflicts: AtomicU32::new(0),
            pending_interlopers: AtomicU32::new(0),
            latency: Mutex::new(Duration::ZERO),
            counters: Counters::default(),
        }
    }

    /// Fail every leaf and root read with a transport error.
    pub fn set_fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Fail every write with a transport error.
    pub fn set_fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Fail every metadata lookup with a transport error.
    pub fn set_fail_metadata(&self, on: bool) {
        self.fail_metadata.store(on, Ordering::SeqCst);
    }

    /// Fail every map allocation with a transport error.
    pub fn set_fail_creates(&self, on: bool) {
        self.fail_creates.store(on, Ordering::SeqCst);
    }

    /// Corrupt the signature of every root handed out.
    pub fn set_tamper_roots(&self, on: bool) {
        self.tamper_roots.store(on, Ordering::SeqCst);
    }

    /// Replace every non-empty leaf value read with different bytes,
    /// leaving its digest untouched.
    pub fn set_tamper_leaves(&self, on: bool) {
        self.tamper_leaves.store(on, Ordering::SeqCst);
    }

    /// Replace every non-empty leaf value read with different bytes and
    /// recompute its digest and witness entry to match.
    ///
    /// Only the signed root still commits to the real value.
    pub fn set_forge_leaves(&self, on: bool) {
        self.forge_leaves.store(on, Ordering::SeqCst);
    }

    /// Reject the next `n` writes with a revision conflict without writing.
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Before each of the next `n` writes, let another writer take the
    /// revision that write expects.
    pub fn inject_interlopers(&self, n: u32) {
        self.pending_interlopers.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// How often each operation has been called.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            creates: c.creates.load(Ordering::SeqCst),
            inits: c.inits.load(Ordering::SeqCst),
            metadata: c.metadata.load(Ordering::SeqCst),
            writes: c.writes.load(Ordering::SeqCst),
            reads: c.reads.load(Ordering::SeqCst),
            roots: c.roots.load(Ordering::SeqCst),
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn MapBackend> {
        &self.inner
    }

    async fn stall(&self) {
        let latency = self.latency.lock().map(|g| *g).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(flag: &AtomicBool, what: &str) -> MapResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(MapError::Transport(format!("injected {what} failure")));
        }
        Ok(())
    }

    fn tamper_root(&self, mut signed: SignedMapRoot) -> SignedMapRoot {
        if self.tamper_roots.load(Ordering::SeqCst) {
            let mut bytes = *signed.signature.as_bytes();
            bytes[0] ^= 0xff;
            signed.signature = Signature::from_bytes(bytes);
        }
        signed
    }

    fn tamper_read(&self, mut leaves: MapLeaves) -> MapLeaves {
        if self.tamper_leaves.load(Ordering::SeqCst) {
            for inclusion in &mut leaves.inclusions {
                if !inclusion.leaf.is_absent() {
                    inclusion.leaf.value = TAMPERED_VALUE.to_vec();
                }
            }
        }
        if self.forge_leaves.load(Ordering::SeqCst) {
            for inclusion in &mut leaves.inclusions {
                if inclusion.leaf.is_absent() {
                    continue;
                }
                let forged = MapLeafInclusion::for_leaf(MapLeaf::new(
                    inclusion.leaf.index,
                    TAMPERED_VALUE.to_vec(),
                ));
                for commitment in &mut leaves.witness.leaves {
                    if commitment.index == forged.leaf.index {
                        *commitment = LeafCommitment {
                            index: forged.leaf.index,
                            leaf_hash: forged.leaf_hash,
                        };
                    }
                }
                *inclusion = forged;
            }
        }
        leaves.signed_root = self.tamper_root(leaves.signed_root);
        leaves
    }
}

impl std::fmt::Debug for FaultyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyBackend")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MapBackend for FaultyBackend {
    async fn create_map(&self, spec: MapSpec) -> MapResult<MapDescriptor> {
        bump(&self.counters.creates);
        self.stall().await;
        Self::injected(&self.fail_creates, "create")?;
        self.inner.create_map(spec).await
    }

    async fn init_map(&self, map_id: MapId) -> MapResult<SignedMapRoot> {
        bump(&self.counters.inits);
        self.stall().await;
        Self::injected(&self.fail_creates, "init")?;
        let signed = self.inner.init_map(map_id).await?;
        Ok(self.tamper_root(signed))
    }

    async fn get_map_metadata(&self, map_id: MapId) -> MapResult<MapDescriptor> {
        bump(&self.counters.metadata);
        self.stall().await;
        Self::injected(&self.fail_metadata, "metadata")?;
        self.inner.get_map_metadata(map_id).await
    }

    async fn write_leaves(
        &self,
        map_id: MapId,
        leaves: Vec<MapLeaf>,
        expect_revision: Revision,
    ) -> MapResult<SignedMapRoot> {
        bump(&self.counters.writes);
        self.stall().await;
        Self::injected(&self.fail_writes, "write")?;

        if take_one(&self.pending_conflicts) {
            return Err(MapError::RevisionConflict {
                map_id,
                expected: expect_revision,
                current: expect_revision,
            });
        }

        if take_one(&self.pending_interlopers) {
            let leaf = MapLeaf::new(
                Hash256::hash(INTERLOPER_INDEX_SEED),
                expect_revision.to_string().into_bytes(),
            );
            self.inner
                .write_leaves(map_id, vec![leaf], expect_revision)
                .await?;
        }

        let signed = self
            .inner
            .write_leaves(map_id, leaves, expect_revision)
            .await?;
        Ok(self.tamper_root(signed))
    }

    async fn get_leaves(&self, map_id: MapId, indexes: &[Hash256]) -> MapResult<MapLeaves> {
        bump(&self.counters.reads);
        self.stall().await;
        Self::injected(&self.fail_reads, "read")?;
        let leaves = self.inner.get_leaves(map_id, indexes).await?;
        Ok(self.tamper_read(leaves))
    }

    async fn get_leaves_by_revision(
        &self,
        map_id: MapId,
        indexes: &[Hash256],
        revision: Revision,
    ) -> MapResult<MapLeaves> {
        bump(&self.counters.reads);
        self.stall().await;
        Self::injected(&self.fail_reads, "read")?;
        let leaves = self
            .inner
            .get_leaves_by_revision(map_id, indexes, revision)
            .await?;
        Ok(self.tamper_read(leaves))
    }

    async fn get_signed_map_root(&self, map_id: MapId) -> MapResult<SignedMapRoot> {
        bump(&self.counters.roots);
        self.stall().await;
        Self::injected(&self.fail_reads, "root")?;
        let signed = self.inner.get_signed_map_root(map_id).await?;
        Ok(self.tamper_root(signed))
    }
}
