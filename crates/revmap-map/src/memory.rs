//! In-process verifiable map engine.
//!
//! Keeps every revision of every leaf in memory and signs each published
//! root with one Ed25519 key. State can optionally be persisted as a JSON
//! snapshot after every mutation, which is how the CLI keeps data between
//! runs.
//!
//! The root hash of a revision is the [`RootWitness::root_hash`] of its
//! present leaves. Reads hand out that witness so clients can check leaves
//! against the signed root.
//!
//! A persistent engine takes an exclusive lock on `<state>.lock` for every
//! mutation and reloads the snapshot under it, so engines in separate
//! processes sharing one state file still publish each revision once.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use rand::Rng;
use revmap_core::{MapId, Revision};
use revmap_crypto::{Hash256, KeyPair, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::MapBackend;
use crate::error::{MapError, MapResult};
use crate::types::{
    LeafCommitment, MapDescriptor, MapLeaf, MapLeafInclusion, MapLeaves, MapRoot, MapSpec,
    RootWitness, SignedMapRoot,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One stored value of a leaf, written at `revision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeafVersion {
    revision: Revision,
    #[serde(with = "crate::types::base64_bytes")]
    value: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MapState {
    descriptor: MapDescriptor,
    /// Versions per index, ascending by revision.
    leaves: BTreeMap<Hash256, Vec<LeafVersion>>,
    /// Signed root per revision; `roots[r]` describes revision `r`.
    roots: Vec<SignedMapRoot>,
}

impl MapState {
    fn current_revision(&self) -> MapResult<Revision> {
        i64::try_from(self.roots.len())
            .ok()
            .and_then(|len| len.checked_sub(1))
            .filter(|revision| *revision >= 0)
            .ok_or(MapError::NotInitialized(self.descriptor.map_id))
    }

    fn root_at(&self, revision: Revision) -> MapResult<&SignedMapRoot> {
        usize::try_from(revision)
            .ok()
            .and_then(|i| self.roots.get(i))
            .ok_or_else(|| {
                MapError::Storage(format!(
                    "map {} has no root for revision {revision}",
                    self.descriptor.map_id
                ))
            })
    }

    fn value_at(&self, index: &Hash256, revision: Revision) -> &[u8] {
        self.leaves
            .get(index)
            .and_then(|versions| versions.iter().rev().find(|v| v.revision <= revision))
            .map(|v| v.value.as_slice())
            .unwrap_or_default()
    }

    /// Present leaves at `revision`. `leaves` is a `BTreeMap`, so the
    /// witness comes out in index order.
    fn witness_at(&self, revision: Revision) -> RootWitness {
        let leaves = self
            .leaves
            .keys()
            .filter_map(|index| {
                let value = self.value_at(index, revision);
                (!value.is_empty()).then(|| LeafCommitment {
                    index: *index,
                    leaf_hash: MapLeaf::new(*index, value.to_vec()).leaf_hash(),
                })
            })
            .collect();
        RootWitness { leaves }
    }

    fn read_at(&self, indexes: &[Hash256], revision: Revision) -> MapResult<MapLeaves> {
        let inclusions = indexes
            .iter()
            .map(|index| {
                MapLeafInclusion::for_leaf(MapLeaf::new(
                    *index,
                    self.value_at(index, revision).to_vec(),
                ))
            })
            .collect();

        Ok(MapLeaves {
            inclusions,
            signed_root: self.root_at(revision)?.clone(),
            witness: self.witness_at(revision),
        })
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    maps: Vec<&'a MapState>,
}

#[derive(Deserialize)]
struct Snapshot {
    maps: Vec<MapState>,
}

/// Read the snapshot at `path`, refusing maps signed by another key.
fn load_snapshot(path: &Path, public_key: &PublicKey) -> MapResult<HashMap<MapId, MapState>> {
    let bytes = std::fs::read(path).map_err(|e| MapError::Storage(e.to_string()))?;
    let snapshot: Snapshot =
        serde_json::from_slice(&bytes).map_err(|e| MapError::Serialization(e.to_string()))?;

    let mut maps = HashMap::with_capacity(snapshot.maps.len());
    for state in snapshot.maps {
        if state.descriptor.public_key != *public_key {
            return Err(MapError::Storage(format!(
                "map {} in {} was signed by key {}, engine key is {}",
                state.descriptor.map_id,
                path.display(),
                state.descriptor.public_key.key_id_hex(),
                public_key.key_id_hex()
            )));
        }
        maps.insert(state.descriptor.map_id, state);
    }
    Ok(maps)
}

/// Exclusive advisory lock on the file next to a snapshot, released on drop.
struct SnapshotLock {
    file: File,
}

impl SnapshotLock {
    fn acquire(state_path: &Path) -> MapResult<Self> {
        let lock_path = state_path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MapError::Storage(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| MapError::Storage(format!("cannot open {}: {e}", lock_path.display())))?;
        file.lock_exclusive().map_err(|e| {
            MapError::Storage(format!("cannot lock {}: {e}", lock_path.display()))
        })?;
        Ok(Self { file })
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// In-process [`MapBackend`].
pub struct MemoryMapEngine {
    keypair: KeyPair,
    maps: RwLock<HashMap<MapId, MapState>>,
    state_path: Option<PathBuf>,
}

impl MemoryMapEngine {
    /// Create an empty, non-persistent engine with a fresh signing key.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keypair(KeyPair::generate())
    }

    /// Create an empty, non-persistent engine signing with `keypair`.
    #[must_use]
    pub fn with_keypair(keypair: KeyPair) -> Self {
        Self {
            keypair,
            maps: RwLock::new(HashMap::new()),
            state_path: None,
        }
    }

    /// Open a persistent engine, loading `state_path` if it exists.
    ///
    /// Every mutation rewrites the snapshot at `state_path`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the snapshot cannot be read or was
    /// signed by a different key, or [`MapError::Serialization`] if it is
    /// malformed.
    pub fn open(state_path: impl Into<PathBuf>, keypair: KeyPair) -> MapResult<Self> {
        let state_path = state_path.into();

        let maps = if state_path.exists() {
            let maps = load_snapshot(&state_path, &keypair.export_public_key())?;
            info!(path = %state_path.display(), maps = maps.len(), "Loaded map engine state");
            maps
        } else {
            HashMap::new()
        };

        Ok(Self {
            keypair,
            maps: RwLock::new(maps),
            state_path: Some(state_path),
        })
    }

    /// Key that signs every root published by this engine.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.keypair.export_public_key()
    }

    /// Number of maps allocated so far.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the state lock is poisoned.
    pub fn map_count(&self) -> MapResult<usize> {
        Ok(self.read_maps()?.len())
    }

    fn read_maps(&self) -> MapResult<RwLockReadGuard<'_, HashMap<MapId, MapState>>> {
        self.maps
            .read()
            .map_err(|e| MapError::Storage(e.to_string()))
    }

    fn write_maps(&self) -> MapResult<RwLockWriteGuard<'_, HashMap<MapId, MapState>>> {
        self.maps
            .write()
            .map_err(|e| MapError::Storage(e.to_string()))
    }

    fn sign_root(&self, map_id: MapId, revision: Revision, root_hash: Hash256) -> SignedMapRoot {
        let map_root = MapRoot {
            map_id,
            revision,
            root_hash,
            timestamp_nanos: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        };
        let signature = self.keypair.sign(&map_root.signing_bytes());
        SignedMapRoot {
            map_root,
            signature,
        }
    }

    /// Apply one mutation.
    ///
    /// `stage` builds the next state of a single map from the current maps
    /// without touching them. The staged state is persisted first and only
    /// then replaces the live one, so a failed write leaves nothing behind.
    /// Persistent engines hold the snapshot lock throughout and stage against
    /// the snapshot as it is on disk.
    fn mutate<T>(
        &self,
        stage: impl FnOnce(&HashMap<MapId, MapState>) -> MapResult<(MapState, T)>,
    ) -> MapResult<T> {
        let mut maps = self.write_maps()?;
        let _lock = match &self.state_path {
            Some(path) => {
                let lock = SnapshotLock::acquire(path)?;
                if path.exists() {
                    *maps = load_snapshot(path, &self.keypair.export_public_key())?;
                }
                Some(lock)
            },
            None => None,
        };

        let (staged, output) = stage(&maps)?;
        self.persist(&maps, &staged)?;
        maps.insert(staged.descriptor.map_id, staged);
        Ok(output)
    }

    /// Write the snapshot with `staged` in place of its live counterpart.
    fn persist(&self, maps: &HashMap<MapId, MapState>, staged: &MapState) -> MapResult<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        let staged_id = staged.descriptor.map_id;
        let mut states: Vec<&MapState> = maps
            .values()
            .filter(|state| state.descriptor.map_id != staged_id)
            .chain(std::iter::once(staged))
            .collect();
        states.sort_by_key(|state| state.descriptor.map_id);
        let bytes = serde_json::to_vec_pretty(&SnapshotRef { maps: states })
            .map_err(|e| MapError::Serialization(e.to_string()))?;

        write_atomically(path, &bytes)
    }
}

impl Default for MemoryMapEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryMapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMapEngine")
            .field("key_id", &self.keypair.key_id_hex())
            .field("state_path", &self.state_path)
            .finish_non_exhaustive()
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> MapResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MapError::Storage(e.to_string()))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| MapError::Storage(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| MapError::Storage(e.to_string()))
}

#[async_trait]
impl MapBackend for MemoryMapEngine {
    async fn create_map(&self, spec: MapSpec) -> MapResult<MapDescriptor> {
        let descriptor = self.mutate(|maps| {
            let mut rng = rand::thread_rng();
            let map_id = loop {
                let candidate = MapId(rng.gen_range(1..=i64::MAX));
                if !maps.contains_key(&candidate) {
                    break candidate;
                }
            };

            let descriptor = MapDescriptor {
                map_id,
                display_name: spec.display_name,
                description: spec.description,
                public_key: self.keypair.export_public_key(),
                created_at: Utc::now(),
                initialized: false,
            };
            let state = MapState {
                descriptor: descriptor.clone(),
                leaves: BTreeMap::new(),
                roots: Vec::new(),
            };
            Ok((state, descriptor))
        })?;

        debug!(map_id = %descriptor.map_id, name = %descriptor.display_name, "Map created");
        Ok(descriptor)
    }

    async fn init_map(&self, map_id: MapId) -> MapResult<SignedMapRoot> {
        let root = self.mutate(|maps| {
            let state = maps.get(&map_id).ok_or(MapError::MapNotFound(map_id))?;
            if state.descriptor.initialized {
                return Err(MapError::AlreadyInitialized(map_id));
            }

            let root = self.sign_root(map_id, 0, RootWitness::default().root_hash());
            let mut staged = state.clone();
            staged.roots.push(root.clone());
            staged.descriptor.initialized = true;
            Ok((staged, root))
        })?;

        debug!(map_id = %map_id, "Map initialised at revision 0");
        Ok(root)
    }

    async fn get_map_metadata(&self, map_id: MapId) -> MapResult<MapDescriptor> {
        let maps = self.read_maps()?;
        maps.get(&map_id)
            .map(|state| state.descriptor.clone())
            .ok_or(MapError::MapNotFound(map_id))
    }

    async fn write_leaves(
        &self,
        map_id: MapId,
        leaves: Vec<MapLeaf>,
        expect_revision: Revision,
    ) -> MapResult<SignedMapRoot> {
        let root = self.mutate(|maps| {
            let state = maps.get(&map_id).ok_or(MapError::MapNotFound(map_id))?;

            let current = state.current_revision()?;
            if current.checked_add(1) != Some(expect_revision) {
                return Err(MapError::RevisionConflict {
                    map_id,
                    expected: expect_revision,
                    current,
                });
            }

            let mut staged = state.clone();
            for leaf in leaves {
                let versions = staged.leaves.entry(leaf.index).or_default();
                match versions.last_mut() {
                    Some(last) if last.revision == expect_revision => last.value = leaf.value,
                    _ => versions.push(LeafVersion {
                        revision: expect_revision,
                        value: leaf.value,
                    }),
                }
            }

            let root_hash = staged.witness_at(expect_revision).root_hash();
            let root = self.sign_root(map_id, expect_revision, root_hash);
            staged.roots.push(root.clone());
            Ok((staged, root))
        })?;

        debug!(map_id = %map_id, revision = expect_revision, "Revision published");
        Ok(root)
    }

    async fn get_leaves(&self, map_id: MapId, indexes: &[Hash256]) -> MapResult<MapLeaves> {
        let maps = self.read_maps()?;
        let state = maps.get(&map_id).ok_or(MapError::MapNotFound(map_id))?;
        state.read_at(indexes, state.current_revision()?)
    }

    async fn get_leaves_by_revision(
        &self,
        map_id: MapId,
        indexes: &[Hash256],
        revision: Revision,
    ) -> MapResult<MapLeaves> {
        let maps = self.read_maps()?;
        let state = maps.get(&map_id).ok_or(MapError::MapNotFound(map_id))?;

        let current = state.current_revision()?;
        if revision < 0 || revision > current {
            return Err(MapError::RevisionOutOfRange {
                map_id,
                requested: revision,
                current,
            });
        }
        state.read_at(indexes, revision)
    }

    async fn get_signed_map_root(&self, map_id: MapId) -> MapResult<SignedMapRoot> {
        let maps = self.read_maps()?;
        let state = maps.get(&map_id).ok_or(MapError::MapNotFound(map_id))?;
        state.root_at(state.current_revision()?).cloned()
    }
}
