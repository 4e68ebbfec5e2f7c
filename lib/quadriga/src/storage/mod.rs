//! Durable storage of quads over the bucketed key/value [`backend`].
//!
//! Four sorted indexes (SPO, OSP, POS, LPSO) map hash-concatenation keys to
//! delta histories, the node dictionary maps value hashes to reference
//! counted serialized values, the delta log is append-only and the metadata
//! bucket tracks `size`, `horizon` and `version`.

pub mod backend;
pub(crate) mod encoder;
mod error;
pub mod values;

use crate::model::{Direction, Quad, Value};
use crate::storage::backend::{Bucket, Db, Snapshot, WriteBatch};
pub use crate::storage::encoder::LogEntry;
use crate::storage::encoder::{
    decode_history, decode_log_entry, decode_meta, decode_node_record, encode_history,
    encode_log_entry, encode_meta, encode_node_record, history_is_live, log_key, QuadIndex,
};
pub use crate::storage::error::{CorruptionError, DeltaError, StorageError};
use crate::storage::values::{QuadHashes, ValueHash};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const META_SIZE: &[u8] = b"size";
const META_HORIZON: &[u8] = b"horizon";
const META_VERSION: &[u8] = b"version";

/// The data-format version written by this library.
pub const LATEST_VERSION: i64 = 1;

/// What a delta does to its quad.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DeltaAction {
    Add,
    Remove,
}

impl DeltaAction {
    /// The signed action code of the log record.
    pub fn code(self) -> i32 {
        match self {
            Self::Add => 1,
            Self::Remove => -1,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, StorageError> {
        match code {
            1 => Ok(Self::Add),
            -1 => Ok(Self::Remove),
            _ => Err(StorageError::InvalidAction(code)),
        }
    }
}

/// A single quad mutation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Delta {
    pub action: DeltaAction,
    pub quad: Quad,
}

impl Delta {
    pub fn add(quad: Quad) -> Self {
        Self {
            action: DeltaAction::Add,
            quad,
        }
    }

    pub fn remove(quad: Quad) -> Self {
        Self {
            action: DeltaAction::Remove,
            quad,
        }
    }
}

/// Options controlling how a batch treats recoverable parity violations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Adding an already-present quad is a no-op instead of an error.
    pub ignore_duplicate_add: bool,
    /// Removing an absent quad is a no-op instead of an error.
    pub ignore_missing_remove: bool,
}

/// Migration steps keyed by the version they migrate *from*; each step is
/// expected to leave the data readable by the next version.
#[derive(Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<i64, fn(&Db) -> Result<(), StorageError>>,
}

impl MigrationRegistry {
    pub fn register(&mut self, from_version: i64, step: fn(&Db) -> Result<(), StorageError>) {
        self.steps.insert(from_version, step);
    }
}

pub struct QuadStorage {
    db: Db,
    size: AtomicI64,
    horizon: AtomicU64,
    node_count: AtomicI64,
}

impl QuadStorage {
    /// Initializes empty storage at the latest data version.
    pub fn new() -> Self {
        let db = Db::new();
        let mut batch = db.write();
        batch.put(Bucket::Meta, META_SIZE, encode_meta(0));
        batch.put(Bucket::Meta, META_HORIZON, encode_meta(0));
        batch.put(Bucket::Meta, META_VERSION, encode_meta(LATEST_VERSION));
        batch.commit();
        Self {
            db,
            size: AtomicI64::new(0),
            horizon: AtomicU64::new(0),
            node_count: AtomicI64::new(0),
        }
    }

    /// Opens existing storage, checking the data version and running any
    /// registered migration for intermediate versions. A missing metadata
    /// bucket means "not initialized" and the storage is set up fresh.
    pub fn open(db: Db, migrations: &MigrationRegistry) -> Result<Self, StorageError> {
        let snapshot = db.snapshot();
        let Some(version) = snapshot.get(Bucket::Meta, META_VERSION) else {
            drop(snapshot);
            let mut batch = db.write();
            batch.put(Bucket::Meta, META_SIZE, encode_meta(0));
            batch.put(Bucket::Meta, META_HORIZON, encode_meta(0));
            batch.put(Bucket::Meta, META_VERSION, encode_meta(LATEST_VERSION));
            batch.commit();
            return Ok(Self {
                db,
                size: AtomicI64::new(0),
                horizon: AtomicU64::new(0),
                node_count: AtomicI64::new(0),
            });
        };
        let mut version = decode_meta(&version)?;
        if version > LATEST_VERSION {
            return Err(StorageError::VersionMismatch {
                found: version,
                supported: LATEST_VERSION,
            });
        }
        while version < LATEST_VERSION {
            let Some(step) = migrations.steps.get(&version) else {
                return Err(StorageError::VersionMismatch {
                    found: version,
                    supported: LATEST_VERSION,
                });
            };
            debug!(from = version, "migrating storage");
            step(&db)?;
            version += 1;
            let mut batch = db.write();
            batch.put(Bucket::Meta, META_VERSION, encode_meta(version));
            batch.commit();
        }
        let snapshot = db.snapshot();
        let size = snapshot
            .get(Bucket::Meta, META_SIZE)
            .map_or(Ok(0), |b| decode_meta(&b))?;
        let horizon = snapshot
            .get(Bucket::Meta, META_HORIZON)
            .map_or(Ok(0), |b| decode_meta(&b))?;
        let node_count = snapshot.count_prefix(Bucket::Node, &[]) as i64;
        Ok(Self {
            db,
            size: AtomicI64::new(size),
            horizon: AtomicU64::new(horizon.try_into().unwrap_or_default()),
            node_count: AtomicI64::new(node_count),
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn snapshot(&self) -> StorageReader {
        StorageReader {
            snapshot: self.db.snapshot(),
            size: self.size.load(Ordering::Acquire),
            horizon: self.horizon.load(Ordering::Acquire),
            node_count: self.node_count.load(Ordering::Acquire),
        }
    }

    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn horizon(&self) -> u64 {
        self.horizon.load(Ordering::Acquire)
    }

    pub fn node_count(&self) -> i64 {
        self.node_count.load(Ordering::Acquire)
    }

    /// Applies a batch of deltas atomically.
    ///
    /// Every delta is first written to the log, then checked against the
    /// history parity of its quad: additions require the quad absent,
    /// removals require it present. A violation fails the whole batch with
    /// the offending delta attached unless the matching [`ApplyOptions`]
    /// flag asks to skip it. Either the whole batch is published or nothing
    /// is, and the in-memory counters keep their pre-batch values on error.
    pub fn apply_deltas(&self, deltas: &[Delta], opts: ApplyOptions) -> Result<(), StorageError> {
        let mut batch = self.db.write();
        let base_horizon = self.horizon.load(Ordering::Acquire);
        let timestamp = unix_nanos();
        let mut id = base_horizon;
        let mut size_delta = 0i64;
        let mut adjustments: FxHashMap<ValueHash, (Value, i64)> = FxHashMap::default();

        for delta in deltas {
            id += 1;
            batch.put(
                Bucket::Log,
                log_key(id),
                encode_log_entry(&LogEntry {
                    id,
                    action: delta.action.code(),
                    timestamp,
                    quad: delta.quad.clone(),
                }),
            );

            let hashes = QuadHashes::new(&delta.quad);
            let spo_key = QuadIndex::Spo
                .key(&hashes)
                .ok_or_else(|| CorruptionError::msg("quad without SPO key"))?;
            let mut history = match batch.get(Bucket::Spo, &spo_key) {
                Some(bytes) => decode_history(&bytes)
                    .map_err(|e| DeltaError::new(delta.clone(), e.into()))?,
                None => Vec::new(),
            };
            let live = history.len() % 2 == 1;
            match delta.action {
                DeltaAction::Add if live => {
                    if opts.ignore_duplicate_add {
                        continue;
                    }
                    return Err(DeltaError::new(delta.clone(), StorageError::QuadExists));
                }
                DeltaAction::Remove if !live => {
                    if opts.ignore_missing_remove {
                        continue;
                    }
                    return Err(DeltaError::new(delta.clone(), StorageError::QuadNotExist));
                }
                DeltaAction::Add | DeltaAction::Remove => (),
            }
            history.push(id);
            let encoded_history = encode_history(&history);
            for index in QuadIndex::ALL {
                if let Some(key) = index.key(&hashes) {
                    batch.put(index.bucket(), key, encoded_history.clone());
                }
            }

            let direction_delta = match delta.action {
                DeltaAction::Add => 1,
                DeltaAction::Remove => -1,
            };
            size_delta += direction_delta;
            for dir in Direction::ALL {
                let Some(value) = delta.quad.get(dir) else {
                    continue;
                };
                let Some(hash) = hashes.get(dir) else {
                    continue;
                };
                adjustments
                    .entry(hash)
                    .or_insert_with(|| (value.clone(), 0))
                    .1 += direction_delta;
            }
        }

        let mut node_count_delta = 0i64;
        for (hash, (value, adjustment)) in adjustments {
            if adjustment == 0 {
                continue;
            }
            let key = hash.to_be_bytes();
            match batch.get(Bucket::Node, &key) {
                Some(record) => {
                    let (refcount, stored) = decode_node_record(&record)?;
                    let refcount = refcount + adjustment;
                    if refcount <= 0 {
                        batch.delete(Bucket::Node, key);
                        node_count_delta -= 1;
                    } else {
                        batch.put(Bucket::Node, key, encode_node_record(refcount, &stored));
                    }
                }
                None => {
                    // A negative adjustment on a missing entry clamps at zero
                    if adjustment > 0 {
                        batch.put(Bucket::Node, key, encode_node_record(adjustment, &value));
                        node_count_delta += 1;
                    }
                }
            }
        }

        let new_size = self.size.load(Ordering::Acquire) + size_delta;
        batch.put(Bucket::Meta, META_SIZE, encode_meta(new_size));
        batch.put(
            Bucket::Meta,
            META_HORIZON,
            encode_meta(i64::try_from(id).unwrap_or(i64::MAX)),
        );
        batch.commit();

        self.size.store(new_size, Ordering::Release);
        self.horizon.store(id, Ordering::Release);
        self.node_count.fetch_add(node_count_delta, Ordering::AcqRel);
        debug!(
            deltas = deltas.len(),
            horizon = id,
            size = new_size,
            "applied delta batch"
        );
        Ok(())
    }
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// A consistent read view over the storage.
#[derive(Clone)]
pub struct StorageReader {
    snapshot: Snapshot,
    size: i64,
    horizon: u64,
    node_count: i64,
}

impl StorageReader {
    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    pub fn node_count(&self) -> i64 {
        self.node_count
    }

    /// Whether the quad is currently present.
    pub fn quad_is_live(&self, hashes: &QuadHashes) -> Result<bool, StorageError> {
        let Some(key) = QuadIndex::Spo.key(hashes) else {
            return Ok(false);
        };
        Ok(self
            .snapshot
            .get(Bucket::Spo, &key)
            .is_some_and(|history| history_is_live(&history)))
    }

    /// The stored value for a hash, if interned.
    pub fn node_value(&self, hash: ValueHash) -> Result<Option<Value>, StorageError> {
        self.node_record(hash).map(|r| r.map(|(_, value)| value))
    }

    /// The reference count of a node, zero when absent.
    pub fn node_refcount(&self, hash: ValueHash) -> Result<i64, StorageError> {
        Ok(self.node_record(hash)?.map_or(0, |(refcount, _)| refcount))
    }

    fn node_record(&self, hash: ValueHash) -> Result<Option<(i64, Value)>, StorageError> {
        self.snapshot
            .get(Bucket::Node, &hash.to_be_bytes())
            .map(|record| decode_node_record(&record).map_err(StorageError::from))
            .transpose()
    }

    /// The first live quad entry of `index` under `prefix` after `after`.
    pub fn next_quad(
        &self,
        index: QuadIndex,
        prefix: &[u8],
        after: Option<&[u8]>,
    ) -> Result<Option<(Box<[u8]>, QuadHashes)>, StorageError> {
        let mut after = after.map(Box::<[u8]>::from);
        loop {
            let Some((key, history)) =
                self.snapshot.next_after(index.bucket(), prefix, after.as_deref())
            else {
                return Ok(None);
            };
            if history_is_live(&history) {
                let hashes = index.hashes_from_key(&key)?;
                return Ok(Some((key, hashes)));
            }
            after = Some(key);
        }
    }

    /// The first node dictionary entry after `after`.
    pub fn next_node(
        &self,
        after: Option<&[u8]>,
    ) -> Result<Option<(Box<[u8]>, ValueHash)>, StorageError> {
        let Some((key, _)) = self.snapshot.next_after(Bucket::Node, &[], after) else {
            return Ok(None);
        };
        let bytes: [u8; values::HASH_SIZE] = key
            .as_ref()
            .try_into()
            .map_err(|_| CorruptionError::msg("invalid node dictionary key"))?;
        Ok(Some((key, ValueHash::from_be_bytes(bytes))))
    }

    /// An upper-bound estimate of the quads matching `dir = hash`, from the
    /// node dictionary reference count.
    pub fn direction_size(&self, hash: ValueHash) -> i64 {
        self.node_refcount(hash).unwrap_or(0)
    }

    /// Decodes the whole delta log, in application order.
    pub fn log_entries(&self) -> Result<Vec<LogEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut after: Option<Box<[u8]>> = None;
        while let Some((key, record)) = self.snapshot.next_after(Bucket::Log, &[], after.as_deref())
        {
            entries.push(decode_log_entry(&record)?);
            after = Some(key);
        }
        Ok(entries)
    }

    /// Reconstructs the quad for a set of hashes from the node dictionary.
    pub fn quad_for_hashes(&self, hashes: &QuadHashes) -> Result<Option<Quad>, StorageError> {
        let Some(subject) = self.node_value(hashes.subject)? else {
            return Ok(None);
        };
        let Some(predicate) = self.node_value(hashes.predicate)? else {
            return Ok(None);
        };
        let Some(object) = self.node_value(hashes.object)? else {
            return Ok(None);
        };
        let label = match hashes.label {
            Some(label) => self.node_value(label)?,
            None => None,
        };
        Ok(Some(Quad {
            subject,
            predicate,
            object,
            label,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Iri;

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new(
            Iri::new_unchecked(format!("http://example.com/{s}")),
            Iri::new_unchecked(format!("http://example.com/{p}")),
            Iri::new_unchecked(format!("http://example.com/{o}")),
        )
    }

    #[test]
    fn version_mismatch_fails_open() {
        let storage = QuadStorage::new();
        let db = storage.db().clone();
        let mut batch = db.write();
        batch.put(Bucket::Meta, META_VERSION, encode_meta(LATEST_VERSION + 1));
        batch.commit();
        assert!(matches!(
            QuadStorage::open(db, &MigrationRegistry::default()),
            Err(StorageError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn missing_migration_step_fails_open() {
        let storage = QuadStorage::new();
        storage
            .apply_deltas(&[Delta::add(quad("a", "b", "c"))], ApplyOptions::default())
            .unwrap();
        let db = storage.db().clone();
        let mut batch = db.write();
        batch.put(Bucket::Meta, META_VERSION, encode_meta(LATEST_VERSION - 1));
        batch.commit();

        assert!(matches!(
            QuadStorage::open(db.clone(), &MigrationRegistry::default()),
            Err(StorageError::VersionMismatch { .. })
        ));

        let mut migrations = MigrationRegistry::default();
        migrations.register(LATEST_VERSION - 1, |_| Ok(()));
        let reopened = QuadStorage::open(db, &migrations).unwrap();
        assert_eq!(1, reopened.size());
        assert_eq!(3, reopened.node_count());
        assert_eq!(1, reopened.horizon());
    }

    #[test]
    fn parity_violations_fail_the_batch() {
        let storage = QuadStorage::new();
        let q = quad("a", "b", "c");
        storage
            .apply_deltas(&[Delta::add(q.clone())], ApplyOptions::default())
            .unwrap();
        let horizon = storage.horizon();

        let error = storage
            .apply_deltas(&[Delta::add(q.clone())], ApplyOptions::default())
            .unwrap_err();
        let StorageError::Delta(error) = error else {
            panic!("expected a delta error, got {error}");
        };
        assert!(matches!(error.source, StorageError::QuadExists));
        assert_eq!(q, error.delta.quad);
        // Nothing moved
        assert_eq!(horizon, storage.horizon());
        assert_eq!(1, storage.size());

        assert!(matches!(
            storage
                .apply_deltas(
                    &[Delta::remove(quad("x", "y", "z"))],
                    ApplyOptions::default()
                )
                .unwrap_err(),
            StorageError::Delta(_)
        ));

        // Ignoring turns both into no-ops
        storage
            .apply_deltas(
                &[Delta::add(q.clone()), Delta::remove(quad("x", "y", "z"))],
                ApplyOptions {
                    ignore_duplicate_add: true,
                    ignore_missing_remove: true,
                },
            )
            .unwrap();
        assert_eq!(1, storage.size());
    }

    #[test]
    fn add_remove_history_keeps_parity() {
        let storage = QuadStorage::new();
        let q = quad("a", "b", "c");
        storage
            .apply_deltas(&[Delta::add(q.clone())], ApplyOptions::default())
            .unwrap();
        storage
            .apply_deltas(&[Delta::remove(q.clone())], ApplyOptions::default())
            .unwrap();
        assert_eq!(0, storage.size());
        assert_eq!(2, storage.horizon());
        // History survives as an even-length tombstone sequence
        let hashes = QuadHashes::new(&q);
        let reader = storage.snapshot();
        assert!(!reader.quad_is_live(&hashes).unwrap());
        let key = QuadIndex::Spo.key(&hashes).unwrap();
        let history =
            decode_history(&storage.db().snapshot().get(Bucket::Spo, &key).unwrap()).unwrap();
        assert_eq!(vec![1, 2], history);
        // Nodes are dropped once their refcount hits zero
        assert_eq!(0, reader.node_count());
        // The log keeps both entries
        assert_eq!(2, reader.log_entries().unwrap().len());
    }

    #[test]
    fn refcounts_track_positions() {
        let storage = QuadStorage::new();
        // "likes" appears twice as predicate; "bob" as object and subject
        storage
            .apply_deltas(
                &[
                    Delta::add(quad("alice", "likes", "bob")),
                    Delta::add(quad("bob", "likes", "dan")),
                ],
                ApplyOptions::default(),
            )
            .unwrap();
        let reader = storage.snapshot();
        let hash_of = |name: &str| {
            ValueHash::new(&Value::Iri(Iri::new_unchecked(format!(
                "http://example.com/{name}"
            ))))
        };
        assert_eq!(2, reader.node_refcount(hash_of("likes")).unwrap());
        assert_eq!(2, reader.node_refcount(hash_of("bob")).unwrap());
        assert_eq!(1, reader.node_refcount(hash_of("alice")).unwrap());
        assert_eq!(0, reader.node_refcount(hash_of("nobody")).unwrap());
    }
}
