//! The public façade over quad storage.
//!
//! The entry point of the module is the [`Store`] struct.
//!
//! Usage example:
//! ```
//! use quadriga::model::{Iri, Quad};
//! use quadriga::graph::QuadWriter;
//! use quadriga::store::Store;
//!
//! let store = Store::new();
//! let ex = Iri::new("http://example.com")?;
//! store.add_quad(Quad::new(ex.clone(), ex.clone(), ex.clone()))?;
//! assert_eq!(1, store.size());
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use crate::graph::{QuadStore, QuadWriter};
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::{Direction, Quad, Value};
use crate::storage::backend::Db;
use crate::storage::encoder::QuadIndex;
use crate::storage::values::{QuadHashes, Ref, ValueHash};
use crate::storage::{
    ApplyOptions, Delta, LogEntry, MigrationRegistry, QuadStorage, StorageError, StorageReader,
};
use std::sync::Arc;

/// A quad store handle. Cheap to clone; all clones share the same data.
///
/// Writes are serialized; readers obtain a [`StoreReader`] snapshot whose
/// view does not change for the duration of an iterator tree.
#[derive(Clone)]
pub struct Store {
    storage: Arc<QuadStorage>,
}

/// Node and quad counts, for quick inspection.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct StoreStats {
    pub nodes: i64,
    pub quads: i64,
}

impl Store {
    /// A fresh store at the latest data version.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(QuadStorage::new()),
        }
    }

    /// Opens a store over an existing backend, checking the data version
    /// and running the registered migrations for intermediate versions.
    pub fn open(db: Db, migrations: &MigrationRegistry) -> Result<Self, StorageError> {
        Ok(Self {
            storage: Arc::new(QuadStorage::open(db, migrations)?),
        })
    }

    /// The underlying backend handle, usable to reopen the same data.
    pub fn db(&self) -> Db {
        self.storage.db().clone()
    }

    /// A snapshot read view for the duration of an iterator tree.
    pub fn read(&self) -> StoreReader {
        StoreReader {
            reader: self.storage.snapshot(),
        }
    }

    /// Number of currently present quads.
    pub fn size(&self) -> i64 {
        self.storage.size()
    }

    /// The last delta identifier applied, monotone across batches.
    pub fn horizon(&self) -> u64 {
        self.storage.horizon()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.storage.node_count(),
            quads: self.storage.size(),
        }
    }

    /// Whether the quad is currently present.
    pub fn contains(&self, quad: &Quad) -> Result<bool, StorageError> {
        self.read().reader.quad_is_live(&QuadHashes::new(quad))
    }

    /// Decodes the append-only delta log, in application order.
    pub fn log_entries(&self) -> Result<Vec<LogEntry>, StorageError> {
        self.read().reader.log_entries()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadWriter for Store {
    fn add_quad(&self, quad: Quad) -> Result<(), StorageError> {
        self.apply_deltas(&[Delta::add(quad)], ApplyOptions::default())
    }

    fn remove_quad(&self, quad: Quad) -> Result<(), StorageError> {
        self.apply_deltas(&[Delta::remove(quad)], ApplyOptions::default())
    }

    fn apply_deltas(&self, deltas: &[Delta], opts: ApplyOptions) -> Result<(), StorageError> {
        self.storage.apply_deltas(deltas, opts)
    }
}

/// A read snapshot implementing the primitive-iterator interface.
#[derive(Clone)]
pub struct StoreReader {
    reader: StorageReader,
}

impl StoreReader {
    /// The node dictionary reference count of a value: the number of
    /// currently present quads it appears in, at any position.
    pub fn refcount(&self, value: &Value) -> Result<i64, StorageError> {
        self.reader.node_refcount(ValueHash::new(value))
    }

    /// The direction-chosen quad index cursor for a node hash.
    fn quad_scan(&self, index: QuadIndex, prefix: Vec<u8>, size: Size) -> QuadScan {
        QuadScan {
            reader: self.reader.clone(),
            index,
            prefix,
            size,
            last_key: None,
            result: None,
            err: None,
        }
    }
}

impl QuadStore for StoreReader {
    fn value_of(&self, value: &Value) -> Ref {
        Ref::prefetched(value.clone())
    }

    fn name_of(&self, r: &Ref) -> Result<Option<Value>, StorageError> {
        match r {
            Ref::PreFetched(_, value) => Ok(Some(value.clone())),
            Ref::Node(hash) => self.reader.node_value(*hash),
            Ref::Quad(_) => Ok(None),
        }
    }

    fn quad(&self, r: &Ref) -> Result<Option<Quad>, StorageError> {
        match r {
            Ref::Quad(hashes) => self.reader.quad_for_hashes(hashes),
            Ref::Node(_) | Ref::PreFetched(..) => Ok(None),
        }
    }

    fn quad_direction(&self, r: &Ref, dir: Direction) -> Option<Ref> {
        Some(Ref::Node(r.as_quad()?.get(dir)?))
    }

    fn quad_cursor(&self, dir: Direction, value: &Ref) -> Box<dyn Cursor> {
        let Some(hash) = value.node_hash() else {
            return Box::new(crate::iterate::fixed::Null::new());
        };
        let size = Size {
            value: self.reader.direction_size(hash),
            exact: false,
        };
        Box::new(self.quad_scan(
            QuadIndex::for_direction(dir),
            hash.to_be_bytes().to_vec(),
            size,
        ))
    }

    fn nodes_all(&self) -> Box<dyn Cursor> {
        Box::new(NodeScan {
            reader: self.reader.clone(),
            last_key: None,
            result: None,
            err: None,
        })
    }

    fn quads_all(&self) -> Box<dyn Cursor> {
        let size = Size {
            value: self.reader.size(),
            exact: true,
        };
        Box::new(self.quad_scan(QuadIndex::Spo, Vec::new(), size))
    }

    fn size(&self) -> i64 {
        self.reader.size()
    }

    fn node_count(&self) -> i64 {
        self.reader.node_count()
    }

    fn horizon(&self) -> u64 {
        self.reader.horizon()
    }
}

/// Scans the node dictionary, yielding every interned node hash.
struct NodeScan {
    reader: StorageReader,
    last_key: Option<Box<[u8]>>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Cursor for NodeScan {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        match self.reader.next_node(self.last_key.as_deref()) {
            Ok(Some((key, hash))) => {
                self.last_key = Some(key);
                self.result = Some(Ref::Node(hash));
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.err = Some(e.into());
                false
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let Some(hash) = value.node_hash() else {
            return false;
        };
        match self.reader.node_refcount(hash) {
            Ok(refcount) if refcount > 0 => {
                self.result = Some(value.clone());
                true
            }
            Ok(_) => false,
            Err(e) => {
                self.err = Some(e.into());
                false
            }
        }
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        Stats {
            contains_cost: 1,
            next_cost: 2,
            size: Size {
                value: self.reader.node_count(),
                exact: true,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        (self, false)
    }

    fn reset(&mut self) {
        self.last_key = None;
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {}

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self {
            reader: self.reader.clone(),
            last_key: None,
            result: None,
            err: None,
        })
    }
}

/// Scans one quad index under a key prefix, skipping non-live histories.
struct QuadScan {
    reader: StorageReader,
    index: QuadIndex,
    prefix: Vec<u8>,
    size: Size,
    last_key: Option<Box<[u8]>>,
    result: Option<QuadHashes>,
    err: Option<QueryError>,
}

impl QuadScan {
    fn prefix_hash(&self) -> Option<ValueHash> {
        let bytes: [u8; crate::storage::values::HASH_SIZE] =
            self.prefix.as_slice().try_into().ok()?;
        Some(ValueHash::from_be_bytes(bytes))
    }
}

impl Cursor for QuadScan {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        match self
            .reader
            .next_quad(self.index, &self.prefix, self.last_key.as_deref())
        {
            Ok(Some((key, hashes))) => {
                self.last_key = Some(key);
                self.result = Some(hashes);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.err = Some(e.into());
                false
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.map(Ref::Quad)
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let Some(hashes) = value.as_quad() else {
            return false;
        };
        // The quad must match the scanned prefix and be live
        if let Some(prefix_hash) = self.prefix_hash() {
            let dir = match self.index {
                QuadIndex::Spo => Direction::Subject,
                QuadIndex::Osp => Direction::Object,
                QuadIndex::Pos => Direction::Predicate,
                QuadIndex::Lpso => Direction::Label,
            };
            if hashes.get(dir) != Some(prefix_hash) {
                return false;
            }
        }
        match self.reader.quad_is_live(hashes) {
            Ok(true) => {
                self.result = Some(*hashes);
                true
            }
            Ok(false) => false,
            Err(e) => {
                self.err = Some(e.into());
                false
            }
        }
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        Stats {
            contains_cost: 2,
            next_cost: 2,
            size: self.size,
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        (self, false)
    }

    fn reset(&mut self) {
        self.last_key = None;
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {}

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self {
            reader: self.reader.clone(),
            index: self.index,
            prefix: self.prefix.clone(),
            size: self.size,
            last_key: None,
            result: None,
            err: None,
        })
    }
}
