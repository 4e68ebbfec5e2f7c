//! A sorted, bucketed key/value backend with multi-version values.
//!
//! Each key is annotated with the versions at which its value changed,
//! allowing readers to keep iterating an old version while a write batch is
//! applied. A single write batch is allowed at a time; readers never block.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// The logical buckets of the on-disk layout: the four quad indexes, the
/// node dictionary, the delta log and the metadata bucket.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Bucket {
    Spo,
    Osp,
    Pos,
    Lpso,
    Node,
    Log,
    Meta,
}

impl Bucket {
    pub const ALL: [Self; 7] = [
        Self::Spo,
        Self::Osp,
        Self::Pos,
        Self::Lpso,
        Self::Node,
        Self::Log,
        Self::Meta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Spo => "spo",
            Self::Osp => "osp",
            Self::Pos => "pos",
            Self::Lpso => "lpso",
            Self::Node => "node",
            Self::Log => "log",
            Self::Meta => "meta",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Spo => 0,
            Self::Osp => 1,
            Self::Pos => 2,
            Self::Lpso => 3,
            Self::Node => 4,
            Self::Log => 5,
            Self::Meta => 6,
        }
    }
}

type Key = Box<[u8]>;
type Value = Box<[u8]>;

/// The value history of one key, ascending by version.
#[derive(Default)]
struct Versioned {
    entries: Vec<(u64, Option<Value>)>,
}

impl Versioned {
    fn at(&self, version: u64) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(v, _)| *v <= version)
            .and_then(|(_, value)| value.as_ref())
    }

    fn push(&mut self, version: u64, value: Option<Value>) {
        if let Some(last) = self.entries.last_mut() {
            if last.0 == version {
                last.1 = value;
                return;
            }
        }
        self.entries.push((version, value));
    }
}

struct Inner {
    buckets: [RwLock<BTreeMap<Key, Versioned>>; 7],
    version: AtomicU64,
    writer: Mutex<()>,
}

/// A handle on a bucketed key/value database.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Inner>,
}

impl Db {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: std::array::from_fn(|_| RwLock::new(BTreeMap::new())),
                version: AtomicU64::new(0),
                writer: Mutex::new(()),
            }),
        }
    }

    /// A read view pinned to the current version.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            db: self.clone(),
            version: self.inner.version.load(Ordering::Acquire),
        }
    }

    /// Starts the (single) write batch. Blocks until any other batch ends.
    #[allow(clippy::expect_used)]
    pub fn write(&self) -> WriteBatch<'_> {
        let guard = self.inner.writer.lock().expect("backend writer poisoned");
        WriteBatch {
            db: self,
            _guard: guard,
            base: self.inner.version.load(Ordering::Acquire),
            staged: FxHashMap::default(),
        }
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}

/// A consistent read view. Cheap to clone; all reads resolve against the
/// version the snapshot was taken at.
#[derive(Clone)]
pub struct Snapshot {
    db: Db,
    version: u64,
}

impl Snapshot {
    #[allow(clippy::expect_used)]
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Option<Value> {
        let map = self.db.inner.buckets[bucket.index()]
            .read()
            .expect("backend bucket poisoned");
        map.get(key).and_then(|v| v.at(self.version)).cloned()
    }

    /// The first live entry under `prefix` whose key is strictly greater
    /// than `after` (or the very first when `after` is absent). This is the
    /// stateless scan primitive cursors are built from: re-seeking by key
    /// keeps cursors borrow-free while the map keeps changing underneath.
    #[allow(clippy::expect_used)]
    pub fn next_after(
        &self,
        bucket: Bucket,
        prefix: &[u8],
        after: Option<&[u8]>,
    ) -> Option<(Key, Value)> {
        let map = self.db.inner.buckets[bucket.index()]
            .read()
            .expect("backend bucket poisoned");
        let lower: Bound<&[u8]> = match after {
            Some(after) => Bound::Excluded(after),
            None if prefix.is_empty() => Bound::Unbounded,
            None => Bound::Included(prefix),
        };
        for (key, versions) in map.range::<[u8], _>((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                return None;
            }
            if let Some(value) = versions.at(self.version) {
                return Some((key.clone(), value.clone()));
            }
        }
        None
    }

    /// Counts the live entries under `prefix`.
    #[allow(clippy::expect_used)]
    pub fn count_prefix(&self, bucket: Bucket, prefix: &[u8]) -> u64 {
        let map = self.db.inner.buckets[bucket.index()]
            .read()
            .expect("backend bucket poisoned");
        map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, versions)| versions.at(self.version).is_some())
            .count() as u64
    }
}

/// A pending write batch. Reads see the batch's own staged writes on top of
/// the version the batch started from. Dropping the batch without calling
/// [`WriteBatch::commit`] discards every staged write.
pub struct WriteBatch<'a> {
    db: &'a Db,
    _guard: MutexGuard<'a, ()>,
    base: u64,
    staged: FxHashMap<(Bucket, Key), Option<Value>>,
}

impl WriteBatch<'_> {
    #[allow(clippy::expect_used)]
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> Option<Value> {
        if let Some(staged) = self.staged.get(&(bucket, Key::from(key))) {
            return staged.clone();
        }
        let map = self.db.inner.buckets[bucket.index()]
            .read()
            .expect("backend bucket poisoned");
        map.get(key).and_then(|v| v.at(self.base)).cloned()
    }

    pub fn put(&mut self, bucket: Bucket, key: impl Into<Key>, value: impl Into<Value>) {
        self.staged
            .insert((bucket, key.into()), Some(value.into()));
    }

    pub fn delete(&mut self, bucket: Bucket, key: impl Into<Key>) {
        self.staged.insert((bucket, key.into()), None);
    }

    /// Atomically publishes the staged writes as the next version.
    #[allow(clippy::expect_used)]
    pub fn commit(self) {
        let next = self.base + 1;
        for ((bucket, key), value) in self.staged {
            let mut map = self.db.inner.buckets[bucket.index()]
                .write()
                .expect("backend bucket poisoned");
            map.entry(key).or_default().push(next, value);
        }
        self.db.inner.version.store(next, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_isolation() {
        let db = Db::new();
        let before = db.snapshot();

        let mut batch = db.write();
        batch.put(Bucket::Node, *b"a", *b"1");
        assert_eq!(Some(Box::from(*b"1")), batch.get(Bucket::Node, b"a"));
        batch.commit();

        assert_eq!(None, before.get(Bucket::Node, b"a"));
        assert_eq!(Some(Box::from(*b"1")), db.snapshot().get(Bucket::Node, b"a"));
    }

    #[test]
    fn rollback_on_drop() {
        let db = Db::new();
        let mut batch = db.write();
        batch.put(Bucket::Meta, *b"k", *b"v");
        drop(batch);
        assert_eq!(None, db.snapshot().get(Bucket::Meta, b"k"));
    }

    #[test]
    fn prefix_scan_is_sorted_and_versioned() {
        let db = Db::new();
        let mut batch = db.write();
        batch.put(Bucket::Spo, *b"ab", *b"1");
        batch.put(Bucket::Spo, *b"aa", *b"2");
        batch.put(Bucket::Spo, *b"b", *b"3");
        batch.commit();

        let snapshot = db.snapshot();
        let (first, _) = snapshot.next_after(Bucket::Spo, b"a", None).unwrap();
        assert_eq!(b"aa", &*first);
        let (second, _) = snapshot.next_after(Bucket::Spo, b"a", Some(&first)).unwrap();
        assert_eq!(b"ab", &*second);
        assert!(snapshot.next_after(Bucket::Spo, b"a", Some(&second)).is_none());
        assert_eq!(2, snapshot.count_prefix(Bucket::Spo, b"a"));

        let mut batch = db.write();
        batch.delete(Bucket::Spo, *b"aa");
        batch.commit();
        assert_eq!(1, db.snapshot().count_prefix(Bucket::Spo, b"a"));
        // The old snapshot still sees the deleted key
        assert_eq!(2, snapshot.count_prefix(Bucket::Spo, b"a"));
    }
}
