//! Caches a sub-cursor's results (with their tag witnesses) on first
//! exhaustion, turning repeated `contains` probes into set lookups.

use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;
use rustc_hash::FxHashMap;

struct Entry {
    result: Ref,
    /// One tag map per witness of this result.
    paths: Vec<TagMap>,
}

pub struct Materialize {
    sub: Box<dyn Cursor>,
    threshold: i64,
    cache: Option<Vec<Entry>>,
    lookup: FxHashMap<Ref, usize>,
    /// The cache grew past the threshold; fall through to the sub-cursor.
    aborted: bool,
    pos: usize,
    path_pos: usize,
    started: bool,
    err: Option<QueryError>,
}

impl Materialize {
    /// Sub-cursors no larger than this get cached by the optimizer.
    pub const DEFAULT_THRESHOLD: i64 = 100;

    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self::with_threshold(sub, Self::DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(sub: Box<dyn Cursor>, threshold: i64) -> Self {
        Self {
            sub,
            threshold,
            cache: None,
            lookup: FxHashMap::default(),
            aborted: false,
            pos: 0,
            path_pos: 0,
            started: false,
            err: None,
        }
    }

    fn materialize(&mut self, ctx: &Cancellation) {
        if self.cache.is_some() || self.aborted || self.err.is_some() {
            return;
        }
        let mut cache = Vec::new();
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return;
            }
            let Some(result) = self.sub.result() else {
                continue;
            };
            let mut paths = Vec::new();
            loop {
                let mut tags = TagMap::default();
                self.sub.tag_results(&mut tags);
                paths.push(tags);
                if !self.sub.next_path(ctx) {
                    break;
                }
            }
            if !self.lookup.contains_key(&result) {
                self.lookup.insert(result.clone(), cache.len());
            }
            cache.push(Entry { result, paths });
            if cache.len() as i64 > self.threshold {
                // Too big to hold; keep scanning the sub directly
                self.aborted = true;
                self.lookup.clear();
                self.sub.reset();
                return;
            }
        }
        if let Some(err) = self.sub.err() {
            self.err = Some(err);
            return;
        }
        self.cache = Some(cache);
    }
}

impl Cursor for Materialize {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.materialize(ctx);
        if self.aborted {
            return self.sub.next(ctx);
        }
        let Some(cache) = &self.cache else {
            return false;
        };
        let next = if self.started { self.pos + 1 } else { 0 };
        if next < cache.len() {
            self.pos = next;
            self.path_pos = 0;
            self.started = true;
            true
        } else {
            self.pos = cache.len();
            false
        }
    }

    fn result(&self) -> Option<Ref> {
        if self.aborted {
            return self.sub.result();
        }
        self.cache
            .as_ref()
            .and_then(|cache| cache.get(self.pos))
            .map(|entry| entry.result.clone())
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.aborted {
            return self.sub.next_path(ctx);
        }
        let Some(cache) = &self.cache else {
            return false;
        };
        if let Some(entry) = cache.get(self.pos) {
            if self.path_pos + 1 < entry.paths.len() {
                self.path_pos += 1;
                return true;
            }
        }
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.materialize(ctx);
        if self.aborted {
            return self.sub.contains(ctx, value);
        }
        if self.cache.is_none() {
            return false;
        }
        match self.lookup.get(value) {
            Some(&pos) => {
                self.pos = pos;
                self.path_pos = 0;
                self.started = true;
                true
            }
            None => false,
        }
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if self.aborted {
            return self.sub.tag_results(dst);
        }
        if let Some(entry) = self.cache.as_ref().and_then(|cache| cache.get(self.pos)) {
            if let Some(tags) = entry.paths.get(self.path_pos) {
                for (name, value) in tags {
                    dst.insert(name.clone(), value.clone());
                }
            }
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone().or_else(|| self.sub.err())
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            contains_cost: 1,
            next_cost: 1,
            size: Size {
                value: sub.size.value,
                exact: sub.size.exact,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        (self, false)
    }

    fn reset(&mut self) {
        if self.aborted {
            self.sub.reset();
        }
        self.pos = 0;
        self.path_pos = 0;
        self.started = false;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
        self.cache = None;
        self.lookup.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::with_threshold(self.sub.clone_cursor(), self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::fixed::Fixed;
    use crate::model::Value;

    #[test]
    fn caches_and_resets() {
        let ctx = Cancellation::new();
        let refs: Vec<Ref> = ["a", "b"]
            .iter()
            .map(|n| Ref::prefetched(Value::from(*n)))
            .collect();
        let mut it = Materialize::new(Box::new(Fixed::new(refs.clone())));
        let mut out = Vec::new();
        while it.next(&ctx) {
            out.extend(it.result());
        }
        assert_eq!(refs, out);
        it.reset();
        assert!(it.contains(&ctx, &refs[1]));
        assert!(!it.contains(&ctx, &Ref::prefetched(Value::from("z"))));
    }
}
