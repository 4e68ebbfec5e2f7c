//! Trivial stream adapters: limit, skip and unique.

use crate::iterate::fixed::Null;
use crate::iterate::{Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;
use rustc_hash::FxHashSet;

/// Stops after `limit` primary results; a non-positive limit means no
/// limit at all.
pub struct Limit {
    sub: Box<dyn Cursor>,
    limit: i64,
    count: i64,
}

impl Limit {
    pub fn new(sub: Box<dyn Cursor>, limit: i64) -> Self {
        Self {
            sub,
            limit,
            count: 0,
        }
    }
}

impl Cursor for Limit {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.limit > 0 && self.count >= self.limit {
            return false;
        }
        if self.sub.next(ctx) {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        self.sub.contains(ctx, value)
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<QueryError> {
        self.sub.err()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        let value = if self.limit > 0 {
            sub.size.value.min(self.limit)
        } else {
            sub.size.value
        };
        Stats {
            size: Size {
                value,
                exact: false,
            },
            ..sub
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        if self.limit <= 0 {
            return (sub, true);
        }
        (Box::new(Self::new(sub, self.limit)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.count = 0;
    }

    fn close(&mut self) {
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor(), self.limit))
    }
}

/// Discards the first `offset` primary results.
pub struct Skip {
    sub: Box<dyn Cursor>,
    offset: i64,
    skipped: i64,
}

impl Skip {
    pub fn new(sub: Box<dyn Cursor>, offset: i64) -> Self {
        Self {
            sub,
            offset,
            skipped: 0,
        }
    }
}

impl Cursor for Skip {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        while self.skipped < self.offset {
            if !self.sub.next(ctx) {
                return false;
            }
            self.skipped += 1;
        }
        self.sub.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        self.sub.contains(ctx, value)
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<QueryError> {
        self.sub.err()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            size: Size {
                value: (sub.size.value - self.offset).max(0),
                exact: false,
            },
            ..sub
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        if self.offset <= 0 {
            return (sub, true);
        }
        (Box::new(Self::new(sub, self.offset)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.skipped = 0;
    }

    fn close(&mut self) {
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor(), self.offset))
    }
}

/// Suppresses repeated primary results with a hash set.
pub struct Unique {
    sub: Box<dyn Cursor>,
    seen: FxHashSet<Ref>,
}

impl Unique {
    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self {
            sub,
            seen: FxHashSet::default(),
        }
    }
}

impl Cursor for Unique {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        while self.sub.next(ctx) {
            if let Some(result) = self.sub.result() {
                if self.seen.insert(result) {
                    return true;
                }
            }
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        self.sub.contains(ctx, value)
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<QueryError> {
        self.sub.err()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            size: Size {
                value: sub.size.value,
                exact: false,
            },
            ..sub
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        (Box::new(Self::new(sub)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen.clear();
    }

    fn close(&mut self) {
        self.sub.close();
        self.seen.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::fixed::Fixed;
    use crate::model::Value;

    fn refs(names: &[&str]) -> Vec<Ref> {
        names
            .iter()
            .map(|n| Ref::prefetched(Value::from(*n)))
            .collect()
    }

    fn drain(cursor: &mut dyn Cursor) -> Vec<Ref> {
        let ctx = Cancellation::new();
        let mut out = Vec::new();
        while cursor.next(&ctx) {
            out.extend(cursor.result());
        }
        out
    }

    #[test]
    fn limit_and_skip_page() {
        let mut limited = Limit::new(Box::new(Fixed::new(refs(&["a", "b", "c"]))), 2);
        assert_eq!(refs(&["a", "b"]), drain(&mut limited));
        let mut skipped = Skip::new(Box::new(Fixed::new(refs(&["a", "b", "c"]))), 2);
        assert_eq!(refs(&["c"]), drain(&mut skipped));
    }

    #[test]
    fn unique_is_idempotent() {
        let dup = refs(&["a", "b", "a", "c", "b"]);
        let mut once = Unique::new(Box::new(Fixed::new(dup.clone())));
        assert_eq!(refs(&["a", "b", "c"]), drain(&mut once));
        let mut twice = Unique::new(Box::new(Unique::new(Box::new(Fixed::new(dup)))));
        assert_eq!(refs(&["a", "b", "c"]), drain(&mut twice));
    }
}
