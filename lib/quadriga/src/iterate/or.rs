//! Union over sub-cursors, optionally de-duplicating.

use crate::iterate::fixed::Null;
use crate::iterate::sequence::Unique;
use crate::iterate::{
    check_cancelled, optimize_all, Cancellation, Cursor, QueryError, Size, Stats, TagMap,
};
use crate::storage::values::Ref;
use rustc_hash::FxHashSet;

pub struct Or {
    subs: Vec<Box<dyn Cursor>>,
    /// De-duplicate results across subs; without it the union is
    /// path-preserving and may repeat a ref with different tag bindings.
    strict: bool,
    current: usize,
    seen: FxHashSet<Ref>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Or {
    pub fn new(subs: Vec<Box<dyn Cursor>>, strict: bool) -> Self {
        Self {
            subs,
            strict,
            current: 0,
            seen: FxHashSet::default(),
            result: None,
            err: None,
        }
    }
}

impl Cursor for Or {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        while self.current < self.subs.len() {
            let sub = &mut self.subs[self.current];
            if sub.next(ctx) {
                let Some(result) = sub.result() else {
                    continue;
                };
                if self.strict && !self.seen.insert(result.clone()) {
                    continue;
                }
                self.result = Some(result);
                return true;
            }
            if let Some(err) = sub.err() {
                self.err = Some(err);
                return false;
            }
            self.current += 1;
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.strict || self.current >= self.subs.len() {
            return false;
        }
        self.subs[self.current].next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        for (i, sub) in self.subs.iter_mut().enumerate() {
            if sub.contains(ctx, value) {
                self.current = i;
                self.result = Some(value.clone());
                return true;
            }
        }
        if self.err.is_none() {
            self.err = self.subs.iter().find_map(|sub| sub.err());
        }
        false
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(sub) = self.subs.get(self.current) {
            sub.tag_results(dst);
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let mut contains_cost = 0;
        let mut next_cost = 0;
        let mut value = 0i64;
        let mut exact = true;
        for sub in &self.subs {
            let stats = sub.stats();
            contains_cost += stats.contains_cost;
            next_cost = next_cost.max(stats.next_cost);
            value = value.saturating_add(stats.size.value);
            exact &= stats.size.exact;
        }
        Stats {
            contains_cost,
            next_cost,
            size: Size {
                value,
                // Dedup may shrink the union below the sum
                exact: exact && !self.strict,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (subs, mut changed) = optimize_all(self.subs);
        let mut subs: Vec<_> = subs
            .into_iter()
            .filter(|sub| {
                let keep = !sub.is_null();
                changed |= !keep;
                keep
            })
            .collect();
        if subs.is_empty() {
            return (Box::new(Null::new()), true);
        }
        if subs.len() == 1 {
            let only = subs.pop().unwrap_or_else(|| Box::new(Null::new()));
            return if self.strict {
                (Box::new(Unique::new(only)), true)
            } else {
                (only, true)
            };
        }
        (Box::new(Self::new(subs, self.strict)), changed)
    }

    fn reset(&mut self) {
        for sub in &mut self.subs {
            sub.reset();
        }
        self.current = 0;
        self.seen.clear();
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        for sub in &mut self.subs {
            sub.close();
        }
        self.seen.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            self.subs.iter().map(|sub| sub.clone_cursor()).collect(),
            self.strict,
        ))
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

    #[test]
    fn strict_union_deduplicates() {
        let ctx = Cancellation::new();
        let mut or = Or::new(
            vec![
                Box::new(Fixed::new(refs(&["a", "b"]))),
                Box::new(Fixed::new(refs(&["b", "c"]))),
            ],
            true,
        );
        let mut out = Vec::new();
        while or.next(&ctx) {
            out.extend(or.result());
        }
        assert_eq!(refs(&["a", "b", "c"]), out);
    }

    #[test]
    fn loose_union_preserves_paths() {
        let ctx = Cancellation::new();
        let mut or = Or::new(
            vec![
                Box::new(Fixed::new(refs(&["a", "b"]))),
                Box::new(Fixed::new(refs(&["b"]))),
            ],
            false,
        );
        let mut count = 0;
        while or.next(&ctx) {
            count += 1;
        }
        assert_eq!(3, count);
    }
}
