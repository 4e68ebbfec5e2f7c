//! Intersection: one primary sub-cursor drives `next`, the others are
//! tested through `contains`.

use crate::iterate::fixed::Null;
use crate::iterate::materialize::Materialize;
use crate::iterate::save::Save;
use crate::iterate::{
    check_cancelled, optimize_all, Cancellation, Cursor, QueryError, Size, Stats, TagMap,
};
use crate::storage::values::Ref;

/// A secondary whose `contains` costs at least this much gets wrapped in a
/// [`Materialize`] when its cardinality is known small.
const EXPENSIVE_CONTAINS_COST: i64 = 16;

pub struct And {
    subs: Vec<Box<dyn Cursor>>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl And {
    /// The first sub is the primary until [`Cursor::optimize`] reorders.
    pub fn new(subs: Vec<Box<dyn Cursor>>) -> Self {
        Self {
            subs,
            result: None,
            err: None,
        }
    }

    fn adopt_sub_error(&mut self) {
        if self.err.is_none() {
            self.err = self.subs.iter().find_map(|sub| sub.err());
        }
    }
}

impl Cursor for And {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let Some((primary, secondaries)) = self.subs.split_first_mut() else {
            return false;
        };
        'primary: while primary.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(result) = primary.result() else {
                continue;
            };
            for sub in secondaries.iter_mut() {
                if !sub.contains(ctx, &result) {
                    continue 'primary;
                }
            }
            self.result = Some(result);
            return true;
        }
        self.adopt_sub_error();
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        for sub in &mut self.subs {
            if sub.next_path(ctx) {
                return true;
            }
        }
        self.adopt_sub_error();
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        for sub in &mut self.subs {
            if !sub.contains(ctx, value) {
                self.adopt_sub_error();
                return false;
            }
        }
        self.result = Some(value.clone());
        true
    }

    fn tag_results(&self, dst: &mut TagMap) {
        for sub in &self.subs {
            sub.tag_results(dst);
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let mut contains_cost = 0;
        let mut next_cost = 0;
        let mut size = Size {
            value: i64::MAX,
            exact: false,
        };
        for (i, sub) in self.subs.iter().enumerate() {
            let stats = sub.stats();
            contains_cost += stats.contains_cost;
            if i == 0 {
                next_cost += stats.next_cost;
            } else {
                next_cost += stats.contains_cost;
            }
            // Output is at most the smallest sub
            size.value = size.value.min(stats.size.value);
        }
        Stats {
            contains_cost,
            next_cost,
            size,
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (mut subs, mut changed) = optimize_all(self.subs);
        if subs.iter().any(|sub| sub.is_null()) {
            return (Box::new(Null::new()), true);
        }
        // Hoist tags out of the subs: the output value is the same on every
        // branch of an intersection, so tagging it outside is equivalent.
        let mut hoisted = Vec::new();
        for sub in &mut subs {
            hoisted.extend(sub.detach_tags());
        }
        if !hoisted.is_empty() {
            changed = true;
            let (collapsed, _) = optimize_all(subs);
            subs = collapsed;
        }
        if subs.len() == 1 {
            let only = subs.pop().unwrap_or_else(|| Box::new(Null::new()));
            let done: Box<dyn Cursor> = if hoisted.is_empty() {
                only
            } else {
                Box::new(Save::new(only, hoisted))
            };
            return (done, true);
        }
        // The cheapest sub to scan drives; the rest are probed, cheapest
        // probe first, with expensive small secondaries materialized.
        let primary_cost = |sub: &Box<dyn Cursor>| {
            let stats = sub.stats();
            stats.next_cost.saturating_mul(stats.size.value.max(1))
        };
        if let Some(best) = (1..subs.len()).min_by_key(|&i| primary_cost(&subs[i])) {
            if primary_cost(&subs[best]) < primary_cost(&subs[0]) {
                subs.swap(0, best);
                changed = true;
            }
        }
        subs[1..].sort_by_key(|sub| sub.stats().contains_cost);
        for sub in &mut subs[1..] {
            let stats = sub.stats();
            if stats.contains_cost >= EXPENSIVE_CONTAINS_COST
                && stats.size.value <= Materialize::DEFAULT_THRESHOLD
            {
                let inner = std::mem::replace(sub, Box::new(Null::new()));
                *sub = Box::new(Materialize::new(inner));
                changed = true;
            }
        }
        let cursor: Box<dyn Cursor> = if hoisted.is_empty() {
            Box::new(Self::new(subs))
        } else {
            Box::new(Save::new(Box::new(Self::new(subs)), hoisted))
        };
        (cursor, changed)
    }

    fn reset(&mut self) {
        for sub in &mut self.subs {
            sub.reset();
        }
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        for sub in &mut self.subs {
            sub.close();
        }
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            self.subs.iter().map(|sub| sub.clone_cursor()).collect(),
        ))
    }
}
