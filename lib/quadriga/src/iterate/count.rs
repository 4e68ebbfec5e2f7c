//! Collapses a sub-cursor into its single result count.

use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::Value;
use crate::storage::values::Ref;

pub struct Count {
    sub: Box<dyn Cursor>,
    result: Option<Ref>,
    done: bool,
    err: Option<QueryError>,
}

impl Count {
    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self {
            sub,
            result: None,
            done: false,
            err: None,
        }
    }

    fn count(&mut self, ctx: &Cancellation) -> Option<i64> {
        let mut count = 0i64;
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return None;
            }
            count += 1;
        }
        if let Some(err) = self.sub.err() {
            self.err = Some(err);
            return None;
        }
        Some(count)
    }
}

impl Cursor for Count {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.done || self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.done = true;
        let Some(count) = self.count(ctx) else {
            return false;
        };
        self.result = Some(Ref::prefetched(Value::from(count)));
        true
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if !self.done && self.next(ctx) {
            self.done = true;
        }
        self.result.as_ref() == Some(value)
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            contains_cost: sub.next_cost.saturating_mul(sub.size.value.max(1)),
            next_cost: sub.next_cost.saturating_mul(sub.size.value.max(1)),
            size: Size {
                value: 1,
                exact: true,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        (Box::new(Self::new(sub)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.done = false;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::fixed::Fixed;

    #[test]
    fn counts_the_stream() {
        let ctx = Cancellation::new();
        let refs: Vec<Ref> = ["a", "b", "c"]
            .iter()
            .map(|n| Ref::prefetched(Value::from(*n)))
            .collect();
        let mut count = Count::new(Box::new(Fixed::new(refs)));
        assert!(count.next(&ctx));
        assert_eq!(Some(Ref::prefetched(Value::from(3))), count.result());
        assert!(!count.next(&ctx));
    }
}
