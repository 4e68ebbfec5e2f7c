//! Complement of a sub-cursor within a parent domain.

use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;

pub struct Not {
    /// The domain scanned by `next`.
    parent: Box<dyn Cursor>,
    sub: Box<dyn Cursor>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Not {
    pub fn new(parent: Box<dyn Cursor>, sub: Box<dyn Cursor>) -> Self {
        Self {
            parent,
            sub,
            result: None,
            err: None,
        }
    }
}

impl Cursor for Not {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        while self.parent.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(result) = self.parent.result() else {
                continue;
            };
            if !self.sub.contains(ctx, &result) {
                if self.sub.err().is_some() {
                    break;
                }
                self.result = Some(result);
                return true;
            }
        }
        if self.err.is_none() {
            self.err = self.parent.err().or_else(|| self.sub.err());
        }
        false
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
        if self.sub.contains(ctx, value) {
            false
        } else {
            self.result = Some(value.clone());
            true
        }
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.parent.tag_results(dst);
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let parent = self.parent.stats();
        let sub = self.sub.stats();
        Stats {
            contains_cost: sub.contains_cost,
            next_cost: parent.next_cost + sub.contains_cost,
            size: Size {
                value: (parent.size.value - sub.size.value).max(0),
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (parent, parent_changed) = self.parent.optimize();
        let (sub, sub_changed) = self.sub.optimize();
        if parent.is_null() {
            return (Box::new(Null::new()), true);
        }
        if sub.is_null() {
            // Nothing to exclude
            return (parent, true);
        }
        (
            Box::new(Self::new(parent, sub)),
            parent_changed || sub_changed,
        )
    }

    fn reset(&mut self) {
        self.parent.reset();
        self.sub.reset();
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        self.parent.close();
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            self.parent.clone_cursor(),
            self.sub.clone_cursor(),
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
    fn complements_within_parent() {
        let ctx = Cancellation::new();
        let mut not = Not::new(
            Box::new(Fixed::new(refs(&["a", "b", "c"]))),
            Box::new(Fixed::new(refs(&["b"]))),
        );
        let mut out = Vec::new();
        while not.next(&ctx) {
            out.extend(not.result());
        }
        assert_eq!(refs(&["a", "c"]), out);
        assert!(not.contains(&ctx, &refs(&["z"])[0]));
        assert!(!not.contains(&ctx, &refs(&["b"])[0]));
    }
}
