//! A contains-only wrapper for optional branches: always matches, and
//! attaches the branch's tags only when the branch matched.

use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;

pub struct Optional {
    branch: Box<dyn Cursor>,
    matched: bool,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Optional {
    pub fn new(branch: Box<dyn Cursor>) -> Self {
        Self {
            branch,
            matched: false,
            result: None,
            err: None,
        }
    }
}

impl Cursor for Optional {
    /// Optional cursors only make sense on the `contains` side of an
    /// intersection; scanning one yields nothing.
    fn next(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.matched && self.branch.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.matched = self.branch.contains(ctx, value);
        if self.err.is_none() {
            self.err = self.branch.err();
        }
        self.result = Some(value.clone());
        self.err.is_none()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        // When the branch did not match, its tags stay absent
        if self.matched {
            self.branch.tag_results(dst);
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let branch = self.branch.stats();
        Stats {
            contains_cost: branch.contains_cost,
            // Never a sensible primary
            next_cost: i64::MAX / 4,
            size: Size {
                value: i64::MAX / 4,
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (branch, changed) = self.branch.optimize();
        (Box::new(Self::new(branch)), changed)
    }

    fn reset(&mut self) {
        self.branch.reset();
        self.matched = false;
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        self.branch.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.branch.clone_cursor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::fixed::Fixed;
    use crate::iterate::save::Save;
    use crate::model::Value;

    #[test]
    fn failed_branch_leaves_tags_absent() {
        let ctx = Cancellation::new();
        let a = Ref::prefetched(Value::from("a"));
        let b = Ref::prefetched(Value::from("b"));
        let branch = Save::new(Box::new(Fixed::new(vec![a.clone()])), vec!["t".into()]);
        let mut optional = Optional::new(Box::new(branch));

        assert!(optional.contains(&ctx, &a));
        let mut tags = TagMap::default();
        optional.tag_results(&mut tags);
        assert_eq!(Some(&a), tags.get("t"));

        // The miss still passes, with no binding at all
        assert!(optional.contains(&ctx, &b));
        let mut tags = TagMap::default();
        optional.tag_results(&mut tags);
        assert!(tags.is_empty());
    }
}
