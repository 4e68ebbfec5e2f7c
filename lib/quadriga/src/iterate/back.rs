//! Output rebinding: replaces the primary stream with the value bound to a
//! tag, realizing `Back` and the origin anchoring behind reverse follows.

use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;
use rustc_hash::FxHashMap;

pub struct Bind {
    sub: Box<dyn Cursor>,
    tag: String,
    result: Option<Ref>,
    /// A primary result is active, so witness enumeration may continue
    /// through `next_path` before advancing.
    primary_active: bool,
    /// Lazily computed output map for `contains` probes: each bound value
    /// with the tags of its first witness.
    memo: Option<FxHashMap<Ref, TagMap>>,
    /// The memoized witness tags of a `contains` hit.
    contains_tags: Option<TagMap>,
    err: Option<QueryError>,
}

impl Bind {
    pub fn new(sub: Box<dyn Cursor>, tag: impl Into<String>) -> Self {
        Self {
            sub,
            tag: tag.into(),
            result: None,
            primary_active: false,
            memo: None,
            contains_tags: None,
            err: None,
        }
    }

    /// Moves the sub-cursor to its next witness, primary or variation.
    fn advance(&mut self, ctx: &Cancellation) -> bool {
        if self.primary_active && self.sub.next_path(ctx) {
            return true;
        }
        if self.sub.next(ctx) {
            self.primary_active = true;
            true
        } else {
            self.primary_active = false;
            false
        }
    }

    fn binding(&self) -> Option<Ref> {
        let mut tags = TagMap::default();
        self.sub.tag_results(&mut tags);
        tags.remove(&self.tag)
    }

    fn build_memo(&mut self, ctx: &Cancellation) {
        if self.memo.is_some() || self.err.is_some() {
            return;
        }
        let mut memo = FxHashMap::default();
        let mut scan = Bind::new(self.sub.clone_cursor(), self.tag.clone());
        while scan.advance(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return;
            }
            let mut tags = TagMap::default();
            scan.sub.tag_results(&mut tags);
            let Some(bound) = tags.remove(&scan.tag) else {
                continue;
            };
            memo.entry(bound).or_insert(tags);
        }
        if let Some(err) = scan.sub.err() {
            self.err = Some(err);
            return;
        }
        self.memo = Some(memo);
    }
}

impl Cursor for Bind {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.contains_tags = None;
        while self.advance(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            if let Some(bound) = self.binding() {
                self.result = Some(bound);
                return true;
            }
        }
        if self.err.is_none() {
            self.err = self.sub.err();
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
        self.build_memo(ctx);
        let Some(memo) = &self.memo else {
            return false;
        };
        match memo.get(value) {
            Some(tags) => {
                self.contains_tags = Some(tags.clone());
                self.result = Some(value.clone());
                true
            }
            None => false,
        }
    }

    fn tag_results(&self, dst: &mut TagMap) {
        // A contains hit reports the memoized witness, a scan the live one
        if let Some(tags) = &self.contains_tags {
            for (name, value) in tags {
                dst.insert(name.clone(), value.clone());
            }
        } else {
            self.sub.tag_results(dst);
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            // Contains builds the whole output map once
            contains_cost: sub.next_cost.saturating_mul(sub.size.value.max(1)),
            next_cost: sub.next_cost + 1,
            size: Size {
                value: sub.size.value,
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        (Box::new(Self::new(sub, self.tag)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.primary_active = false;
        self.memo = None;
        self.contains_tags = None;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
        self.memo = None;
        self.contains_tags = None;
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor(), self.tag.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterate::fixed::Fixed;
    use crate::iterate::save::Save;
    use crate::model::Value;

    #[test]
    fn rebinds_output_to_tag() {
        let ctx = Cancellation::new();
        let a = Ref::prefetched(Value::from("a"));
        let tagged = Save::new(Box::new(Fixed::new(vec![a.clone()])), vec!["t".into()]);
        let mut bind = Bind::new(Box::new(tagged), "t");
        assert!(bind.next(&ctx));
        assert_eq!(Some(a.clone()), bind.result());
        assert!(!bind.next(&ctx));
        bind.reset();
        assert!(bind.contains(&ctx, &a));
    }

    #[test]
    fn contains_keeps_the_witness_tags() {
        let ctx = Cancellation::new();
        let a = Ref::prefetched(Value::from("a"));
        let tagged = Save::new(
            Box::new(Save::new(
                Box::new(Fixed::new(vec![a.clone()])),
                vec!["origin".into()],
            )),
            vec!["extra".into()],
        );
        let mut bind = Bind::new(Box::new(tagged), "origin");
        assert!(bind.contains(&ctx, &a));
        let mut tags = TagMap::default();
        bind.tag_results(&mut tags);
        assert_eq!(Some(&a), tags.get("extra"));
        assert!(!bind.contains(&ctx, &Ref::prefetched(Value::from("b"))));
    }
}
