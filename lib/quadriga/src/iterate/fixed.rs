//! The materialized-set cursor and the always-empty cursor.

use crate::iterate::{Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::storage::values::Ref;

/// A cursor over an explicit set of refs. `contains` is a direct set probe.
pub struct Fixed {
    values: Vec<Ref>,
    pos: usize,
    result: Option<Ref>,
}

impl Fixed {
    pub fn new(values: Vec<Ref>) -> Self {
        Self {
            values,
            pos: 0,
            result: None,
        }
    }
}

impl Cursor for Fixed {
    fn next(&mut self, _ctx: &Cancellation) -> bool {
        if self.pos < self.values.len() {
            self.result = Some(self.values[self.pos].clone());
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &Cancellation, value: &Ref) -> bool {
        if self.values.contains(value) {
            self.result = Some(value.clone());
            true
        } else {
            false
        }
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<QueryError> {
        None
    }

    fn stats(&self) -> Stats {
        Stats {
            contains_cost: 1,
            next_cost: 1,
            size: Size {
                value: self.values.len() as i64,
                exact: true,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        if self.values.is_empty() {
            (Box::new(Null::new()), true)
        } else {
            (self, false)
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.result = None;
    }

    fn close(&mut self) {
        self.values.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.values.clone()))
    }

    fn is_null(&self) -> bool {
        self.values.is_empty()
    }
}

/// The contradiction cursor: yields nothing, contains nothing.
pub struct Null {
    _private: (),
}

impl Null {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for Null {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor for Null {
    fn next(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        None
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &Cancellation, _value: &Ref) -> bool {
        false
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<QueryError> {
        None
    }

    fn stats(&self) -> Stats {
        Stats {
            contains_cost: 0,
            next_cost: 0,
            size: Size {
                value: 0,
                exact: true,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        (self, false)
    }

    fn reset(&mut self) {}

    fn close(&mut self) {}

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Null::new())
    }

    fn is_null(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn fixed_scans_and_probes() {
        let ctx = Cancellation::new();
        let a = Ref::prefetched(Value::from("a"));
        let b = Ref::prefetched(Value::from("b"));
        let mut it = Fixed::new(vec![a.clone(), b.clone()]);
        assert!(it.next(&ctx));
        assert_eq!(Some(a.clone()), it.result());
        assert!(it.next(&ctx));
        assert!(!it.next(&ctx));
        it.reset();
        assert!(it.contains(&ctx, &b));
        assert!(!it.contains(&ctx, &Ref::prefetched(Value::from("c"))));
    }

    #[test]
    fn empty_fixed_optimizes_to_null() {
        let (it, changed) = Box::new(Fixed::new(Vec::new())).optimize();
        assert!(changed);
        assert!(it.is_null());
    }
}
