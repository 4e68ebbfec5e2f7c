//! Ordered value filters over literal content.

use crate::graph::QuadStore;
use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::Value;
use crate::storage::values::Ref;
use std::cmp::Ordering;
use std::sync::Arc;

/// The ordered comparison operators.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Operator {
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
}

impl Operator {
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::LessThan => ordering == Ordering::Less,
            Self::LessThanEquals => ordering != Ordering::Greater,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterThanEquals => ordering != Ordering::Less,
        }
    }
}

/// Passes through the refs whose value compares against `value` under `op`.
/// Refs of another value family (or with no value at all) are dropped.
pub struct Compare {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    op: Operator,
    value: Value,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Compare {
    pub fn new(store: Arc<dyn QuadStore>, sub: Box<dyn Cursor>, op: Operator, value: Value) -> Self {
        Self {
            store,
            sub,
            op,
            value,
            result: None,
            err: None,
        }
    }

    fn passes(&mut self, r: &Ref) -> bool {
        let resolved = match r.prefetched_value() {
            Some(value) => Some(value.clone()),
            None => match self.store.name_of(r) {
                Ok(value) => value,
                Err(e) => {
                    self.err = Some(e.into());
                    return false;
                }
            },
        };
        resolved
            .and_then(|value| value.compare(&self.value))
            .is_some_and(|ordering| self.op.matches(ordering))
    }
}

impl Cursor for Compare {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(result) = self.sub.result() else {
                continue;
            };
            if self.passes(&result) {
                self.result = Some(result);
                return true;
            }
            if self.err.is_some() {
                return false;
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

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.passes(value) || self.err.is_some() {
            return false;
        }
        if self.sub.contains(ctx, value) {
            self.result = Some(value.clone());
            true
        } else {
            false
        }
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            contains_cost: sub.contains_cost + 1,
            next_cost: sub.next_cost + 1,
            size: Size {
                value: sub.size.value / 2 + 1,
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        (
            Box::new(Self::new(self.store, sub, self.op, self.value)),
            changed,
        )
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            Arc::clone(&self.store),
            self.sub.clone_cursor(),
            self.op,
            self.value.clone(),
        ))
    }
}
