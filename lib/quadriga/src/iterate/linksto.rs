//! From nodes to quads: yields the quads whose direction component lies in
//! the node sub-cursor.

use crate::graph::QuadStore;
use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::Direction;
use crate::storage::values::Ref;
use std::sync::Arc;

pub struct LinksTo {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    dir: Direction,
    current: Option<Box<dyn Cursor>>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl LinksTo {
    pub fn new(store: Arc<dyn QuadStore>, sub: Box<dyn Cursor>, dir: Direction) -> Self {
        Self {
            store,
            sub,
            dir,
            current: None,
            result: None,
            err: None,
        }
    }
}

impl Cursor for LinksTo {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        loop {
            if let Some(current) = &mut self.current {
                if current.next(ctx) {
                    self.result = current.result();
                    return true;
                }
                if let Some(err) = current.err() {
                    self.err = Some(err);
                    return false;
                }
                self.current = None;
            }
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            if !self.sub.next(ctx) {
                if self.err.is_none() {
                    self.err = self.sub.err();
                }
                return false;
            }
            if let Some(node) = self.sub.result() {
                self.current = Some(self.store.quad_cursor(self.dir, &node));
            }
        }
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
        let Some(node) = self.store.quad_direction(value, self.dir) else {
            return false;
        };
        if !self.sub.contains(ctx, &node) {
            if self.err.is_none() {
                self.err = self.sub.err();
            }
            return false;
        }
        // The quad itself must be present in the store
        let mut quads = self.store.quad_cursor(self.dir, &node);
        if quads.contains(ctx, value) {
            self.result = Some(value.clone());
            true
        } else {
            if self.err.is_none() {
                self.err = quads.err();
            }
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
            contains_cost: sub.contains_cost + 2,
            next_cost: sub.next_cost + 2,
            size: Size {
                // A node links to an unknown number of quads
                value: sub.size.value.saturating_mul(2),
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        (Box::new(Self::new(self.store, sub, self.dir)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.current = None;
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        if let Some(current) = &mut self.current {
            current.close();
        }
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            Arc::clone(&self.store),
            self.sub.clone_cursor(),
            self.dir,
        ))
    }
}
