//! From quads to nodes: yields the node at one direction of each quad the
//! sub-cursor produces.

use crate::graph::QuadStore;
use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::Direction;
use crate::storage::values::Ref;
use std::sync::Arc;

pub struct HasA {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    dir: Direction,
    result: Option<Ref>,
    /// A node peeked at by `next_path` that turned out to belong to the
    /// next primary result.
    pending: Option<Ref>,
    err: Option<QueryError>,
}

impl HasA {
    pub fn new(store: Arc<dyn QuadStore>, sub: Box<dyn Cursor>, dir: Direction) -> Self {
        Self {
            store,
            sub,
            dir,
            result: None,
            pending: None,
            err: None,
        }
    }
}

impl Cursor for HasA {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if let Some(pending) = self.pending.take() {
            self.result = Some(pending);
            return true;
        }
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(quad) = self.sub.result() else {
                continue;
            };
            // Quads without the direction (unlabeled quads asked for their
            // label) are skipped
            if let Some(node) = self.store.quad_direction(&quad, self.dir) {
                self.result = Some(node);
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

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if self.sub.next_path(ctx) {
            return true;
        }
        // A sibling quad mapping to the same node is another witness; one
        // mapping elsewhere is saved as the next primary result.
        if self.sub.next(ctx) {
            if let Some(quad) = self.sub.result() {
                if let Some(node) = self.store.quad_direction(&quad, self.dir) {
                    if Some(&node) == self.result.as_ref() {
                        return true;
                    }
                    self.pending = Some(node);
                }
            }
        }
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        let mut quads = self.store.quad_cursor(self.dir, value);
        while quads.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(quad) = quads.result() else {
                continue;
            };
            if self.sub.contains(ctx, &quad) {
                self.result = Some(value.clone());
                return true;
            }
        }
        if self.err.is_none() {
            self.err = quads.err().or_else(|| self.sub.err());
        }
        false
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
            contains_cost: sub.contains_cost * 2 + 2,
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
        (Box::new(Self::new(self.store, sub, self.dir)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.pending = None;
        self.err = None;
    }

    fn close(&mut self) {
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
