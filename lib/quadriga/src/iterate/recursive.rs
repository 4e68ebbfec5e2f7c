//! Transitive expansion: repeatedly applies a morphism to the sub-cursor's
//! results, collecting every ref reached, with cycle detection.

use crate::graph::QuadStore;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::path::Path;
use crate::shape::Shape;
use crate::storage::values::Ref;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct Recursive {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    morphism: Path,
    /// Expansion stops at this depth; zero means unbounded (cancellation
    /// keeps runaway traversals interruptible).
    max_depth: u64,
    seen: FxHashSet<Ref>,
    queue: VecDeque<Ref>,
    frontier: Vec<Ref>,
    depth: u64,
    started: bool,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Recursive {
    pub fn new(
        store: Arc<dyn QuadStore>,
        sub: Box<dyn Cursor>,
        morphism: Path,
        max_depth: u64,
    ) -> Self {
        Self {
            store,
            sub,
            morphism,
            max_depth,
            seen: FxHashSet::default(),
            queue: VecDeque::new(),
            frontier: Vec::new(),
            depth: 0,
            started: false,
            result: None,
            err: None,
        }
    }

    fn start(&mut self, ctx: &Cancellation) -> bool {
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            if let Some(result) = self.sub.result() {
                // Starting refs seed the frontier but are not emitted
                if self.seen.insert(result.clone()) {
                    self.frontier.push(result);
                }
            }
        }
        if let Some(err) = self.sub.err() {
            self.err = Some(err);
            return false;
        }
        self.started = true;
        true
    }

    fn expand(&mut self, ctx: &Cancellation) -> bool {
        self.depth += 1;
        let base = Shape::Ids(std::mem::take(&mut self.frontier));
        let shape = self.morphism.shape_on(base).optimized();
        let mut cursor = match shape.lower(&self.store) {
            Ok(cursor) => cursor,
            Err(err) => {
                self.err = Some(err);
                return false;
            }
        };
        while cursor.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return false;
            }
            let Some(result) = cursor.result() else {
                continue;
            };
            if self.seen.insert(result.clone()) {
                self.queue.push_back(result.clone());
                self.frontier.push(result);
            }
        }
        if let Some(err) = cursor.err() {
            self.err = Some(err);
            return false;
        }
        true
    }
}

impl Cursor for Recursive {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.started && !self.start(ctx) {
            return false;
        }
        loop {
            if let Some(result) = self.queue.pop_front() {
                self.result = Some(result);
                return true;
            }
            if self.frontier.is_empty() {
                return false;
            }
            if self.max_depth > 0 && self.depth >= self.max_depth {
                return false;
            }
            if !self.expand(ctx) {
                return false;
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        while self.next(ctx) {
            if self.result.as_ref() == Some(value) {
                return true;
            }
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
            contains_cost: sub.next_cost.saturating_mul(8),
            next_cost: sub.next_cost.saturating_mul(8),
            size: Size {
                value: sub.size.value.saturating_mul(8),
                exact: false,
            },
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        (
            Box::new(Self::new(self.store, sub, self.morphism, self.max_depth)),
            changed,
        )
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen.clear();
        self.queue.clear();
        self.frontier.clear();
        self.depth = 0;
        self.started = false;
        self.result = None;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
        self.seen.clear();
        self.queue.clear();
        self.frontier.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            Arc::clone(&self.store),
            self.sub.clone_cursor(),
            self.morphism.clone(),
            self.max_depth,
        ))
    }
}
