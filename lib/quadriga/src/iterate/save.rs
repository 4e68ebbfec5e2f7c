//! Tag attachment: labels the current result, and the predicate-capture
//! cursor behind `SavePredicates`.

use crate::graph::QuadStore;
use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Stats, TagMap};
use crate::model::Direction;
use crate::storage::values::Ref;
use rustc_hash::FxHashSet;
use std::mem;
use std::sync::Arc;

/// Tags the current result of the sub-cursor under one or more names.
pub struct Save {
    sub: Box<dyn Cursor>,
    tags: Vec<String>,
}

impl Save {
    pub fn new(sub: Box<dyn Cursor>, tags: Vec<String>) -> Self {
        Self { sub, tags }
    }
}

impl Cursor for Save {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        self.sub.contains(ctx, value)
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
        if let Some(result) = self.sub.result() {
            for tag in &self.tags {
                dst.insert(tag.clone(), result.clone());
            }
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.sub.err()
    }

    fn stats(&self) -> Stats {
        self.sub.stats()
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        if self.tags.is_empty() {
            return (sub, true);
        }
        (Box::new(Self::new(sub, self.tags)), changed)
    }

    fn reset(&mut self) {
        self.sub.reset();
    }

    fn close(&mut self) {
        self.sub.close();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(self.sub.clone_cursor(), self.tags.clone()))
    }

    fn detach_tags(&mut self) -> Vec<String> {
        mem::take(&mut self.tags)
    }
}

/// Tags each result with the predicates of the quads it is the subject
/// (or, reversed, the object) of. Multiple predicates are enumerated as
/// binding variations through `next_path`.
pub struct SavePredicates {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    tag: String,
    reverse: bool,
    predicates: Vec<Ref>,
    pos: usize,
    err: Option<QueryError>,
}

impl SavePredicates {
    pub fn new(
        store: Arc<dyn QuadStore>,
        sub: Box<dyn Cursor>,
        tag: impl Into<String>,
        reverse: bool,
    ) -> Self {
        Self {
            store,
            sub,
            tag: tag.into(),
            reverse,
            predicates: Vec::new(),
            pos: 0,
            err: None,
        }
    }

    fn dir(&self) -> Direction {
        if self.reverse {
            Direction::Object
        } else {
            Direction::Subject
        }
    }

    fn load_predicates(&mut self, ctx: &Cancellation, node: &Ref) {
        self.predicates.clear();
        self.pos = 0;
        let mut seen = FxHashSet::default();
        let mut quads = self.store.quad_cursor(self.dir(), node);
        while quads.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return;
            }
            let Some(quad) = quads.result() else {
                continue;
            };
            if let Some(predicate) = self.store.quad_direction(&quad, Direction::Predicate) {
                if seen.insert(predicate.clone()) {
                    self.predicates.push(predicate);
                }
            }
        }
        if self.err.is_none() {
            self.err = quads.err();
        }
    }
}

impl Cursor for SavePredicates {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.sub.next(ctx) {
            if self.err.is_none() {
                self.err = self.sub.err();
            }
            return false;
        }
        if let Some(node) = self.sub.result() {
            self.load_predicates(ctx, &node);
        }
        self.err.is_none()
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.pos + 1 < self.predicates.len() {
            self.pos += 1;
            return true;
        }
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        if !self.sub.contains(ctx, value) {
            return false;
        }
        self.load_predicates(ctx, value);
        self.err.is_none()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
        if let Some(predicate) = self.predicates.get(self.pos) {
            dst.insert(self.tag.clone(), predicate.clone());
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone()
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            contains_cost: sub.contains_cost + 2,
            next_cost: sub.next_cost + 2,
            size: sub.size,
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        if sub.is_null() {
            return (Box::new(Null::new()), true);
        }
        (
            Box::new(Self::new(self.store, sub, self.tag, self.reverse)),
            changed,
        )
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.predicates.clear();
        self.pos = 0;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
        self.predicates.clear();
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(
            Arc::clone(&self.store),
            self.sub.clone_cursor(),
            self.tag.clone(),
            self.reverse,
        ))
    }
}
