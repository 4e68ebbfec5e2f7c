//! Materializes the sub-cursor and replays it ordered by value.

use crate::graph::QuadStore;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Stats, TagMap};
use crate::storage::values::Ref;
use std::cmp::Ordering;
use std::sync::Arc;

struct Row {
    result: Ref,
    tags: TagMap,
    key: Option<crate::model::Value>,
}

pub struct Sort {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    rows: Option<Vec<Row>>,
    pos: usize,
    started: bool,
    err: Option<QueryError>,
}

impl Sort {
    pub fn new(store: Arc<dyn QuadStore>, sub: Box<dyn Cursor>) -> Self {
        Self {
            store,
            sub,
            rows: None,
            pos: 0,
            started: false,
            err: None,
        }
    }

    fn build(&mut self, ctx: &Cancellation) {
        if self.rows.is_some() || self.err.is_some() {
            return;
        }
        let mut rows = Vec::new();
        while self.sub.next(ctx) {
            if check_cancelled(ctx, &mut self.err) {
                return;
            }
            let Some(result) = self.sub.result() else {
                continue;
            };
            let mut tags = TagMap::default();
            self.sub.tag_results(&mut tags);
            let key = match self.store.name_of(&result) {
                Ok(key) => key,
                Err(e) => {
                    self.err = Some(e.into());
                    return;
                }
            };
            rows.push(Row { result, tags, key });
        }
        if let Some(err) = self.sub.err() {
            self.err = Some(err);
            return;
        }
        rows.sort_by(|a, b| match (&a.key, &b.key) {
            (Some(a), Some(b)) => a.total_cmp(b),
            // Unnameable refs sort after everything, by identity
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => format!("{}", a.result).cmp(&format!("{}", b.result)),
        });
        self.rows = Some(rows);
    }
}

impl Cursor for Sort {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.err.is_some() || check_cancelled(ctx, &mut self.err) {
            return false;
        }
        self.build(ctx);
        let Some(rows) = &self.rows else {
            return false;
        };
        let next = if self.started { self.pos + 1 } else { 0 };
        if next < rows.len() {
            self.pos = next;
            self.started = true;
            true
        } else {
            false
        }
    }

    fn result(&self) -> Option<Ref> {
        self.rows
            .as_ref()
            .and_then(|rows| rows.get(self.pos))
            .map(|row| row.result.clone())
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool {
        self.sub.contains(ctx, value)
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(row) = self.rows.as_ref().and_then(|rows| rows.get(self.pos)) {
            for (name, value) in &row.tags {
                dst.insert(name.clone(), value.clone());
            }
        }
    }

    fn err(&self) -> Option<QueryError> {
        self.err.clone().or_else(|| self.sub.err())
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            next_cost: sub.next_cost * 2,
            ..sub
        }
    }

    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool) {
        let (sub, changed) = self.sub.optimize();
        (Box::new(Self::new(self.store, sub)), changed)
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.started = false;
        self.err = None;
    }

    fn close(&mut self) {
        self.sub.close();
        self.rows = None;
    }

    fn clone_cursor(&self) -> Box<dyn Cursor> {
        Box::new(Self::new(Arc::clone(&self.store), self.sub.clone_cursor()))
    }
}
