//! Regular-expression filtering over string content.

use crate::graph::QuadStore;
use crate::iterate::fixed::Null;
use crate::iterate::{check_cancelled, Cancellation, Cursor, QueryError, Size, Stats, TagMap};
use crate::model::Value;
use crate::storage::values::Ref;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

const REGEX_SIZE_LIMIT: usize = 1_000_000;

/// Compiles a filter pattern with the compiled-size limit applied.
pub fn compile_pattern(pattern: &str) -> Result<Regex, QueryError> {
    Ok(RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()?)
}

/// Passes through the refs whose string content matches the pattern.
/// By default only string literals are inspected; `include_iris` widens the
/// filter to identifiers.
pub struct Regexp {
    store: Arc<dyn QuadStore>,
    sub: Box<dyn Cursor>,
    regex: Regex,
    include_iris: bool,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Regexp {
    pub fn new(
        store: Arc<dyn QuadStore>,
        sub: Box<dyn Cursor>,
        regex: Regex,
        include_iris: bool,
    ) -> Self {
        Self {
            store,
            sub,
            regex,
            include_iris,
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
        let Some(resolved) = resolved else {
            return false;
        };
        if let Some(text) = resolved.as_text() {
            return self.regex.is_match(text);
        }
        if self.include_iris {
            return match &resolved {
                Value::Iri(iri) => self.regex.is_match(iri.as_str()),
                Value::BlankNode(node) => self.regex.is_match(node.as_str()),
                _ => false,
            };
        }
        false
    }
}

impl Cursor for Regexp {
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
            contains_cost: sub.contains_cost + 2,
            next_cost: sub.next_cost + 2,
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
            Box::new(Self::new(self.store, sub, self.regex, self.include_iris)),
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
            self.regex.clone(),
            self.include_iris,
        ))
    }
}
