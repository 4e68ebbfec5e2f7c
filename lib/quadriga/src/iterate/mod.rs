//! The lazy iterator algebra: the uniform [`Cursor`] contract and the
//! library of composable cursors graph traversals compile to.
//!
//! A cursor is a single-use scanner over [`Ref`]s. `next` advances to the
//! next distinct primary result; `next_path` enumerates further tag-binding
//! witnesses for the *same* primary result; `contains` is a membership test
//! that also positions the cursor so `tag_results` can be asked afterwards.
//! Errors are latched: after the first error `next` keeps returning `false`
//! and [`Cursor::err`] reports the cause.

pub mod and;
pub mod back;
pub mod compare;
pub mod count;
pub mod fixed;
pub mod hasa;
pub mod linksto;
pub mod materialize;
pub mod not;
pub mod optional;
pub mod or;
pub mod recursive;
pub mod regexp;
pub mod save;
pub mod sequence;
pub mod sort;

use crate::storage::values::Ref;
use crate::storage::StorageError;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// An error raised while scanning an iterator tree.
///
/// Cursors latch the first error and keep it shared so every handle on the
/// tree reports the same cause.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("{0}")]
    Storage(Arc<StorageError>),
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("query cancelled")]
    Cancelled,
    #[error("cannot build a cursor from an unbound path")]
    UnboundPath,
}

impl From<StorageError> for QueryError {
    fn from(error: StorageError) -> Self {
        Self::Storage(Arc::new(error))
    }
}

/// A cancellation token checked between candidate refs, giving bounded-time
/// responsiveness to every `next`/`contains`/`next_path` call.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latches [`QueryError::Cancelled`] into `err` when the token tripped.
pub(crate) fn check_cancelled(ctx: &Cancellation, err: &mut Option<QueryError>) -> bool {
    if ctx.is_cancelled() {
        if err.is_none() {
            *err = Some(QueryError::Cancelled);
        }
        true
    } else {
        false
    }
}

/// The named tag bindings of one result.
pub type TagMap = FxHashMap<String, Ref>;

/// Tags starting with this sigil are internal captures (origin anchors,
/// predicate capture) and are stripped from user-facing output.
pub const RESERVED_TAG_SIGIL: char = '#';

/// The internal tag the start of a path scope is captured under.
pub(crate) fn origin_tag(scope: usize) -> String {
    format!("{RESERVED_TAG_SIGIL}origin{scope}")
}

/// A cardinality estimate.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Size {
    pub value: i64,
    pub exact: bool,
}

/// The cost model the optimizer reorders intersections with.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub contains_cost: i64,
    pub next_cost: i64,
    pub size: Size,
}

/// The uniform lazy-cursor contract.
pub trait Cursor: Send {
    /// Advances to the next distinct primary result. Returns `false` when
    /// exhausted or on error (inspect [`Cursor::err`]).
    fn next(&mut self, ctx: &Cancellation) -> bool;

    /// The current primary result. Undefined before the first successful
    /// `next` or `contains`.
    fn result(&self) -> Option<Ref>;

    /// Advances to the next binding variation of the current primary
    /// result: another witness for the same output value with different
    /// tag bindings.
    fn next_path(&mut self, ctx: &Cancellation) -> bool;

    /// Membership test; may be cheaper than scanning. Sets the current
    /// result on success so `tag_results` can be called afterwards.
    fn contains(&mut self, ctx: &Cancellation, value: &Ref) -> bool;

    /// Writes all named tag bindings of the current result into `dst`.
    fn tag_results(&self, dst: &mut TagMap);

    /// The first error hit, sticky.
    fn err(&self) -> Option<QueryError>;

    fn stats(&self) -> Stats;

    /// A cardinality estimate and whether it is known exact.
    fn size(&self) -> Size {
        self.stats().size
    }

    /// Rewrites this cursor; returns the replacement and whether anything
    /// changed.
    fn optimize(self: Box<Self>) -> (Box<dyn Cursor>, bool);

    /// Rewinds to the pre-`next` state, keeping operands.
    fn reset(&mut self);

    /// Releases held resources; propagates to sub-cursors.
    fn close(&mut self);

    /// A fresh cursor over the same operands, in pre-`next` state.
    fn clone_cursor(&self) -> Box<dyn Cursor>;

    /// `true` for the always-empty cursor, letting parents collapse
    /// contradictions without downcasting.
    fn is_null(&self) -> bool {
        false
    }

    /// Gives up this cursor's own result tags so a commutative parent can
    /// hoist them; only tag wrappers return anything. The surrendered tags
    /// must then be applied by the caller.
    fn detach_tags(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Optimizes every cursor of `subs`, reporting whether any changed.
pub(crate) fn optimize_all(subs: Vec<Box<dyn Cursor>>) -> (Vec<Box<dyn Cursor>>, bool) {
    let mut changed = false;
    let subs = subs
        .into_iter()
        .map(|sub| {
            let (sub, sub_changed) = sub.optimize();
            changed |= sub_changed;
            sub
        })
        .collect();
    (subs, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_latches() {
        let ctx = Cancellation::new();
        let mut err = None;
        assert!(!check_cancelled(&ctx, &mut err));
        ctx.cancel();
        assert!(check_cancelled(&ctx, &mut err));
        assert!(matches!(err, Some(QueryError::Cancelled)));
    }
}
