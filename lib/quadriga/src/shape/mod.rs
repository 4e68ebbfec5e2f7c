//! The intermediate representation between paths and cursors.
//!
//! Paths lower to a [`Shape`] tree first so structural rewrites (tautology
//! dropping, contradiction collapse, direction round-trip elimination,
//! store-native specialization of constant links) happen by pattern
//! matching before any cursor exists. The surviving tree is then lowered to
//! cursors, which run their own cost-based optimization.

use crate::graph::QuadStore;
use crate::iterate::and::And;
use crate::iterate::back::Bind;
use crate::iterate::compare::{Compare, Operator};
use crate::iterate::count::Count;
use crate::iterate::fixed::{Fixed, Null};
use crate::iterate::hasa::HasA;
use crate::iterate::linksto::LinksTo;
use crate::iterate::not::Not;
use crate::iterate::optional::Optional;
use crate::iterate::or::Or;
use crate::iterate::recursive::Recursive;
use crate::iterate::regexp::{compile_pattern, Regexp};
use crate::iterate::save::{Save, SavePredicates};
use crate::iterate::sequence::{Limit, Skip, Unique};
use crate::iterate::sort::Sort;
use crate::iterate::{Cursor, QueryError};
use crate::model::{Direction, Value};
use crate::path::Path;
use crate::storage::values::Ref;
use std::sync::Arc;
use tracing::trace;

/// A constraint on one direction of the scanned quads.
#[derive(Debug, Clone)]
pub struct QuadFilter {
    pub dir: Direction,
    pub values: Box<Shape>,
}

/// A value filter applied to the stream.
#[derive(Debug, Clone)]
pub enum ValueFilter {
    Comparison(Operator, Value),
    Regexp { pattern: String, include_iris: bool },
}

/// The shape tree.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Matches nothing.
    Null,
    /// Every node in the dictionary.
    AllNodes,
    /// Every currently present quad.
    AllQuads,
    /// Every interned entity: nodes and quad records. The unanchored start.
    AllEntities,
    /// A fixed set of values.
    Lookup(Vec<Value>),
    /// A fixed set of already-resolved refs.
    Ids(Vec<Ref>),
    /// The quads satisfying every direction constraint.
    Quads(Vec<QuadFilter>),
    /// The node at `dir` of each quad.
    NodesFrom { quads: Box<Shape>, dir: Direction },
    Intersect(Vec<Shape>),
    Union(Vec<Shape>),
    Except {
        from: Box<Shape>,
        exclude: Box<Shape>,
    },
    Save {
        from: Box<Shape>,
        tags: Vec<String>,
    },
    SavePredicates {
        from: Box<Shape>,
        tag: String,
        reverse: bool,
    },
    /// Replaces the output stream with the value bound to `tag`.
    Bind { from: Box<Shape>, tag: String },
    Optional {
        from: Box<Shape>,
        branch: Box<Shape>,
    },
    Recursive {
        from: Box<Shape>,
        morphism: Path,
        max_depth: u64,
    },
    Filter {
        from: Box<Shape>,
        filters: Vec<ValueFilter>,
    },
    Unique(Box<Shape>),
    Sort(Box<Shape>),
    Limit { from: Box<Shape>, limit: i64 },
    Skip { from: Box<Shape>, offset: i64 },
    Count(Box<Shape>),
}

impl Shape {
    /// Is this shape the whole universe of its domain? Those are dropped
    /// from intersections that carry another constraint.
    fn is_all(&self) -> bool {
        matches!(self, Self::AllNodes | Self::AllEntities)
    }

    fn is_null(&self) -> bool {
        matches!(self, Self::Null) || matches!(self, Self::Lookup(v) if v.is_empty())
    }

    /// Applies the structural rewrites bottom-up until they stop firing.
    pub fn optimized(self) -> Self {
        let mut shape = self;
        for _ in 0..10 {
            let (next, changed) = shape.optimize_once();
            shape = next;
            if !changed {
                return shape;
            }
        }
        shape
    }

    fn optimize_once(self) -> (Self, bool) {
        match self {
            Self::Null
            | Self::AllNodes
            | Self::AllQuads
            | Self::AllEntities
            | Self::Ids(_) => (self, false),
            Self::Lookup(values) => {
                if values.is_empty() {
                    (Self::Null, true)
                } else {
                    (Self::Lookup(values), false)
                }
            }
            Self::Quads(filters) => {
                let mut changed = false;
                let mut out = Vec::with_capacity(filters.len());
                for filter in filters {
                    let (values, c) = filter.values.optimize_once();
                    changed |= c;
                    if values.is_null() {
                        return (Self::Null, true);
                    }
                    if values.is_all() {
                        // No constraint at all
                        changed = true;
                        continue;
                    }
                    out.push(QuadFilter {
                        dir: filter.dir,
                        values: Box::new(values),
                    });
                }
                if out.is_empty() {
                    (Self::AllQuads, true)
                } else {
                    (Self::Quads(out), changed)
                }
            }
            Self::NodesFrom { quads, dir } => {
                let (quads, changed) = quads.optimize_once();
                if quads.is_null() {
                    return (Self::Null, true);
                }
                // HasA(LinksTo(x, d), d) is x: the round trip through the
                // quad index adds nothing
                if let Self::Quads(filters) = &quads {
                    if let [only] = filters.as_slice() {
                        if only.dir == dir {
                            trace!("collapsing direction round-trip");
                            return ((*only.values).clone(), true);
                        }
                    }
                }
                (
                    Self::NodesFrom {
                        quads: Box::new(quads),
                        dir,
                    },
                    changed,
                )
            }
            Self::Intersect(shapes) => {
                let mut changed = false;
                let mut out = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    let (shape, c) = shape.optimize_once();
                    changed |= c;
                    match shape {
                        Self::Null => return (Self::Null, true),
                        // Flatten nested intersections
                        Self::Intersect(inner) => {
                            changed = true;
                            out.extend(inner);
                        }
                        shape => out.push(shape),
                    }
                }
                if out.len() > 1 && out.iter().any(Self::is_all) {
                    // Tautological operands constrain nothing
                    out.retain(|shape| !shape.is_all());
                    changed = true;
                }
                match out.len() {
                    0 => (Self::AllEntities, true),
                    1 => (out.swap_remove(0), true),
                    _ => (Self::Intersect(out), changed),
                }
            }
            Self::Union(shapes) => {
                let mut changed = false;
                let mut out = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    let (shape, c) = shape.optimize_once();
                    changed |= c;
                    if shape.is_null() {
                        changed = true;
                    } else {
                        out.push(shape);
                    }
                }
                match out.len() {
                    0 => (Self::Null, true),
                    1 => (out.swap_remove(0), true),
                    _ => (Self::Union(out), changed),
                }
            }
            Self::Except { from, exclude } => {
                let (from, from_changed) = from.optimize_once();
                let (exclude, exclude_changed) = exclude.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if exclude.is_null() {
                    return (from, true);
                }
                (
                    Self::Except {
                        from: Box::new(from),
                        exclude: Box::new(exclude),
                    },
                    from_changed || exclude_changed,
                )
            }
            Self::Save { from, tags } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if tags.is_empty() {
                    return (from, true);
                }
                (
                    Self::Save {
                        from: Box::new(from),
                        tags,
                    },
                    changed,
                )
            }
            Self::SavePredicates { from, tag, reverse } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                (
                    Self::SavePredicates {
                        from: Box::new(from),
                        tag,
                        reverse,
                    },
                    changed,
                )
            }
            Self::Bind { from, tag } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                (
                    Self::Bind {
                        from: Box::new(from),
                        tag,
                    },
                    changed,
                )
            }
            Self::Optional { from, branch } => {
                let (from, from_changed) = from.optimize_once();
                let (branch, branch_changed) = branch.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if branch.is_null() {
                    // An optional branch that can never match adds nothing
                    return (from, true);
                }
                (
                    Self::Optional {
                        from: Box::new(from),
                        branch: Box::new(branch),
                    },
                    from_changed || branch_changed,
                )
            }
            Self::Recursive {
                from,
                morphism,
                max_depth,
            } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                (
                    Self::Recursive {
                        from: Box::new(from),
                        morphism,
                        max_depth,
                    },
                    changed,
                )
            }
            Self::Filter { from, filters } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if filters.is_empty() {
                    return (from, true);
                }
                (
                    Self::Filter {
                        from: Box::new(from),
                        filters,
                    },
                    changed,
                )
            }
            Self::Unique(from) => {
                let (from, changed) = from.optimize_once();
                match from {
                    Self::Null => (Self::Null, true),
                    // Unique is idempotent
                    Self::Unique(inner) => (Self::Unique(inner), true),
                    from => (Self::Unique(Box::new(from)), changed),
                }
            }
            Self::Sort(from) => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                (Self::Sort(Box::new(from)), changed)
            }
            Self::Limit { from, limit } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if limit <= 0 {
                    return (from, true);
                }
                (
                    Self::Limit {
                        from: Box::new(from),
                        limit,
                    },
                    changed,
                )
            }
            Self::Skip { from, offset } => {
                let (from, changed) = from.optimize_once();
                if from.is_null() {
                    return (Self::Null, true);
                }
                if offset <= 0 {
                    return (from, true);
                }
                (
                    Self::Skip {
                        from: Box::new(from),
                        offset,
                    },
                    changed,
                )
            }
            Self::Count(from) => {
                let (from, changed) = from.optimize_once();
                (Self::Count(Box::new(from)), changed)
            }
        }
    }

    /// Lowers the shape to a cursor tree over `store`.
    pub fn lower(&self, store: &Arc<dyn QuadStore>) -> Result<Box<dyn Cursor>, QueryError> {
        Ok(match self {
            Self::Null => Box::new(Null::new()),
            Self::AllNodes => store.nodes_all(),
            Self::AllQuads => store.quads_all(),
            Self::AllEntities => Box::new(Or::new(
                vec![store.nodes_all(), store.quads_all()],
                false,
            )),
            Self::Lookup(values) => Box::new(Fixed::new(
                values.iter().map(|v| store.value_of(v)).collect(),
            )),
            Self::Ids(refs) => Box::new(Fixed::new(refs.clone())),
            Self::Quads(filters) => lower_quads(filters, store)?,
            Self::NodesFrom { quads, dir } => Box::new(HasA::new(
                Arc::clone(store),
                quads.lower(store)?,
                *dir,
            )),
            Self::Intersect(shapes) => {
                let mut subs = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    subs.push(shape.lower(store)?);
                }
                Box::new(And::new(subs))
            }
            Self::Union(shapes) => {
                let mut subs = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    subs.push(shape.lower(store)?);
                }
                Box::new(Or::new(subs, false))
            }
            Self::Except { from, exclude } => Box::new(Not::new(
                from.lower(store)?,
                exclude.lower(store)?,
            )),
            Self::Save { from, tags } => {
                Box::new(Save::new(from.lower(store)?, tags.clone()))
            }
            Self::SavePredicates { from, tag, reverse } => Box::new(SavePredicates::new(
                Arc::clone(store),
                from.lower(store)?,
                tag.clone(),
                *reverse,
            )),
            Self::Bind { from, tag } => Box::new(Bind::new(from.lower(store)?, tag.clone())),
            Self::Optional { from, branch } => Box::new(And::new(vec![
                from.lower(store)?,
                Box::new(Optional::new(branch.lower(store)?)),
            ])),
            Self::Recursive {
                from,
                morphism,
                max_depth,
            } => Box::new(Recursive::new(
                Arc::clone(store),
                from.lower(store)?,
                morphism.clone(),
                *max_depth,
            )),
            Self::Filter { from, filters } => {
                let mut cursor = from.lower(store)?;
                for filter in filters {
                    cursor = match filter {
                        ValueFilter::Comparison(op, value) => Box::new(Compare::new(
                            Arc::clone(store),
                            cursor,
                            *op,
                            value.clone(),
                        )),
                        ValueFilter::Regexp {
                            pattern,
                            include_iris,
                        } => Box::new(Regexp::new(
                            Arc::clone(store),
                            cursor,
                            compile_pattern(pattern)?,
                            *include_iris,
                        )),
                    };
                }
                cursor
            }
            Self::Unique(from) => Box::new(Unique::new(from.lower(store)?)),
            Self::Sort(from) => Box::new(Sort::new(Arc::clone(store), from.lower(store)?)),
            Self::Limit { from, limit } => Box::new(Limit::new(from.lower(store)?, *limit)),
            Self::Skip { from, offset } => Box::new(Skip::new(from.lower(store)?, *offset)),
            Self::Count(from) => Box::new(Count::new(from.lower(store)?)),
        })
    }
}

/// Lowers the quad constraints, replacing a single-value constraint with
/// the store-native direction cursor instead of `LinksTo(Fixed)`.
fn lower_quads(
    filters: &[QuadFilter],
    store: &Arc<dyn QuadStore>,
) -> Result<Box<dyn Cursor>, QueryError> {
    if filters.is_empty() {
        return Ok(store.quads_all());
    }
    let mut subs: Vec<Box<dyn Cursor>> = Vec::with_capacity(filters.len());
    for filter in filters {
        subs.push(match filter.values.as_ref() {
            Shape::Lookup(values) if values.len() == 1 => {
                store.quad_cursor(filter.dir, &store.value_of(&values[0]))
            }
            values => Box::new(LinksTo::new(
                Arc::clone(store),
                values.lower(store)?,
                filter.dir,
            )),
        });
    }
    Ok(if subs.len() == 1 {
        subs.remove(0)
    } else {
        Box::new(And::new(subs))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(names: &[&str]) -> Shape {
        Shape::Lookup(names.iter().map(|n| Value::from(*n)).collect())
    }

    #[test]
    fn direction_round_trip_collapses() {
        let shape = Shape::NodesFrom {
            quads: Box::new(Shape::Quads(vec![QuadFilter {
                dir: Direction::Subject,
                values: Box::new(lookup(&["a", "b"])),
            }])),
            dir: Direction::Subject,
        };
        assert!(matches!(shape.optimized(), Shape::Lookup(values) if values.len() == 2));
    }

    #[test]
    fn tautologies_drop_and_contradictions_collapse() {
        let shape = Shape::Intersect(vec![Shape::AllEntities, lookup(&["a"])]);
        assert!(matches!(shape.optimized(), Shape::Lookup(_)));

        let shape = Shape::Intersect(vec![lookup(&["a"]), Shape::Lookup(Vec::new())]);
        assert!(matches!(shape.optimized(), Shape::Null));

        let shape = Shape::Union(vec![Shape::Null, Shape::Null]);
        assert!(matches!(shape.optimized(), Shape::Null));
    }

    #[test]
    fn nested_intersections_flatten() {
        let shape = Shape::Intersect(vec![
            Shape::Intersect(vec![lookup(&["a"]), lookup(&["b"])]),
            lookup(&["c"]),
        ]);
        assert!(matches!(shape.optimized(), Shape::Intersect(subs) if subs.len() == 3));
    }

    #[test]
    fn unique_is_idempotent_structurally() {
        let shape = Shape::Unique(Box::new(Shape::Unique(Box::new(lookup(&["a"])))));
        let optimized = shape.optimized();
        let Shape::Unique(inner) = optimized else {
            panic!("expected a unique shape");
        };
        assert!(matches!(*inner, Shape::Lookup(_)));
    }
}
