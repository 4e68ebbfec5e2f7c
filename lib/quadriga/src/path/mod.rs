//! The traversal builder: a [`Path`] accumulates morphism steps and lowers
//! them to a [`Shape`] tree bound to a store.
//!
//! A [`Morphism`] is the same sequence bound to no store: a reusable
//! traversal template that any path can `follow`.

use crate::graph::QuadStore;
use crate::iterate::compare::Operator;
use crate::iterate::{origin_tag, Cursor, QueryError};
use crate::model::{Direction, Value};
use crate::shape::{QuadFilter, Shape, ValueFilter};
use std::fmt;
use std::sync::Arc;

/// An unbound path, reusable from any store.
pub type Morphism = Path;

#[derive(Clone)]
enum Step {
    Is(Vec<Value>),
    Out { via: Vec<Value>, tags: Vec<String> },
    In { via: Vec<Value>, tags: Vec<String> },
    Both { via: Vec<Value>, tags: Vec<String> },
    Has {
        via: Vec<Value>,
        values: Vec<Value>,
        reverse: bool,
    },
    Tag(Vec<String>),
    Back(String),
    Follow(Path),
    FollowReverse(Path),
    FollowRecursive(Path, u64),
    Save {
        via: Value,
        tag: String,
        reverse: bool,
        optional: bool,
    },
    SavePredicates { tag: String, reverse: bool },
    Predicates { reverse: bool },
    Labels,
    Except(Path),
    And(Path),
    Or(Path),
    Optional(Path),
    Filters(Vec<ValueFilter>),
    Unique,
    Order,
    Limit(i64),
    Skip(i64),
    Count,
}

/// Hands out distinct scope identifiers for internal origin anchors.
#[derive(Default)]
struct Scopes {
    next: usize,
}

impl Scopes {
    fn enter(&mut self) -> usize {
        let scope = self.next;
        self.next += 1;
        scope
    }
}

/// An ordered sequence of traversal operations, optionally bound to a
/// store. Paths are immutable: every operation returns an extended copy.
#[derive(Clone)]
pub struct Path {
    store: Option<Arc<dyn QuadStore>>,
    start: Vec<Value>,
    steps: Vec<Step>,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("bound", &self.store.is_some())
            .field("start", &self.start)
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Is(_) => "Is",
            Self::Out { .. } => "Out",
            Self::In { .. } => "In",
            Self::Both { .. } => "Both",
            Self::Has { .. } => "Has",
            Self::Tag(_) => "Tag",
            Self::Back(_) => "Back",
            Self::Follow(_) => "Follow",
            Self::FollowReverse(_) => "FollowReverse",
            Self::FollowRecursive(..) => "FollowRecursive",
            Self::Save { .. } => "Save",
            Self::SavePredicates { .. } => "SavePredicates",
            Self::Predicates { .. } => "Predicates",
            Self::Labels => "Labels",
            Self::Except(_) => "Except",
            Self::And(_) => "And",
            Self::Or(_) => "Or",
            Self::Optional(_) => "Optional",
            Self::Filters(_) => "Filters",
            Self::Unique => "Unique",
            Self::Order => "Order",
            Self::Limit(_) => "Limit",
            Self::Skip(_) => "Skip",
            Self::Count => "Count",
        };
        f.write_str(name)
    }
}

impl Path {
    /// An anchored path over `store`. With no values the path starts from
    /// every interned entity.
    pub fn start(store: Arc<dyn QuadStore>, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            store: Some(store),
            start: values.into_iter().collect(),
            steps: Vec::new(),
        }
    }

    /// An unbound traversal template.
    pub fn morphism() -> Self {
        Self {
            store: None,
            start: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.store.is_some()
    }

    fn with(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Restricts the stream to the given values.
    pub fn is(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.with(Step::Is(values.into_iter().collect()))
    }

    /// Follows the given predicates forward, subject to object. No
    /// predicates means any predicate.
    pub fn out(self, via: impl IntoIterator<Item = Value>) -> Self {
        self.out_with_tags(via, Vec::new())
    }

    /// Like [`Path::out`], tagging the predicate nodes traversed.
    pub fn out_with_tags(
        self,
        via: impl IntoIterator<Item = Value>,
        tags: Vec<String>,
    ) -> Self {
        self.with(Step::Out {
            via: via.into_iter().collect(),
            tags,
        })
    }

    /// Follows the given predicates backward, object to subject.
    pub fn in_(self, via: impl IntoIterator<Item = Value>) -> Self {
        self.in_with_tags(via, Vec::new())
    }

    pub fn in_with_tags(self, via: impl IntoIterator<Item = Value>, tags: Vec<String>) -> Self {
        self.with(Step::In {
            via: via.into_iter().collect(),
            tags,
        })
    }

    /// Follows the given predicates in both directions.
    pub fn both(self, via: impl IntoIterator<Item = Value>) -> Self {
        self.with(Step::Both {
            via: via.into_iter().collect(),
            tags: Vec::new(),
        })
    }

    /// Keeps the values that have an outgoing `via` quad to one of
    /// `values` (any object when `values` is empty).
    pub fn has(
        self,
        via: impl IntoIterator<Item = Value>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.with(Step::Has {
            via: via.into_iter().collect(),
            values: values.into_iter().collect(),
            reverse: false,
        })
    }

    /// Like [`Path::has`] with the edge direction reversed.
    pub fn has_reverse(
        self,
        via: impl IntoIterator<Item = Value>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.with(Step::Has {
            via: via.into_iter().collect(),
            values: values.into_iter().collect(),
            reverse: true,
        })
    }

    /// Names the current position.
    pub fn tag(self, names: impl IntoIterator<Item = String>) -> Self {
        self.with(Step::Tag(names.into_iter().collect()))
    }

    /// Returns to a previously tagged position; the empty tag means the
    /// origin of the current path scope.
    pub fn back(self, tag: impl Into<String>) -> Self {
        self.with(Step::Back(tag.into()))
    }

    /// Applies a morphism from the current position.
    pub fn follow(self, path: Path) -> Self {
        self.with(Step::Follow(path))
    }

    /// Applies a morphism against its direction: keeps the values the
    /// morphism would reach the current stream from.
    pub fn follow_reverse(self, path: Path) -> Self {
        self.with(Step::FollowReverse(path))
    }

    /// Applies a morphism transitively up to `max_depth` (zero for
    /// unbounded), collecting every value reached.
    pub fn follow_recursive(self, path: Path, max_depth: u64) -> Self {
        self.with(Step::FollowRecursive(path, max_depth))
    }

    /// Tags the `via` neighbor of each value, requiring the edge to exist.
    pub fn save(self, via: Value, tag: impl Into<String>) -> Self {
        self.with(Step::Save {
            via,
            tag: tag.into(),
            reverse: false,
            optional: false,
        })
    }

    pub fn save_reverse(self, via: Value, tag: impl Into<String>) -> Self {
        self.with(Step::Save {
            via,
            tag: tag.into(),
            reverse: true,
            optional: false,
        })
    }

    /// Tags the `via` neighbor when the edge exists, keeping the value
    /// either way.
    pub fn save_optional(self, via: Value, tag: impl Into<String>) -> Self {
        self.with(Step::Save {
            via,
            tag: tag.into(),
            reverse: false,
            optional: true,
        })
    }

    pub fn save_optional_reverse(self, via: Value, tag: impl Into<String>) -> Self {
        self.with(Step::Save {
            via,
            tag: tag.into(),
            reverse: true,
            optional: true,
        })
    }

    /// Tags each value with the predicates it is the subject (or object)
    /// of.
    pub fn save_predicates(self, tag: impl Into<String>, reverse: bool) -> Self {
        self.with(Step::SavePredicates {
            tag: tag.into(),
            reverse,
        })
    }

    /// Moves to the predicates of the quads the current values are
    /// subjects of.
    pub fn out_predicates(self) -> Self {
        self.with(Step::Predicates { reverse: false })
    }

    /// Moves to the predicates of the quads the current values are
    /// objects of.
    pub fn in_predicates(self) -> Self {
        self.with(Step::Predicates { reverse: true })
    }

    /// Moves to the labels of the quads the current values are subjects
    /// of.
    pub fn labels(self) -> Self {
        self.with(Step::Labels)
    }

    /// Removes the values the given path reaches.
    pub fn except(self, path: Path) -> Self {
        self.with(Step::Except(path))
    }

    /// Intersects with another path.
    pub fn and(self, path: Path) -> Self {
        self.with(Step::And(path))
    }

    /// Unions with another path.
    pub fn or(self, path: Path) -> Self {
        self.with(Step::Or(path))
    }

    /// Attaches the tags of `path` where it matches, keeping every value.
    pub fn optional(self, path: Path) -> Self {
        self.with(Step::Optional(path))
    }

    /// Applies ordered or regular-expression value filters.
    pub fn filters(self, filters: Vec<ValueFilter>) -> Self {
        self.with(Step::Filters(filters))
    }

    /// Applies one ordered comparison filter.
    pub fn filter(self, op: Operator, value: Value) -> Self {
        self.filters(vec![ValueFilter::Comparison(op, value)])
    }

    pub fn unique(self) -> Self {
        self.with(Step::Unique)
    }

    /// Orders the stream by value.
    pub fn order(self) -> Self {
        self.with(Step::Order)
    }

    pub fn limit(self, limit: i64) -> Self {
        self.with(Step::Limit(limit))
    }

    pub fn skip(self, offset: i64) -> Self {
        self.with(Step::Skip(offset))
    }

    /// Collapses the stream into its result count.
    pub fn count(self) -> Self {
        self.with(Step::Count)
    }

    /// The shape of this path anchored at its own start.
    pub fn to_shape(&self) -> Shape {
        let mut scopes = Scopes::default();
        self.anchored_shape(&mut scopes)
    }

    /// The shape of this path applied over an externally supplied base
    /// stream, used by recursive expansion.
    pub(crate) fn shape_on(&self, base: Shape) -> Shape {
        let mut scopes = Scopes::default();
        self.apply_steps(base, &mut scopes)
    }

    /// Lowers to an optimized cursor tree. The path must be bound.
    pub fn build_cursor(&self) -> Result<Box<dyn Cursor>, QueryError> {
        let Some(store) = &self.store else {
            return Err(QueryError::UnboundPath);
        };
        let shape = self.to_shape().optimized();
        let cursor = shape.lower(store)?;
        let (cursor, _) = cursor.optimize();
        Ok(cursor)
    }

    /// The store this path is bound to, if any.
    pub fn store(&self) -> Option<Arc<dyn QuadStore>> {
        self.store.clone()
    }

    fn anchored_shape(&self, scopes: &mut Scopes) -> Shape {
        let base = if self.start.is_empty() {
            Shape::AllEntities
        } else {
            Shape::Lookup(self.start.clone())
        };
        self.apply_steps(base, scopes)
    }

    /// The base a followed path continues from: its own anchor values
    /// intersect the incoming stream.
    fn followed_base(&self, base: Shape) -> Shape {
        if self.start.is_empty() {
            base
        } else {
            Shape::Intersect(vec![base, Shape::Lookup(self.start.clone())])
        }
    }

    fn apply_steps(&self, base: Shape, scopes: &mut Scopes) -> Shape {
        let scope = scopes.enter();
        let needs_origin = self
            .steps
            .iter()
            .any(|step| matches!(step, Step::Back(tag) if tag.is_empty()));
        let mut cur = if needs_origin {
            Shape::Save {
                from: Box::new(base),
                tags: vec![origin_tag(scope)],
            }
        } else {
            base
        };
        for step in &self.steps {
            cur = step.apply(cur, scope, scopes);
        }
        cur
    }
}

impl Step {
    fn apply(&self, cur: Shape, scope: usize, scopes: &mut Scopes) -> Shape {
        match self {
            Self::Is(values) => {
                Shape::Intersect(vec![cur, Shape::Lookup(values.clone())])
            }
            Self::Out { via, tags } => traverse(cur, via, tags, false),
            Self::In { via, tags } => traverse(cur, via, tags, true),
            Self::Both { via, tags } => Shape::Union(vec![
                traverse(cur.clone(), via, tags, false),
                traverse(cur, via, tags, true),
            ]),
            Self::Has {
                via,
                values,
                reverse,
            } => {
                let (node_dir, value_dir) = edge_directions(*reverse);
                let mut filters = Vec::new();
                if !via.is_empty() {
                    filters.push(QuadFilter {
                        dir: Direction::Predicate,
                        values: Box::new(Shape::Lookup(via.clone())),
                    });
                }
                if !values.is_empty() {
                    filters.push(QuadFilter {
                        dir: value_dir,
                        values: Box::new(Shape::Lookup(values.clone())),
                    });
                }
                Shape::Intersect(vec![
                    cur,
                    Shape::NodesFrom {
                        quads: Box::new(Shape::Quads(filters)),
                        dir: node_dir,
                    },
                ])
            }
            Self::Tag(tags) => Shape::Save {
                from: Box::new(cur),
                tags: tags.clone(),
            },
            Self::Back(tag) => {
                let tag = if tag.is_empty() {
                    origin_tag(scope)
                } else {
                    tag.clone()
                };
                Shape::Unique(Box::new(Shape::Bind {
                    from: Box::new(cur),
                    tag,
                }))
            }
            Self::Follow(path) => {
                let base = path.followed_base(cur);
                path.apply_steps(base, scopes)
            }
            Self::FollowReverse(path) => {
                let tag = origin_tag(scopes.enter());
                let base = path.followed_base(Shape::Save {
                    from: Box::new(Shape::AllNodes),
                    tags: vec![tag.clone()],
                });
                let reached = path.apply_steps(base, scopes);
                Shape::Unique(Box::new(Shape::Bind {
                    from: Box::new(Shape::Intersect(vec![reached, cur])),
                    tag,
                }))
            }
            Self::FollowRecursive(path, max_depth) => Shape::Recursive {
                from: Box::new(cur),
                morphism: path.clone(),
                max_depth: *max_depth,
            },
            Self::Save {
                via,
                tag,
                reverse,
                optional,
            } => {
                let (node_dir, value_dir) = edge_directions(*reverse);
                let neighbors = Shape::NodesFrom {
                    quads: Box::new(Shape::Quads(vec![
                        QuadFilter {
                            dir: Direction::Predicate,
                            values: Box::new(Shape::Lookup(vec![via.clone()])),
                        },
                        QuadFilter {
                            dir: value_dir,
                            values: Box::new(Shape::Save {
                                from: Box::new(Shape::AllNodes),
                                tags: vec![tag.clone()],
                            }),
                        },
                    ])),
                    dir: node_dir,
                };
                if *optional {
                    Shape::Optional {
                        from: Box::new(cur),
                        branch: Box::new(neighbors),
                    }
                } else {
                    Shape::Intersect(vec![cur, neighbors])
                }
            }
            Self::SavePredicates { tag, reverse } => Shape::SavePredicates {
                from: Box::new(cur),
                tag: tag.clone(),
                reverse: *reverse,
            },
            Self::Predicates { reverse } => {
                let (node_dir, _) = edge_directions(*reverse);
                Shape::Unique(Box::new(Shape::NodesFrom {
                    quads: Box::new(Shape::Quads(vec![QuadFilter {
                        dir: node_dir,
                        values: Box::new(cur),
                    }])),
                    dir: Direction::Predicate,
                }))
            }
            Self::Labels => Shape::Unique(Box::new(Shape::NodesFrom {
                quads: Box::new(Shape::Quads(vec![QuadFilter {
                    dir: Direction::Subject,
                    values: Box::new(cur),
                }])),
                dir: Direction::Label,
            })),
            Self::Except(path) => Shape::Except {
                from: Box::new(cur),
                exclude: Box::new(path.anchored_shape(scopes)),
            },
            Self::And(path) => {
                Shape::Intersect(vec![cur, path.anchored_shape(scopes)])
            }
            Self::Or(path) => Shape::Union(vec![cur, path.anchored_shape(scopes)]),
            Self::Optional(path) => {
                let tag = origin_tag(scopes.enter());
                let base = path.followed_base(Shape::Save {
                    from: Box::new(Shape::AllNodes),
                    tags: vec![tag.clone()],
                });
                let reached = path.apply_steps(base, scopes);
                Shape::Optional {
                    from: Box::new(cur),
                    branch: Box::new(Shape::Bind {
                        from: Box::new(reached),
                        tag,
                    }),
                }
            }
            Self::Filters(filters) => Shape::Filter {
                from: Box::new(cur),
                filters: filters.clone(),
            },
            Self::Unique => Shape::Unique(Box::new(cur)),
            Self::Order => Shape::Sort(Box::new(cur)),
            Self::Limit(limit) => Shape::Limit {
                from: Box::new(cur),
                limit: *limit,
            },
            Self::Skip(offset) => Shape::Skip {
                from: Box::new(cur),
                offset: *offset,
            },
            Self::Count => Shape::Count(Box::new(cur)),
        }
    }
}

fn edge_directions(reverse: bool) -> (Direction, Direction) {
    if reverse {
        (Direction::Object, Direction::Subject)
    } else {
        (Direction::Subject, Direction::Object)
    }
}

/// The shape of one hop: the quads constrained by the current stream on
/// one side and the predicates, the nodes on the far side as output.
fn traverse(cur: Shape, via: &[Value], tags: &[String], reverse: bool) -> Shape {
    let (near, far) = edge_directions(reverse);
    let mut filters = vec![QuadFilter {
        dir: near,
        values: Box::new(cur),
    }];
    let predicate_shape = if via.is_empty() {
        if tags.is_empty() {
            None
        } else {
            Some(Shape::AllNodes)
        }
    } else {
        Some(Shape::Lookup(via.to_vec()))
    };
    if let Some(shape) = predicate_shape {
        let shape = if tags.is_empty() {
            shape
        } else {
            Shape::Save {
                from: Box::new(shape),
                tags: tags.to_vec(),
            }
        };
        filters.push(QuadFilter {
            dir: Direction::Predicate,
            values: Box::new(shape),
        });
    }
    Shape::NodesFrom {
        quads: Box::new(Shape::Quads(filters)),
        dir: far,
    }
}
