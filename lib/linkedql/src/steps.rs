//! The built-in LinkedQL steps.
//!
//! Every step is a plain struct decoded from its JSON-LD object. Path
//! steps lower to a [`Path`]; final steps produce results. Value and IRI
//! fields stay raw JSON until build time so that `Context` steps can still
//! change the namespace map they are resolved against.

use crate::json::{decode_identifier, decode_value};
use crate::pattern;
use crate::registry::{Obj, StepRegistry};
use crate::results::{documents, QueryResults, SolutionStream, ValueStream};
use crate::{BuildContext, EvaluationError, FinalStep, ParseError, PathStep};
use quadriga::iterate::compare::Operator;
use quadriga::iterate::Cancellation;
use quadriga::path::Path;
use quadriga::shape::ValueFilter;
use quadriga_model::Value;
use serde_json::Value as Json;
use std::sync::Arc;

pub(crate) fn register_default_steps(registry: &mut StepRegistry) {
    registry.register_path_step("Vertex", Vertex::decode);
    registry.register_path_step("Morphism", Morphism::decode);
    registry.register_path_step("View", View::decode);
    registry.register_path_step("ViewReverse", ViewReverse::decode);
    registry.register_path_step("ViewBoth", ViewBoth::decode);
    registry.register_path_step("As", As::decode);
    registry.register_path_step("Back", Back::decode);
    registry.register_path_step("Has", Has::decode);
    registry.register_path_step("HasReverse", HasReverse::decode);
    registry.register_path_step("Filter", Filter::decode);
    registry.register_path_step("Intersect", Intersect::decode);
    registry.register_path_step("Union", Union::decode);
    registry.register_path_step("Difference", Difference::decode);
    registry.register_path_step("Follow", Follow::decode);
    registry.register_path_step("FollowReverse", FollowReverse::decode);
    registry.register_path_step("FollowRecursive", FollowRecursive::decode);
    registry.register_path_step("Limit", Limit::decode);
    registry.register_path_step("Skip", Skip::decode);
    registry.register_path_step("Unique", Unique::decode);
    registry.register_path_step("Order", Order::decode);
    registry.register_path_step("Count", Count::decode);
    registry.register_path_step("Labels", Labels::decode);
    registry.register_path_step("Properties", Properties::decode);
    registry.register_path_step("ReverseProperties", ReverseProperties::decode);
    registry.register_path_step("PropertyNames", PropertyNames::decode);
    registry.register_path_step("ReversePropertyNames", ReversePropertyNames::decode);
    registry.register_path_step("PropertyNamesAs", PropertyNamesAs::decode);
    registry.register_path_step("Context", Context::decode);
    registry.register_path_step("Match", Match::decode);
    registry.register_final_step("Select", Select::decode);
    registry.register_final_step("SelectFirst", SelectFirst::decode);
    registry.register_final_step("Value", Values::decode);
    registry.register_final_step("Documents", Documents::decode);
}

/// Resolves a list of raw JSON quad values.
fn build_values(raw: &[Json], ctx: &BuildContext) -> Result<Vec<Value>, EvaluationError> {
    raw.iter()
        .map(|json| decode_value(json, &ctx.ns).map_err(EvaluationError::from))
        .collect()
}

/// Resolves a list of property names: bare strings and `@id` objects are
/// identifiers, never string literals.
fn build_properties(raw: &[Json], ctx: &BuildContext) -> Result<Vec<Value>, EvaluationError> {
    raw.iter()
        .map(|json| {
            let id = match json {
                Json::String(s) => s.as_str(),
                Json::Object(map) => match map.get("@id") {
                    Some(Json::String(s)) => s.as_str(),
                    _ => return Err(ParseError::InvalidValue(json.to_string()).into()),
                },
                _ => return Err(ParseError::InvalidValue(json.to_string()).into()),
            };
            decode_identifier(id, &ctx.ns).map_err(EvaluationError::from)
        })
        .collect()
}

/// The starting step: all entities, or a fixed set of values.
#[derive(Debug)]
pub struct Vertex {
    values: Vec<Json>,
}

impl Vertex {
    fn decode(obj: &Obj<'_>, _registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Vertex");
        Ok(Box::new(Self {
            values: obj.json_list("values"),
        }))
    }
}

impl PathStep for Vertex {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let values = build_values(&self.values, ctx)?;
        Ok(Path::start(Arc::clone(&ctx.store), values))
    }
}

/// The starting step of a reusable traversal template.
#[derive(Debug)]
pub struct Morphism;

impl Morphism {
    fn decode(_obj: &Obj<'_>, _registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        Ok(Box::new(Self))
    }
}

impl PathStep for Morphism {
    fn build_path(&self, _ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(Path::morphism())
    }
}

macro_rules! view_step {
    ($name:ident, $doc:literal, $apply:ident) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            from: Box<dyn PathStep>,
            properties: Vec<Json>,
        }

        impl $name {
            fn decode(
                obj: &Obj<'_>,
                registry: &StepRegistry,
            ) -> Result<Box<dyn PathStep>, ParseError> {
                let obj = obj.for_step(stringify!($name));
                Ok(Box::new(Self {
                    from: obj.step(registry, "from")?,
                    properties: obj.json_list("properties"),
                }))
            }
        }

        impl PathStep for $name {
            fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
                let path = self.from.build_path(ctx)?;
                let properties = build_properties(&self.properties, ctx)?;
                Ok(path.$apply(properties))
            }
        }
    };
}

view_step!(View, "Follows the given properties, subject to object.", out);
view_step!(
    ViewReverse,
    "Follows the given properties, object to subject.",
    in_
);
view_step!(ViewBoth, "Follows the given properties both ways.", both);

/// Names the current position.
#[derive(Debug)]
pub struct As {
    from: Box<dyn PathStep>,
    name: String,
}

impl As {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("As");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            name: obj.string("name")?,
        }))
    }
}

impl PathStep for As {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(self.from.build_path(ctx)?.tag([self.name.clone()]))
    }
}

/// Returns to a previously named position; the empty (or absent) name is
/// the origin of the current path scope.
#[derive(Debug)]
pub struct Back {
    from: Box<dyn PathStep>,
    name: String,
}

impl Back {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Back");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            name: obj.opt_string("name")?.unwrap_or_default(),
        }))
    }
}

impl PathStep for Back {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(self.from.build_path(ctx)?.back(self.name.clone()))
    }
}

macro_rules! has_step {
    ($name:ident, $doc:literal, $apply:ident) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            from: Box<dyn PathStep>,
            property: Json,
            values: Vec<Json>,
        }

        impl $name {
            fn decode(
                obj: &Obj<'_>,
                registry: &StepRegistry,
            ) -> Result<Box<dyn PathStep>, ParseError> {
                let obj = obj.for_step(stringify!($name));
                Ok(Box::new(Self {
                    from: obj.step(registry, "from")?,
                    property: obj.require("property")?.clone(),
                    values: obj.json_list("values"),
                }))
            }
        }

        impl PathStep for $name {
            fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
                let path = self.from.build_path(ctx)?;
                let property = build_properties(std::slice::from_ref(&self.property), ctx)?;
                let values = build_values(&self.values, ctx)?;
                Ok(path.$apply(property, values))
            }
        }
    };
}

has_step!(
    Has,
    "Keeps the values with the given outgoing property edge.",
    has
);
has_step!(
    HasReverse,
    "Keeps the values with the given incoming property edge.",
    has_reverse
);

/// A decoded filter operator.
#[derive(Debug)]
enum FilterSpec {
    Compare(Operator, Json),
    Regexp { pattern: String, include_iris: bool },
}

/// Applies a value filter to the stream.
#[derive(Debug)]
pub struct Filter {
    from: Box<dyn PathStep>,
    spec: FilterSpec,
}

impl Filter {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Filter");
        let filter = obj.require("filter")?;
        let Json::Object(map) = filter else {
            return Err(obj.wrong_type("filter", "an operator object"));
        };
        let Some(Json::String(kind)) = map.get("@type") else {
            return Err(obj.wrong_type("filter", "an operator object"));
        };
        let operator = Obj::from_map("Filter", map);
        let spec = match crate::registry::normalize_name(kind) {
            "LessThan" => FilterSpec::Compare(Operator::LessThan, operator.require("value")?.clone()),
            "LessThanEquals" => {
                FilterSpec::Compare(Operator::LessThanEquals, operator.require("value")?.clone())
            }
            "GreaterThan" => {
                FilterSpec::Compare(Operator::GreaterThan, operator.require("value")?.clone())
            }
            "GreaterThanEquals" => FilterSpec::Compare(
                Operator::GreaterThanEquals,
                operator.require("value")?.clone(),
            ),
            "RegExp" => FilterSpec::Regexp {
                pattern: operator.string("pattern")?,
                include_iris: operator.opt_bool("includeIRIs")?,
            },
            other => return Err(ParseError::UnknownStep(other.into())),
        };
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            spec,
        }))
    }
}

impl PathStep for Filter {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let path = self.from.build_path(ctx)?;
        Ok(match &self.spec {
            FilterSpec::Compare(op, value) => {
                path.filter(*op, decode_value(value, &ctx.ns)?)
            }
            FilterSpec::Regexp {
                pattern,
                include_iris,
            } => path.filters(vec![ValueFilter::Regexp {
                pattern: pattern.clone(),
                include_iris: *include_iris,
            }]),
        })
    }
}

macro_rules! combine_step {
    ($name:ident, $doc:literal, $apply:ident) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            from: Box<dyn PathStep>,
            steps: Vec<Box<dyn PathStep>>,
        }

        impl $name {
            fn decode(
                obj: &Obj<'_>,
                registry: &StepRegistry,
            ) -> Result<Box<dyn PathStep>, ParseError> {
                let obj = obj.for_step(stringify!($name));
                let steps = obj
                    .json_list("steps")
                    .iter()
                    .map(|json| registry.decode_path(json))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(Self {
                    from: obj.step(registry, "from")?,
                    steps,
                }))
            }
        }

        impl PathStep for $name {
            fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
                let mut path = self.from.build_path(ctx)?;
                for step in &self.steps {
                    path = path.$apply(step.build_path(ctx)?);
                }
                Ok(path)
            }
        }
    };
}

combine_step!(Intersect, "Intersects with the given paths.", and);
combine_step!(Union, "Unions with the given paths.", or);
combine_step!(Difference, "Removes the values the given paths reach.", except);

/// Applies a followed morphism from the current position.
#[derive(Debug)]
pub struct Follow {
    from: Box<dyn PathStep>,
    followed: Box<dyn PathStep>,
}

impl Follow {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Follow");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            followed: obj.step(registry, "followed")?,
        }))
    }
}

impl PathStep for Follow {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let path = self.from.build_path(ctx)?;
        Ok(path.follow(self.followed.build_path(ctx)?))
    }
}

/// Applies a followed morphism against its direction.
#[derive(Debug)]
pub struct FollowReverse {
    from: Box<dyn PathStep>,
    followed: Box<dyn PathStep>,
}

impl FollowReverse {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("FollowReverse");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            followed: obj.step(registry, "followed")?,
        }))
    }
}

impl PathStep for FollowReverse {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let path = self.from.build_path(ctx)?;
        Ok(path.follow_reverse(self.followed.build_path(ctx)?))
    }
}

/// Applies a followed morphism transitively, collecting everything it
/// reaches.
#[derive(Debug)]
pub struct FollowRecursive {
    from: Box<dyn PathStep>,
    followed: Box<dyn PathStep>,
    max_depth: u64,
}

impl FollowRecursive {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("FollowRecursive");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            followed: obj.step(registry, "followed")?,
            max_depth: obj.opt_int("maxDepth")?.unwrap_or(0).max(0) as u64,
        }))
    }
}

impl PathStep for FollowRecursive {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let path = self.from.build_path(ctx)?;
        Ok(path.follow_recursive(self.followed.build_path(ctx)?, self.max_depth))
    }
}

macro_rules! adapter_step {
    ($name:ident, $doc:literal, |$path:ident, $self_:ident| $build:expr, { $($field:ident : $decode:expr),* }) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            from: Box<dyn PathStep>,
            $($field: i64,)*
        }

        impl $name {
            fn decode(
                obj: &Obj<'_>,
                registry: &StepRegistry,
            ) -> Result<Box<dyn PathStep>, ParseError> {
                let obj = obj.for_step(stringify!($name));
                Ok(Box::new(Self {
                    from: obj.step(registry, "from")?,
                    $($field: obj.int($decode)?,)*
                }))
            }
        }

        impl PathStep for $name {
            fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
                let $path = self.from.build_path(ctx)?;
                let $self_ = self;
                Ok($build)
            }
        }
    };
}

adapter_step!(Limit, "Truncates the stream.", |path, s| path.limit(s.limit), { limit: "limit" });
adapter_step!(Skip, "Discards the leading results.", |path, s| path.skip(s.offset), { offset: "offset" });
adapter_step!(Unique, "Removes duplicate results.", |path, _s| path.unique(), {});
adapter_step!(Order, "Orders the stream by value.", |path, _s| path.order(), {});
adapter_step!(Count, "Collapses the stream into its result count.", |path, _s| path.count(), {});
adapter_step!(Labels, "Moves to the labels of the current quads.", |path, _s| path.labels(), {});

macro_rules! properties_step {
    ($name:ident, $doc:literal, $apply:ident) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            from: Box<dyn PathStep>,
            names: Vec<Json>,
        }

        impl $name {
            fn decode(
                obj: &Obj<'_>,
                registry: &StepRegistry,
            ) -> Result<Box<dyn PathStep>, ParseError> {
                let obj = obj.for_step(stringify!($name));
                Ok(Box::new(Self {
                    from: obj.step(registry, "from")?,
                    names: obj.json_list("names"),
                }))
            }
        }

        impl PathStep for $name {
            fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
                let mut path = self.from.build_path(ctx)?;
                for property in build_properties(&self.names, ctx)? {
                    let tag = property.as_iri().map_or_else(
                        || property.to_string(),
                        |iri| iri.as_str().to_owned(),
                    );
                    path = path.$apply(property, tag);
                }
                Ok(path)
            }
        }
    };
}

properties_step!(
    Properties,
    "Tags the given properties of every value, where present.",
    save_optional
);
properties_step!(
    ReverseProperties,
    "Tags the given reverse properties of every value, where present.",
    save_optional_reverse
);

/// Moves to the names of the outgoing properties.
#[derive(Debug)]
pub struct PropertyNames {
    from: Box<dyn PathStep>,
}

impl PropertyNames {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("PropertyNames");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
        }))
    }
}

impl PathStep for PropertyNames {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(self.from.build_path(ctx)?.out_predicates())
    }
}

/// Moves to the names of the incoming properties.
#[derive(Debug)]
pub struct ReversePropertyNames {
    from: Box<dyn PathStep>,
}

impl ReversePropertyNames {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("ReversePropertyNames");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
        }))
    }
}

impl PathStep for ReversePropertyNames {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(self.from.build_path(ctx)?.in_predicates())
    }
}

/// Tags every value with its outgoing property names.
#[derive(Debug)]
pub struct PropertyNamesAs {
    from: Box<dyn PathStep>,
    tag: String,
}

impl PropertyNamesAs {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("PropertyNamesAs");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            tag: obj.string("tag")?,
        }))
    }
}

impl PathStep for PropertyNamesAs {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        Ok(self
            .from
            .build_path(ctx)?
            .save_predicates(self.tag.clone(), false))
    }
}

/// Extends the namespace map for the steps beneath it.
#[derive(Debug)]
pub struct Context {
    from: Box<dyn PathStep>,
    context: Json,
}

impl Context {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Context");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            context: obj.require("context")?.clone(),
        }))
    }
}

impl PathStep for Context {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let saved = ctx.ns.clone();
        ctx.ns.extend_from_json(&self.context);
        let path = self.from.build_path(ctx);
        ctx.ns = saved;
        path
    }
}

/// Matches a JSON-LD sub-graph pattern against the current values.
#[derive(Debug)]
pub struct Match {
    from: Box<dyn PathStep>,
    pattern: Json,
}

impl Match {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn PathStep>, ParseError> {
        let obj = obj.for_step("Match");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            pattern: obj.require("pattern")?.clone(),
        }))
    }
}

impl PathStep for Match {
    fn build_path(&self, ctx: &mut BuildContext) -> Result<Path, EvaluationError> {
        let path = self.from.build_path(ctx)?;
        pattern::apply_pattern(path, &self.pattern, &ctx.ns)
    }
}

/// Streams flat tag tuples.
#[derive(Debug)]
pub struct Select {
    from: Box<dyn PathStep>,
    tags: Vec<String>,
}

impl Select {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn FinalStep>, ParseError> {
        let obj = obj.for_step("Select");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            tags: obj.string_list("tags")?,
        }))
    }
}

impl FinalStep for Select {
    fn execute(
        &self,
        ctx: &mut BuildContext,
        cancel: &Cancellation,
    ) -> Result<QueryResults, EvaluationError> {
        let cursor = self.from.build_path(ctx)?.build_cursor()?;
        Ok(QueryResults::Solutions(SolutionStream::new(
            cursor,
            Arc::clone(&ctx.store),
            cancel.clone(),
            selection(&self.tags),
        )))
    }
}

/// Streams at most the first tag tuple.
#[derive(Debug)]
pub struct SelectFirst {
    from: Box<dyn PathStep>,
    tags: Vec<String>,
}

impl SelectFirst {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn FinalStep>, ParseError> {
        let obj = obj.for_step("SelectFirst");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
            tags: obj.string_list("tags")?,
        }))
    }
}

impl FinalStep for SelectFirst {
    fn execute(
        &self,
        ctx: &mut BuildContext,
        cancel: &Cancellation,
    ) -> Result<QueryResults, EvaluationError> {
        let cursor = self.from.build_path(ctx)?.limit(1).build_cursor()?;
        Ok(QueryResults::Solutions(SolutionStream::new(
            cursor,
            Arc::clone(&ctx.store),
            cancel.clone(),
            selection(&self.tags),
        )))
    }
}

fn selection(tags: &[String]) -> Option<Vec<String>> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.to_vec())
    }
}

/// Streams the raw values of the compiled path.
#[derive(Debug)]
pub struct Values {
    pub(crate) from: Box<dyn PathStep>,
}

impl Values {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn FinalStep>, ParseError> {
        let obj = obj.for_step("Value");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
        }))
    }
}

impl FinalStep for Values {
    fn execute(
        &self,
        ctx: &mut BuildContext,
        cancel: &Cancellation,
    ) -> Result<QueryResults, EvaluationError> {
        let cursor = self.from.build_path(ctx)?.build_cursor()?;
        Ok(QueryResults::Values(ValueStream::new(
            cursor,
            Arc::clone(&ctx.store),
            cancel.clone(),
        )))
    }
}

/// Assembles JSON-LD documents out of the tagged bindings, grouped by
/// subject.
#[derive(Debug)]
pub struct Documents {
    from: Box<dyn PathStep>,
}

impl Documents {
    fn decode(obj: &Obj<'_>, registry: &StepRegistry) -> Result<Box<dyn FinalStep>, ParseError> {
        let obj = obj.for_step("Documents");
        Ok(Box::new(Self {
            from: obj.step(registry, "from")?,
        }))
    }
}

impl FinalStep for Documents {
    fn execute(
        &self,
        ctx: &mut BuildContext,
        cancel: &Cancellation,
    ) -> Result<QueryResults, EvaluationError> {
        let cursor = self.from.build_path(ctx)?.build_cursor()?;
        let stream = SolutionStream::new(cursor, Arc::clone(&ctx.store), cancel.clone(), None);
        Ok(QueryResults::Documents(documents(stream)?))
    }
}
