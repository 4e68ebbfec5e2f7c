//! The step-type registry: maps `@type` names to step constructors.
//!
//! The registry is an explicitly constructed object; [`StepRegistry::default`]
//! registers the built-in steps, and plugins may register more at startup.

use crate::error::ParseError;
use crate::steps;
use crate::{FinalStep, PathStep};
use quadriga_model::vocab::linkedql;
use serde_json::{Map, Value as Json};
use std::collections::HashMap;

pub type PathDecoder = fn(&Obj<'_>, &StepRegistry) -> Result<Box<dyn PathStep>, ParseError>;
pub type FinalDecoder = fn(&Obj<'_>, &StepRegistry) -> Result<Box<dyn FinalStep>, ParseError>;

pub struct StepRegistry {
    path_steps: HashMap<&'static str, PathDecoder>,
    final_steps: HashMap<&'static str, FinalDecoder>,
}

impl StepRegistry {
    /// An empty registry; use [`StepRegistry::default`] for the built-in
    /// step set.
    pub fn empty() -> Self {
        Self {
            path_steps: HashMap::new(),
            final_steps: HashMap::new(),
        }
    }

    pub fn register_path_step(&mut self, name: &'static str, decoder: PathDecoder) {
        self.path_steps.insert(name, decoder);
    }

    pub fn register_final_step(&mut self, name: &'static str, decoder: FinalDecoder) {
        self.final_steps.insert(name, decoder);
    }

    /// Decodes a step document into a path-producing step.
    pub fn decode_path(&self, json: &Json) -> Result<Box<dyn PathStep>, ParseError> {
        let (name, obj) = step_object(json)?;
        let Some(decoder) = self.path_steps.get(name) else {
            return Err(ParseError::UnknownStep(name.into()));
        };
        decoder(&obj, self)
    }

    /// Decodes the root of a query document. A path-producing root is
    /// wrapped to stream its raw values.
    pub fn decode_query(&self, json: &Json) -> Result<Box<dyn FinalStep>, ParseError> {
        let (name, obj) = step_object(json)?;
        if let Some(decoder) = self.final_steps.get(name) {
            return decoder(&obj, self);
        }
        if self.path_steps.contains_key(name) {
            return Ok(Box::new(steps::Values {
                from: self.decode_path(json)?,
            }));
        }
        Err(ParseError::UnknownStep(name.into()))
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        steps::register_default_steps(&mut registry);
        registry
    }
}

fn step_object(json: &Json) -> Result<(&str, Obj<'_>), ParseError> {
    let Json::Object(map) = json else {
        return Err(ParseError::NotAStep);
    };
    let Some(Json::String(type_name)) = map.get("@type") else {
        return Err(ParseError::NotAStep);
    };
    Ok((normalize_name(type_name), Obj { step: "step", map }))
}

/// The canonical step-name form is unprefixed; the `linkedql:` prefix and
/// the absolute namespace form are accepted and normalized away here.
pub(crate) fn normalize_name(name: &str) -> &str {
    name.strip_prefix("linkedql:")
        .or_else(|| name.strip_prefix(linkedql::NAMESPACE))
        .unwrap_or(name)
}

/// A field accessor over a step's JSON object, accepting both the
/// canonical unprefixed field names and their `linkedql:` prefixed form.
pub struct Obj<'a> {
    step: &'static str,
    map: &'a Map<String, Json>,
}

impl<'a> Obj<'a> {
    /// An accessor over a raw JSON object, for nested non-step shapes like
    /// filter operators.
    pub fn from_map(step: &'static str, map: &'a Map<String, Json>) -> Obj<'a> {
        Obj { step, map }
    }

    /// Rebinds the accessor to the step name used in error messages.
    pub fn for_step(&self, step: &'static str) -> Obj<'a> {
        Obj {
            step,
            map: self.map,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'a Json> {
        self.map
            .get(name)
            .or_else(|| self.map.get(&format!("linkedql:{name}")))
    }

    pub fn require(&self, name: &'static str) -> Result<&'a Json, ParseError> {
        self.field(name).ok_or(ParseError::MissingField {
            step: self.step,
            field: name,
        })
    }

    /// The required sub-step under `name`.
    pub fn step(
        &self,
        registry: &StepRegistry,
        name: &'static str,
    ) -> Result<Box<dyn PathStep>, ParseError> {
        registry.decode_path(self.require(name)?)
    }

    /// A list-valued field; a single value decodes as a one-element list
    /// and an absent field as the empty list.
    pub fn json_list(&self, name: &str) -> Vec<Json> {
        match self.field(name) {
            None | Some(Json::Null) => Vec::new(),
            Some(Json::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        }
    }

    pub fn string(&self, name: &'static str) -> Result<String, ParseError> {
        match self.require(name)? {
            Json::String(s) => Ok(s.clone()),
            _ => Err(self.wrong_type(name, "a string")),
        }
    }

    pub fn opt_string(&self, name: &'static str) -> Result<Option<String>, ParseError> {
        match self.field(name) {
            None | Some(Json::Null) => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(name, "a string")),
        }
    }

    pub fn int(&self, name: &'static str) -> Result<i64, ParseError> {
        match self.require(name)? {
            Json::Number(n) => n.as_i64().ok_or_else(|| self.wrong_type(name, "an integer")),
            _ => Err(self.wrong_type(name, "an integer")),
        }
    }

    pub fn opt_int(&self, name: &'static str) -> Result<Option<i64>, ParseError> {
        match self.field(name) {
            None | Some(Json::Null) => Ok(None),
            Some(Json::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(name, "an integer")),
            Some(_) => Err(self.wrong_type(name, "an integer")),
        }
    }

    pub fn opt_bool(&self, name: &'static str) -> Result<bool, ParseError> {
        match self.field(name) {
            None | Some(Json::Null) => Ok(false),
            Some(Json::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong_type(name, "a boolean")),
        }
    }

    /// A list of strings (tag names, selected properties).
    pub fn string_list(&self, name: &'static str) -> Result<Vec<String>, ParseError> {
        self.json_list(name)
            .into_iter()
            .map(|item| match item {
                Json::String(s) => Ok(s),
                Json::Object(map) => match map.get("@id") {
                    Some(Json::String(s)) => Ok(s.clone()),
                    _ => Err(self.wrong_type(name, "strings or @id objects")),
                },
                _ => Err(self.wrong_type(name, "strings or @id objects")),
            })
            .collect()
    }

    pub fn wrong_type(&self, field: &'static str, expected: &'static str) -> ParseError {
        ParseError::WrongFieldType {
            step: self.step,
            field,
            expected,
        }
    }
}
