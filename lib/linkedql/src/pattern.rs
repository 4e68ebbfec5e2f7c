//! The `Match` step: lowering a JSON-LD sub-graph pattern onto a path.
//!
//! The pattern parses into quads grouped by subject. The root group
//! constrains the current stream through `Is`/`Has` chains; a nested
//! entity becomes a followed morphism that returns to the outer entity
//! through `Back("")`. An entity without properties asserts bare existence
//! through the canonical ⟨s, rdf:type, rdfs:Resource⟩ quad.

use crate::error::{EvaluationError, ParseError};
use crate::json::{decode_identifier, decode_value, iri};
use crate::Namespaces;
use quadriga::path::Path;
use quadriga_model::vocab::{rdf, rdfs};
use quadriga_model::Value;
use serde_json::{Map, Value as Json};

struct Entity {
    id: Option<Value>,
    properties: Vec<(Value, PatternValue)>,
}

enum PatternValue {
    Value(Value),
    Entity(Entity),
}

pub(crate) fn apply_pattern(
    path: Path,
    pattern: &Json,
    ns: &Namespaces,
) -> Result<Path, EvaluationError> {
    let entities = parse_entities(pattern, ns)?;
    let mut path = path;
    for entity in &entities {
        path = constrain(path, entity)?;
    }
    Ok(path)
}

fn parse_entities(pattern: &Json, ns: &Namespaces) -> Result<Vec<Entity>, EvaluationError> {
    match pattern {
        Json::Array(items) => items
            .iter()
            .map(|item| parse_entity_json(item, ns))
            .collect(),
        single => Ok(vec![parse_entity_json(single, ns)?]),
    }
}

fn parse_entity_json(json: &Json, ns: &Namespaces) -> Result<Entity, EvaluationError> {
    let Json::Object(map) = json else {
        return Err(ParseError::InvalidValue(json.to_string()).into());
    };
    parse_entity(map, ns)
}

fn parse_entity(map: &Map<String, Json>, ns: &Namespaces) -> Result<Entity, EvaluationError> {
    let id = match map.get("@id") {
        Some(Json::String(id)) => Some(decode_identifier(id, ns)?),
        Some(other) => return Err(ParseError::InvalidValue(other.to_string()).into()),
        None => None,
    };
    let mut properties = Vec::new();
    for (key, value) in map {
        if key.starts_with('@') {
            continue;
        }
        let predicate = decode_identifier(key, ns)?;
        let values = match value {
            Json::Array(items) => items.clone(),
            single => vec![single.clone()],
        };
        for value in values {
            properties.push((predicate.clone(), parse_pattern_value(&value, ns)?));
        }
    }
    if properties.is_empty() {
        // The canonical existence assertion
        properties.push((
            Value::Iri(iri(rdf::TYPE)?),
            PatternValue::Value(Value::Iri(iri(rdfs::RESOURCE)?)),
        ));
    }
    Ok(Entity { id, properties })
}

fn parse_pattern_value(json: &Json, ns: &Namespaces) -> Result<PatternValue, EvaluationError> {
    if let Json::Object(map) = json {
        let has_properties = map.keys().any(|key| !key.starts_with('@'));
        if has_properties {
            return Ok(PatternValue::Entity(parse_entity(map, ns)?));
        }
    }
    Ok(PatternValue::Value(decode_value(json, ns)?))
}

fn is_existence(predicate: &Value, value: &PatternValue) -> bool {
    let PatternValue::Value(Value::Iri(object)) = value else {
        return false;
    };
    matches!(predicate, Value::Iri(p) if p.as_str() == rdf::TYPE)
        && object.as_str() == rdfs::RESOURCE
}

fn constrain(path: Path, entity: &Entity) -> Result<Path, EvaluationError> {
    let mut path = match &entity.id {
        Some(id) => path.is([id.clone()]),
        None => path,
    };
    for (predicate, value) in &entity.properties {
        if is_existence(predicate, value) {
            continue;
        }
        path = match value {
            PatternValue::Value(value) => path.has([predicate.clone()], [value.clone()]),
            PatternValue::Entity(nested) => {
                let hop = Path::morphism().out([predicate.clone()]);
                let morphism = constrain(hop, nested)?.back("");
                path.follow(morphism)
            }
        };
    }
    Ok(path)
}
