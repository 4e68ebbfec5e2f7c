//! Decoding of JSON-LD value forms into model values, and the reverse for
//! document emission.

use crate::error::ParseError;
use crate::Namespaces;
use quadriga_model::vocab::xsd;
use quadriga_model::{Iri, Value};
use serde_json::{json, Map, Value as Json};

/// Decodes a quad-value position: literal JSON forms and the
/// `{@id, @value, @type, @language}` shapes.
pub fn decode_value(json: &Json, ns: &Namespaces) -> Result<Value, ParseError> {
    match json {
        Json::String(s) => Ok(Value::from(s.as_str())),
        Json::Bool(b) => Ok(Value::from(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f))
            } else {
                Err(ParseError::InvalidValue(n.to_string()))
            }
        }
        Json::Object(fields) => decode_value_object(fields, ns),
        other => Err(ParseError::InvalidValue(other.to_string())),
    }
}

fn decode_value_object(fields: &Map<String, Json>, ns: &Namespaces) -> Result<Value, ParseError> {
    if let Some(id) = fields.get("@id") {
        let Json::String(id) = id else {
            return Err(ParseError::InvalidValue(id.to_string()));
        };
        return decode_identifier(id, ns);
    }
    let Some(value) = fields.get("@value") else {
        return Err(ParseError::InvalidValue(Json::Object(fields.clone()).to_string()));
    };
    let Json::String(lexical) = value else {
        // Native @value forms carry their type already
        return decode_value(value, ns);
    };
    if let Some(Json::String(language)) = fields.get("@language") {
        return Value::new_lang_string(lexical.clone(), language.clone())
            .map_err(|e| ParseError::InvalidValue(e.to_string()));
    }
    if let Some(Json::String(datatype)) = fields.get("@type") {
        let datatype = ns.resolve(datatype);
        return Ok(match datatype.as_str() {
            xsd::STRING => Value::from(lexical.as_str()),
            xsd::INTEGER | xsd::INT => lexical
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| ParseError::InvalidValue(e.to_string()))?,
            xsd::DOUBLE | xsd::FLOAT => lexical
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| ParseError::InvalidValue(e.to_string()))?,
            xsd::BOOLEAN => lexical
                .parse::<bool>()
                .map(Value::from)
                .map_err(|e| ParseError::InvalidValue(e.to_string()))?,
            xsd::DATE_TIME => lexical
                .parse::<oxsdatatypes::DateTime>()
                .map(Value::DateTime)
                .map_err(|e| ParseError::InvalidValue(e.to_string()))?,
            _ => Value::new_typed(lexical.clone(), iri(&datatype)?),
        });
    }
    Ok(Value::from(lexical.as_str()))
}

/// Decodes an identifier: blank node labels keep their `_:` prefix, short
/// IRIs are resolved against the namespace map.
pub fn decode_identifier(id: &str, ns: &Namespaces) -> Result<Value, ParseError> {
    if let Some(label) = id.strip_prefix("_:") {
        return Ok(Value::BlankNode(quadriga_model::BlankNode::new_unchecked(
            label,
        )));
    }
    Ok(Value::Iri(iri(&ns.resolve(id))?))
}

pub(crate) fn iri(value: &str) -> Result<Iri, ParseError> {
    Iri::new(value).map_err(|error| ParseError::InvalidIri {
        iri: value.into(),
        error,
    })
}

/// The JSON-LD rendition of a value inside an emitted document.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Iri(iri) => json!({ "@id": iri.as_str() }),
        Value::BlankNode(node) => json!({ "@id": format!("_:{}", node.as_str()) }),
        Value::String(s) => Json::String(s.clone()),
        Value::LangString { value, language } => {
            json!({ "@value": value, "@language": language })
        }
        Value::TypedLiteral { value, datatype } => {
            json!({ "@value": value, "@type": datatype.as_str() })
        }
        Value::Integer(i) => Json::from(i64::from(*i)),
        Value::Double(d) => Json::from(f64::from(*d)),
        Value::Boolean(b) => Json::Bool((*b).into()),
        Value::DateTime(t) => json!({ "@value": t.to_string(), "@type": xsd::DATE_TIME }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_literal_forms() {
        let ns = Namespaces::default();
        assert_eq!(Value::from("a"), decode_value(&json!("a"), &ns).unwrap());
        assert_eq!(Value::from(3), decode_value(&json!(3), &ns).unwrap());
        assert_eq!(Value::from(true), decode_value(&json!(true), &ns).unwrap());
        assert_eq!(
            Value::Iri(Iri::new_unchecked("http://example.com/a")),
            decode_value(&json!({"@id": "http://example.com/a"}), &ns).unwrap()
        );
        assert_eq!(
            Value::new_lang_string("ville", "fr").unwrap(),
            decode_value(&json!({"@value": "ville", "@language": "fr"}), &ns).unwrap()
        );
        assert_eq!(
            Value::from(7),
            decode_value(
                &json!({"@value": "7", "@type": "http://www.w3.org/2001/XMLSchema#integer"}),
                &ns
            )
            .unwrap()
        );
    }

    #[test]
    fn resolves_prefixed_ids() {
        let mut ns = Namespaces::default();
        ns.set("ex", "http://example.com/");
        assert_eq!(
            Value::Iri(Iri::new_unchecked("http://example.com/alice")),
            decode_value(&json!({"@id": "ex:alice"}), &ns).unwrap()
        );
    }
}
