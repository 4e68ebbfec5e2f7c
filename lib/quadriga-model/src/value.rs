use crate::{BlankNode, Iri};
use crate::vocab::xsd;
use oxsdatatypes::{Boolean, DateTime, Double, Integer};
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Write;
use std::hash::{Hash, Hasher};
use std::mem::discriminant;

pub use oxilangtag::LanguageTagParseError;

/// A node value: the sum of every kind of data a quad position may hold.
///
/// Two sub-kinds carry special meaning for stores: *identifiers*
/// ([`Value::Iri`] and [`Value::BlankNode`]) and literals (everything else).
///
/// The default string formatter is returning an N-Quads compatible
/// representation:
/// ```
/// use quadriga_model::Value;
///
/// assert_eq!("\"foo\"", Value::from("foo").to_string());
/// assert_eq!(
///     "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>",
///     Value::from(1).to_string()
/// );
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// An absolute IRI.
    Iri(Iri),
    /// A graph-scoped anonymous identifier.
    BlankNode(BlankNode),
    /// A plain string literal.
    String(String),
    /// A language-tagged string literal.
    LangString {
        value: String,
        language: String,
    },
    /// A literal tagged with a datatype IRI the library has no native
    /// representation for.
    TypedLiteral {
        value: String,
        datatype: Iri,
    },
    Integer(Integer),
    Double(Double),
    Boolean(Boolean),
    DateTime(DateTime),
}

impl Value {
    /// Builds a language-tagged string, validating the language tag.
    ///
    /// The tag is case-folded to lowercase as mandated by BCP47.
    pub fn new_lang_string(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, LanguageTagParseError> {
        let mut language = language.into();
        oxilangtag::LanguageTag::parse(language.as_str())?;
        if language.contains(|c: char| c.is_ascii_uppercase()) {
            language.make_ascii_lowercase();
        }
        Ok(Self::LangString {
            value: value.into(),
            language,
        })
    }

    /// Builds a typed literal without checking the lexical form against the
    /// datatype.
    #[inline]
    pub fn new_typed(value: impl Into<String>, datatype: Iri) -> Self {
        Self::TypedLiteral {
            value: value.into(),
            datatype,
        }
    }

    /// Is this value an identifier (IRI or blank node)?
    #[inline]
    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::Iri(_) | Self::BlankNode(_))
    }

    #[inline]
    pub fn as_iri(&self) -> Option<&Iri> {
        if let Self::Iri(iri) = self {
            Some(iri)
        } else {
            None
        }
    }

    /// The string content of string-kind literals, used by text filters.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::LangString { value, .. } => Some(value),
            Self::TypedLiteral { value, datatype } if *datatype == *xsd::STRING => Some(value),
            _ => None,
        }
    }

    /// The datatype IRI of this value if it is a literal.
    pub fn datatype(&self) -> Option<&str> {
        match self {
            Self::Iri(_) | Self::BlankNode(_) => None,
            Self::String(_) => Some(xsd::STRING),
            Self::LangString { .. } => Some(crate::vocab::rdf::LANG_STRING),
            Self::TypedLiteral { datatype, .. } => Some(datatype.as_str()),
            Self::Integer(_) => Some(xsd::INTEGER),
            Self::Double(_) => Some(xsd::DOUBLE),
            Self::Boolean(_) => Some(xsd::BOOLEAN),
            Self::DateTime(_) => Some(xsd::DATE_TIME),
        }
    }

    /// Compares two values of the same family.
    ///
    /// Integers and doubles compare across each other, strings with strings
    /// (ignoring the language tag), IRIs and blank nodes by codepoint, and
    /// timestamps with timestamps. Everything else is incomparable and
    /// returns `None`, so ordered filters skip mixed-kind data instead of
    /// inventing an ordering for it.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Double(b)) => Double::from(*a).partial_cmp(b),
            (Self::Double(a), Self::Integer(b)) => a.partial_cmp(&Double::from(*b)),
            (Self::Double(a), Self::Double(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::LangString { value: b, .. }) => Some(a.as_str().cmp(b)),
            (Self::LangString { value: a, .. }, Self::String(b)) => Some(a.cmp(b)),
            (
                Self::LangString { value: a, .. },
                Self::LangString { value: b, .. },
            ) => Some(a.cmp(b)),
            (Self::Iri(a), Self::Iri(b)) => Some(a.as_str().cmp(b.as_str())),
            (Self::BlankNode(a), Self::BlankNode(b)) => Some(a.as_str().cmp(b.as_str())),
            (Self::DateTime(a), Self::DateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// A total order over all values, used when sorting heterogeneous
    /// result streams: family rank first, [`Value::compare`] within a
    /// family, canonical form as the tie breaker.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::BlankNode(_) => 0,
                Value::Iri(_) => 1,
                Value::String(_) | Value::LangString { .. } | Value::TypedLiteral { .. } => 2,
                Value::Boolean(_) => 3,
                Value::Integer(_) | Value::Double(_) => 4,
                Value::DateTime(_) => 5,
            }
        }
        rank(self).cmp(&rank(other)).then_with(|| {
            self.compare(other)
                .unwrap_or_else(|| self.to_string().cmp(&other.to_string()))
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::BlankNode(node) => node.fmt(f),
            Self::String(value) => print_quoted_str(value, f),
            Self::LangString { value, language } => {
                print_quoted_str(value, f)?;
                write!(f, "@{language}")
            }
            Self::TypedLiteral { value, datatype } => {
                print_quoted_str(value, f)?;
                write!(f, "^^{datatype}")
            }
            Self::Integer(value) => write!(f, "\"{value}\"^^<{}>", xsd::INTEGER),
            Self::Double(value) => write!(f, "\"{value}\"^^<{}>", xsd::DOUBLE),
            Self::Boolean(value) => write!(f, "\"{value}\"^^<{}>", xsd::BOOLEAN),
            Self::DateTime(value) => write!(f, "\"{value}\"^^<{}>", xsd::DATE_TIME),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
            && match (self, other) {
                (Self::Iri(a), Self::Iri(b)) => a == b,
                (Self::BlankNode(a), Self::BlankNode(b)) => a == b,
                (Self::String(a), Self::String(b)) => a == b,
                (
                    Self::LangString { value: va, language: la },
                    Self::LangString { value: vb, language: lb },
                ) => va == vb && la == lb,
                (
                    Self::TypedLiteral { value: va, datatype: da },
                    Self::TypedLiteral { value: vb, datatype: db },
                ) => va == vb && da == db,
                (Self::Integer(a), Self::Integer(b)) => a == b,
                // Doubles compare by identity, keeping NaN equal to itself
                (Self::Double(a), Self::Double(b)) => {
                    f64::from(*a).to_bits() == f64::from(*b).to_bits()
                }
                (Self::Boolean(a), Self::Boolean(b)) => a == b,
                (Self::DateTime(a), Self::DateTime(b)) => a == b,
                _ => false,
            }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Self::Iri(iri) => iri.hash(state),
            Self::BlankNode(node) => node.hash(state),
            Self::String(value) => value.hash(state),
            Self::LangString { value, language } => {
                value.hash(state);
                language.hash(state);
            }
            Self::TypedLiteral { value, datatype } => {
                value.hash(state);
                datatype.hash(state);
            }
            Self::Integer(value) => i64::from(*value).hash(state),
            Self::Double(value) => f64::from(*value).to_bits().hash(state),
            Self::Boolean(value) => bool::from(*value).hash(state),
            Self::DateTime(value) => value.hash(state),
        }
    }
}

impl From<Iri> for Value {
    #[inline]
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Value {
    #[inline]
    fn from(node: BlankNode) -> Self {
        Self::BlankNode(node)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Double(value.into())
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Boolean(value.into())
    }
}

impl From<DateTime> for Value {
    #[inline]
    fn from(value: DateTime) -> Self {
        Self::DateTime(value)
    }
}

#[inline]
pub(crate) fn print_quoted_str(string: &str, f: &mut impl Write) -> fmt::Result {
    f.write_char('"')?;
    for c in string.chars() {
        match c {
            '\u{08}' => f.write_str("\\b"),
            '\t' => f.write_str("\\t"),
            '\n' => f.write_str("\\n"),
            '\u{0c}' => f.write_str("\\f"),
            '\r' => f.write_str("\\r"),
            '"' => f.write_str("\\\""),
            '\\' => f.write_str("\\\\"),
            '\0'..='\u{1f}' | '\u{7f}' => write!(f, "\\u{:04X}", u32::from(c)),
            _ => f.write_char(c),
        }?;
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_escapes() {
        assert_eq!("\"a\\\"b\\nc\"", Value::from("a\"b\nc").to_string());
    }

    #[test]
    fn lang_string_normalizes_tag() {
        let value = Value::new_lang_string("Paris", "FR").unwrap();
        assert_eq!("\"Paris\"@fr", value.to_string());
        assert!(Value::new_lang_string("x", "not a tag").is_err());
    }

    #[test]
    fn compare_is_family_bound() {
        assert_eq!(
            Some(Ordering::Less),
            Value::from(0).compare(&Value::from(1))
        );
        assert_eq!(
            Some(Ordering::Less),
            Value::from(0).compare(&Value::from(0.5))
        );
        assert_eq!(None, Value::from("Alice").compare(&Value::from(1)));
    }

    #[test]
    fn eq_distinguishes_kinds() {
        assert_ne!(Value::from("1"), Value::from(1));
        assert_eq!(Value::from(1), Value::from(1));
    }
}
