use crate::model::{BlankNode, Direction, Iri, Value};
use crate::storage::error::CorruptionError;
use siphasher::sip128::{Hasher128, SipHasher24};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str;

/// The width of a [`ValueHash`] in bytes.
pub const HASH_SIZE: usize = 16;

/// A 128-bit fingerprint of the canonical serialization of a [`Value`].
///
/// Quad index keys never store raw values, only their hashes; the node
/// dictionary maps hashes back to serialized values.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ValueHash {
    hash: [u8; HASH_SIZE],
}

impl ValueHash {
    pub fn new(value: &Value) -> Self {
        let mut hasher = SipHasher24::new();
        hasher.write(value.to_string().as_bytes());
        Self {
            hash: u128::from(hasher.finish128()).to_be_bytes(),
        }
    }

    #[inline]
    pub fn from_be_bytes(hash: [u8; HASH_SIZE]) -> Self {
        Self { hash }
    }

    #[inline]
    pub fn to_be_bytes(self) -> [u8; HASH_SIZE] {
        self.hash
    }
}

impl Hash for ValueHash {
    #[inline]
    #[allow(clippy::host_endian_bytes)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u128(u128::from_ne_bytes(self.hash))
    }
}

/// The four value hashes of a quad, the absent label hashing to all zeroes
/// inside index keys.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct QuadHashes {
    pub subject: ValueHash,
    pub predicate: ValueHash,
    pub object: ValueHash,
    pub label: Option<ValueHash>,
}

impl QuadHashes {
    pub fn new(quad: &crate::model::Quad) -> Self {
        Self {
            subject: ValueHash::new(&quad.subject),
            predicate: ValueHash::new(&quad.predicate),
            object: ValueHash::new(&quad.object),
            label: quad.label.as_ref().map(ValueHash::new),
        }
    }

    #[inline]
    pub fn get(&self, dir: Direction) -> Option<ValueHash> {
        match dir {
            Direction::Subject => Some(self.subject),
            Direction::Predicate => Some(self.predicate),
            Direction::Object => Some(self.object),
            Direction::Label => self.label,
        }
    }
}

/// An opaque handle to a value or a quad slot within a store.
///
/// Two refs compare equal iff they denote the same entity within the same
/// store; a prefetched ref already carries its display form so resolving it
/// is a no-op.
#[derive(Debug, Clone)]
pub enum Ref {
    /// A node known by hash only.
    Node(ValueHash),
    /// A quad record.
    Quad(QuadHashes),
    /// A node that carries its display form.
    PreFetched(ValueHash, Value),
}

impl Ref {
    /// Builds a node ref that does not need a dictionary lookup to print.
    pub fn prefetched(value: Value) -> Self {
        Self::PreFetched(ValueHash::new(&value), value)
    }

    /// The value hash when this ref denotes a node.
    #[inline]
    pub fn node_hash(&self) -> Option<ValueHash> {
        match self {
            Self::Node(hash) | Self::PreFetched(hash, _) => Some(*hash),
            Self::Quad(_) => None,
        }
    }

    /// The already-resolved value, if any.
    #[inline]
    pub fn prefetched_value(&self) -> Option<&Value> {
        if let Self::PreFetched(_, value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[inline]
    pub fn as_quad(&self) -> Option<&QuadHashes> {
        if let Self::Quad(hashes) = self {
            Some(hashes)
        } else {
            None
        }
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        match (self.node_hash(), other.node_hash()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.as_quad() == other.as_quad(),
            _ => false,
        }
    }
}

impl Eq for Ref {}

impl Hash for Ref {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Node(hash) | Self::PreFetched(hash, _) => {
                state.write_u8(0);
                hash.hash(state);
            }
            Self::Quad(hashes) => {
                state.write_u8(1);
                hashes.hash(state);
            }
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreFetched(_, value) => value.fmt(f),
            Self::Node(hash) => write!(f, "node:{:032x}", u128::from_be_bytes(hash.to_be_bytes())),
            Self::Quad(hashes) => write!(
                f,
                "quad:{:032x}",
                u128::from_be_bytes(hashes.subject.to_be_bytes())
            ),
        }
    }
}

const TYPE_IRI: u8 = 1;
const TYPE_BLANK_NODE: u8 = 2;
const TYPE_STRING: u8 = 3;
const TYPE_LANG_STRING: u8 = 4;
const TYPE_TYPED_LITERAL: u8 = 5;
const TYPE_INTEGER: u8 = 6;
const TYPE_DOUBLE: u8 = 7;
const TYPE_BOOLEAN: u8 = 8;
const TYPE_DATE_TIME: u8 = 9;

/// Serializes a value for the node dictionary: a type tag byte followed by
/// the kind-specific payload.
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buffer = Vec::new();
    match value {
        Value::Iri(iri) => {
            buffer.push(TYPE_IRI);
            buffer.extend_from_slice(iri.as_str().as_bytes());
        }
        Value::BlankNode(node) => {
            buffer.push(TYPE_BLANK_NODE);
            buffer.extend_from_slice(node.as_str().as_bytes());
        }
        Value::String(s) => {
            buffer.push(TYPE_STRING);
            buffer.extend_from_slice(s.as_bytes());
        }
        Value::LangString { value, language } => {
            buffer.push(TYPE_LANG_STRING);
            write_len_prefixed(&mut buffer, value.as_bytes());
            buffer.extend_from_slice(language.as_bytes());
        }
        Value::TypedLiteral { value, datatype } => {
            buffer.push(TYPE_TYPED_LITERAL);
            write_len_prefixed(&mut buffer, value.as_bytes());
            buffer.extend_from_slice(datatype.as_str().as_bytes());
        }
        Value::Integer(value) => {
            buffer.push(TYPE_INTEGER);
            buffer.extend_from_slice(&i64::from(*value).to_be_bytes());
        }
        Value::Double(value) => {
            buffer.push(TYPE_DOUBLE);
            buffer.extend_from_slice(&f64::from(*value).to_bits().to_be_bytes());
        }
        Value::Boolean(value) => {
            buffer.push(TYPE_BOOLEAN);
            buffer.push(u8::from(bool::from(*value)));
        }
        Value::DateTime(value) => {
            buffer.push(TYPE_DATE_TIME);
            buffer.extend_from_slice(value.to_string().as_bytes());
        }
    }
    buffer
}

/// The reverse of [`encode_value`].
pub fn decode_value(bytes: &[u8]) -> Result<Value, CorruptionError> {
    let (&tag, payload) = bytes
        .split_first()
        .ok_or_else(|| CorruptionError::msg("empty value record"))?;
    Ok(match tag {
        TYPE_IRI => Value::Iri(Iri::new_unchecked(decode_str(payload)?)),
        TYPE_BLANK_NODE => Value::BlankNode(BlankNode::new_unchecked(decode_str(payload)?)),
        TYPE_STRING => Value::String(decode_str(payload)?.into()),
        TYPE_LANG_STRING => {
            let (value, language) = read_len_prefixed(payload)?;
            Value::LangString {
                value: decode_str(value)?.into(),
                language: decode_str(language)?.into(),
            }
        }
        TYPE_TYPED_LITERAL => {
            let (value, datatype) = read_len_prefixed(payload)?;
            Value::TypedLiteral {
                value: decode_str(value)?.into(),
                datatype: Iri::new_unchecked(decode_str(datatype)?),
            }
        }
        TYPE_INTEGER => Value::Integer(i64::from_be_bytes(decode_array(payload)?).into()),
        TYPE_DOUBLE => Value::Double(f64::from_bits(u64::from_be_bytes(decode_array(payload)?)).into()),
        TYPE_BOOLEAN => match payload {
            [0] => Value::Boolean(false.into()),
            [1] => Value::Boolean(true.into()),
            _ => return Err(CorruptionError::msg("invalid boolean payload")),
        },
        TYPE_DATE_TIME => Value::DateTime(
            decode_str(payload)?
                .parse()
                .map_err(CorruptionError::new)?,
        ),
        _ => return Err(CorruptionError::msg(format!("unknown value type {tag}"))),
    })
}

fn write_len_prefixed(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&u32::try_from(bytes.len()).unwrap_or(u32::MAX).to_le_bytes());
    buffer.extend_from_slice(bytes);
}

fn read_len_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8]), CorruptionError> {
    if bytes.len() < 4 {
        return Err(CorruptionError::msg("truncated length prefix"));
    }
    let (len, rest) = bytes.split_at(4);
    let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if rest.len() < len {
        return Err(CorruptionError::msg("truncated length-prefixed payload"));
    }
    Ok(rest.split_at(len))
}

fn decode_str(bytes: &[u8]) -> Result<&str, CorruptionError> {
    str::from_utf8(bytes).map_err(CorruptionError::new)
}

fn decode_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CorruptionError> {
    bytes
        .try_into()
        .map_err(|_| CorruptionError::msg("invalid fixed-width payload"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quad;

    #[test]
    fn hash_tracks_value_identity() {
        let iri = Value::Iri(Iri::new_unchecked("http://example.com/a"));
        assert_eq!(ValueHash::new(&iri), ValueHash::new(&iri.clone()));
        // The string "1" and the integer 1 serialize differently
        assert_ne!(
            ValueHash::new(&Value::from("1")),
            ValueHash::new(&Value::from(1))
        );
    }

    #[test]
    fn value_codec_roundtrips() {
        for value in [
            Value::Iri(Iri::new_unchecked("http://example.com/a")),
            Value::BlankNode(BlankNode::new_unchecked("b1")),
            Value::from("plain"),
            Value::new_lang_string("ville", "fr").unwrap(),
            Value::new_typed("P1Y", Iri::new_unchecked("http://www.w3.org/2001/XMLSchema#duration")),
            Value::from(-42),
            Value::from(1.5),
            Value::from(true),
            Value::DateTime("2011-02-03T04:05:06Z".parse().unwrap()),
        ] {
            assert_eq!(value, decode_value(&encode_value(&value)).unwrap());
        }
    }

    #[test]
    fn refs_compare_by_denoted_entity() {
        let value = Value::from("x");
        let hash = ValueHash::new(&value);
        assert_eq!(Ref::Node(hash), Ref::prefetched(value));
        let quad = Quad::new(
            Iri::new_unchecked("http://example.com/s"),
            Iri::new_unchecked("http://example.com/p"),
            "x",
        );
        assert_ne!(Ref::Node(hash), Ref::Quad(QuadHashes::new(&quad)));
    }
}
