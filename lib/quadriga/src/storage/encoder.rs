use crate::model::{Direction, Quad, Value};
use crate::storage::backend::Bucket;
use crate::storage::error::{CorruptionError, StorageError};
use crate::storage::values::{decode_value, encode_value, QuadHashes, ValueHash, HASH_SIZE};

/// A quad index: a direction permutation the four value hashes are
/// concatenated in to form sorted keys.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum QuadIndex {
    Spo,
    Osp,
    Pos,
    Lpso,
}

impl QuadIndex {
    /// The three indexes every quad is written under; LPSO is only
    /// populated for labeled quads.
    pub const ALL: [Self; 4] = [Self::Spo, Self::Osp, Self::Pos, Self::Lpso];

    pub fn bucket(self) -> Bucket {
        match self {
            Self::Spo => Bucket::Spo,
            Self::Osp => Bucket::Osp,
            Self::Pos => Bucket::Pos,
            Self::Lpso => Bucket::Lpso,
        }
    }

    fn permutation(self) -> [Direction; 4] {
        match self {
            Self::Spo => [
                Direction::Subject,
                Direction::Predicate,
                Direction::Object,
                Direction::Label,
            ],
            Self::Osp => [
                Direction::Object,
                Direction::Subject,
                Direction::Predicate,
                Direction::Label,
            ],
            Self::Pos => [
                Direction::Predicate,
                Direction::Object,
                Direction::Subject,
                Direction::Label,
            ],
            Self::Lpso => [
                Direction::Label,
                Direction::Predicate,
                Direction::Subject,
                Direction::Object,
            ],
        }
    }

    /// The index whose keys are prefixed by `dir`, making a prefix scan a
    /// direction-constrained quad iteration.
    pub fn for_direction(dir: Direction) -> Self {
        match dir {
            Direction::Subject => Self::Spo,
            Direction::Predicate => Self::Pos,
            Direction::Object => Self::Osp,
            Direction::Label => Self::Lpso,
        }
    }

    /// The index key of a quad, `None` when the quad does not belong in
    /// this index (an unlabeled quad in LPSO).
    pub fn key(self, hashes: &QuadHashes) -> Option<Vec<u8>> {
        if self == Self::Lpso && hashes.label.is_none() {
            return None;
        }
        let mut key = Vec::with_capacity(4 * HASH_SIZE);
        for dir in self.permutation() {
            match hashes.get(dir) {
                Some(hash) => key.extend_from_slice(&hash.to_be_bytes()),
                None => key.extend_from_slice(&[0; HASH_SIZE]),
            }
        }
        Some(key)
    }

    /// Reassembles the quad hashes out of one of this index's keys.
    pub fn hashes_from_key(self, key: &[u8]) -> Result<QuadHashes, CorruptionError> {
        if key.len() != 4 * HASH_SIZE {
            return Err(CorruptionError::msg("invalid quad index key length"));
        }
        let mut parts = [ValueHash::from_be_bytes([0; HASH_SIZE]); 4];
        for (i, part) in parts.iter_mut().enumerate() {
            let mut bytes = [0; HASH_SIZE];
            bytes.copy_from_slice(&key[i * HASH_SIZE..(i + 1) * HASH_SIZE]);
            *part = ValueHash::from_be_bytes(bytes);
        }
        let mut hashes = QuadHashes {
            subject: parts[0],
            predicate: parts[0],
            object: parts[0],
            label: None,
        };
        for (dir, part) in self.permutation().into_iter().zip(parts) {
            match dir {
                Direction::Subject => hashes.subject = part,
                Direction::Predicate => hashes.predicate = part,
                Direction::Object => hashes.object = part,
                Direction::Label => {
                    hashes.label = if part.to_be_bytes() == [0; HASH_SIZE] {
                        None
                    } else {
                        Some(part)
                    }
                }
            }
        }
        Ok(hashes)
    }
}

/// Encodes a history: the packed ascending sequence of delta ids a quad
/// index key went through. Odd length means the quad is present.
pub fn encode_history(history: &[u64]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(8 * history.len());
    for id in history {
        buffer.extend_from_slice(&id.to_be_bytes());
    }
    buffer
}

pub fn decode_history(bytes: &[u8]) -> Result<Vec<u64>, CorruptionError> {
    if bytes.len() % 8 != 0 {
        return Err(CorruptionError::msg("corrupt history record"));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut id = [0; 8];
            id.copy_from_slice(chunk);
            u64::from_be_bytes(id)
        })
        .collect())
}

/// A history is live iff its length is odd.
#[inline]
pub fn history_is_live(bytes: &[u8]) -> bool {
    (bytes.len() / 8) % 2 == 1
}

/// The zero-padded 18-hex-digit key a delta is logged under.
pub fn log_key(id: u64) -> Vec<u8> {
    format!("{id:018x}").into_bytes()
}

/// A decoded delta-log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: u64,
    pub action: i32,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub quad: Quad,
}

pub fn encode_log_entry(entry: &LogEntry) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&entry.id.to_be_bytes());
    buffer.extend_from_slice(&entry.action.to_be_bytes());
    buffer.extend_from_slice(&entry.timestamp.to_be_bytes());
    for value in [
        Some(&entry.quad.subject),
        Some(&entry.quad.predicate),
        Some(&entry.quad.object),
        entry.quad.label.as_ref(),
    ] {
        match value {
            Some(value) => {
                let encoded = encode_value(value);
                buffer.extend_from_slice(&u32::try_from(encoded.len()).unwrap_or(0).to_le_bytes());
                buffer.extend_from_slice(&encoded);
            }
            None => buffer.extend_from_slice(&0u32.to_le_bytes()),
        }
    }
    buffer
}

pub fn decode_log_entry(bytes: &[u8]) -> Result<LogEntry, CorruptionError> {
    if bytes.len() < 20 {
        return Err(CorruptionError::msg("truncated delta record"));
    }
    let (header, mut rest) = bytes.split_at(20);
    let id = u64::from_be_bytes(header[..8].try_into().map_err(CorruptionError::new)?);
    let action = i32::from_be_bytes(header[8..12].try_into().map_err(CorruptionError::new)?);
    let timestamp = i64::from_be_bytes(header[12..20].try_into().map_err(CorruptionError::new)?);
    let mut values: [Option<Value>; 4] = [None, None, None, None];
    for slot in &mut values {
        if rest.len() < 4 {
            return Err(CorruptionError::msg("truncated delta record"));
        }
        let (len, tail) = rest.split_at(4);
        let len = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
        if tail.len() < len {
            return Err(CorruptionError::msg("truncated delta record"));
        }
        let (payload, tail) = tail.split_at(len);
        if len > 0 {
            *slot = Some(decode_value(payload)?);
        }
        rest = tail;
    }
    let [subject, predicate, object, label] = values;
    let subject = subject.ok_or_else(|| CorruptionError::msg("delta record without subject"))?;
    let predicate =
        predicate.ok_or_else(|| CorruptionError::msg("delta record without predicate"))?;
    let object = object.ok_or_else(|| CorruptionError::msg("delta record without object"))?;
    Ok(LogEntry {
        id,
        action,
        timestamp,
        quad: Quad {
            subject,
            predicate,
            object,
            label,
        },
    })
}

/// Node dictionary records: a little-endian i64 reference count followed by
/// the serialized value.
pub fn encode_node_record(refcount: i64, value: &Value) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&refcount.to_le_bytes());
    buffer.extend_from_slice(&encode_value(value));
    buffer
}

pub fn decode_node_record(bytes: &[u8]) -> Result<(i64, Value), CorruptionError> {
    if bytes.len() < 8 {
        return Err(CorruptionError::msg("truncated node record"));
    }
    let (refcount, value) = bytes.split_at(8);
    Ok((
        i64::from_le_bytes(refcount.try_into().map_err(CorruptionError::new)?),
        decode_value(value)?,
    ))
}

/// Metadata values are little-endian i64, per the on-disk layout.
pub fn encode_meta(value: i64) -> [u8; 8] {
    value.to_le_bytes()
}

pub fn decode_meta(bytes: &[u8]) -> Result<i64, StorageError> {
    Ok(i64::from_le_bytes(bytes.try_into().map_err(|_| {
        StorageError::from(CorruptionError::msg("invalid metadata record"))
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Iri;

    fn example_quad() -> Quad {
        Quad::with_label(
            Iri::new_unchecked("http://example.com/s"),
            Iri::new_unchecked("http://example.com/p"),
            "o",
            Iri::new_unchecked("http://example.com/g"),
        )
    }

    #[test]
    fn index_keys_are_permutations() {
        let hashes = QuadHashes::new(&example_quad());
        for index in QuadIndex::ALL {
            let key = index.key(&hashes).unwrap();
            assert_eq!(4 * HASH_SIZE, key.len());
            assert_eq!(hashes, index.hashes_from_key(&key).unwrap());
        }
        // An unlabeled quad has no LPSO key and zero-fills the label slot
        let unlabeled = QuadHashes::new(&Quad::new(
            Iri::new_unchecked("http://example.com/s"),
            Iri::new_unchecked("http://example.com/p"),
            "o",
        ));
        assert!(QuadIndex::Lpso.key(&unlabeled).is_none());
        let key = QuadIndex::Spo.key(&unlabeled).unwrap();
        assert_eq!(unlabeled, QuadIndex::Spo.hashes_from_key(&key).unwrap());
    }

    #[test]
    fn history_parity_is_liveness() {
        let history = vec![1, 5, 9];
        let encoded = encode_history(&history);
        assert!(history_is_live(&encoded));
        assert_eq!(history, decode_history(&encoded).unwrap());
        assert!(!history_is_live(&encode_history(&[1, 5])));
        assert!(decode_history(&[0; 7]).is_err());
    }

    #[test]
    fn log_keys_are_sorted_hex() {
        assert_eq!(b"00000000000000000f".to_vec(), log_key(15));
        assert!(log_key(255) > log_key(16));
    }

    #[test]
    fn log_entry_roundtrips() {
        let entry = LogEntry {
            id: 7,
            action: 1,
            timestamp: 1_600_000_000_000_000_000,
            quad: example_quad(),
        };
        assert_eq!(entry, decode_log_entry(&encode_log_entry(&entry)).unwrap());
    }
}
