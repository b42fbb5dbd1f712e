use crate::{
    codec::{NumberDecoder, NumberEncoder},
    types::{SequenceNumber, MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK},
    ValueType,
};

/// Suffix appended to every user key: 7 bytes of sequence number plus one
/// byte of value type, packed into a single little-endian u64.
const TAG_SIZE: usize = 8;

#[derive(Default, Clone, PartialEq, Eq)]
pub struct InternalKey {
    rep: Vec<u8>,
}

impl InternalKey {
    pub fn empty() -> Self {
        InternalKey { rep: Vec::new() }
    }

    pub fn new(key: &[u8], s: SequenceNumber, t: ValueType) -> Self {
        let mut rep = Vec::with_capacity(key.len() + TAG_SIZE);
        let parsed_key = ParsedInternalKey {
            user_key: key,
            sequence: s,
            val_type: t,
        };
        parsed_key.append(&mut rep);
        InternalKey { rep }
    }

    pub fn clear(&mut self) {
        self.rep.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rep.is_empty()
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.rep)
    }

    pub fn sequence(&self) -> SequenceNumber {
        extract_sequence_number(&self.rep)
    }

    pub fn encode(&self) -> &[u8] {
        assert!(!self.rep.is_empty());
        &self.rep
    }

    /// Decodes `data` (a raw internal key, i.e. the concatenation of a user
    /// key and an 8-byte tag) into this key, replacing any previous content.
    /// Returns `true` on success, matching the teacher's boolean-status
    /// idiom used by callers that only need to know whether decoding
    /// succeeded.
    pub fn decode(&mut self, data: impl Into<Vec<u8>>) -> bool {
        let data = data.into();
        if data.len() < TAG_SIZE {
            return false;
        }
        self.rep = data;
        true
    }
}

pub fn pack_sequence_and_type(seq: u64, t: ValueType) -> u64 {
    assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | t as u64
}

/// A seek target that sorts before every real entry for `user_key` at or
/// before `seq`, per the internal-key ordering (ascending user key,
/// descending sequence, descending type).
pub fn lookup_key_tag(seq: SequenceNumber) -> u64 {
    assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | VALUE_TYPE_FOR_SEEK as u64
}

pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub val_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn append(&self, result: &mut Vec<u8>) {
        result.extend_from_slice(self.user_key);
        let mut buf = [0u8; TAG_SIZE];
        buf.as_mut()
            .encode_u64_le(pack_sequence_and_type(self.sequence, self.val_type))
            .unwrap();
        result.extend_from_slice(&buf);
    }

    pub fn parse(data: &'a [u8]) -> Self {
        assert!(data.len() >= TAG_SIZE);
        let key = &data[0..data.len() - TAG_SIZE];
        let mut buf = &data[data.len() - TAG_SIZE..];
        let tag = buf.decode_u64_le().unwrap();
        let seq = tag >> 8;
        let val_type = ValueType::try_from((tag & 0xff) as u8).unwrap();

        ParsedInternalKey {
            user_key: key,
            sequence: seq,
            val_type,
        }
    }
}

/// Strips the 8-byte tag off an internal key, returning the user key.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    assert!(internal_key.len() >= TAG_SIZE);
    &internal_key[..internal_key.len() - TAG_SIZE]
}

/// Returns the packed `(sequence << 8) | type` tag off an internal key.
/// Comparing two of these descending reproduces the internal-key tie-break
/// rule (higher sequence first, then higher type) in a single integer
/// comparison.
pub fn extract_sequence_key(internal_key: &[u8]) -> u64 {
    assert!(internal_key.len() >= TAG_SIZE);
    let mut buf = &internal_key[internal_key.len() - TAG_SIZE..];
    buf.decode_u64_le().unwrap()
}

pub fn extract_sequence_number(internal_key: &[u8]) -> SequenceNumber {
    extract_sequence_key(internal_key) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_key_round_trip() {
        let key = InternalKey::new(b"hello", 42, ValueType::Value);
        assert_eq!(key.user_key(), b"hello");
        assert_eq!(key.sequence(), 42);

        let mut other = InternalKey::empty();
        assert!(other.decode(key.encode().to_vec()));
        assert_eq!(other.user_key(), b"hello");
        assert_eq!(other.sequence(), 42);
    }

    #[test]
    fn test_parsed_internal_key() {
        let key = InternalKey::new(b"abc", 7, ValueType::Deletion);
        let parsed = ParsedInternalKey::parse(key.encode());
        assert_eq!(parsed.user_key, b"abc");
        assert_eq!(parsed.sequence, 7);
        assert_eq!(parsed.val_type, ValueType::Deletion);
    }
}
