use crate::{
    codec::VarIntReader,
    format::{extract_sequence_key, extract_user_key},
    types::{MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK},
};

fn seek_tag_bytes() -> [u8; 8] {
    let tag = (MAX_SEQUENCE_NUMBER << 8) | VALUE_TYPE_FOR_SEEK as u64;
    tag.to_le_bytes()
}

use std::{
    cmp::{self, Ordering},
    sync::Arc,
};

pub trait Comparator {
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering;

    fn name(&self) -> &'static str;

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    fn find_shortest_successor(&self, key: &mut Vec<u8>);
}

#[derive(Clone, Copy)]
pub struct BitWiseComparator {}

impl Comparator for BitWiseComparator {
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        left.cmp(right)
    }

    fn name(&self) -> &'static str {
        "Leveldb.BitwiseComaparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let min_length = cmp::min(start.len(), limit.len());
        let mut diff_index = 0;
        while diff_index < min_length && limit[diff_index] == start[diff_index] {
            diff_index += 1;
        }
        if diff_index < min_length {
            let diff_byte = start[diff_index];
            if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
                start[diff_index] += 1;
                start.truncate(diff_index + 1);
            }
        }
    }

    fn find_shortest_successor(&self, key: &mut Vec<u8>) {
        let mut truncate_len = 0;
        for (_, byte) in key.iter_mut().enumerate() {
            if *byte != 0xff {
                *byte += 1;
                truncate_len += 1;
                break;
            }
        }
        if truncate_len != 0 {
            key.truncate(truncate_len)
        }
    }
}

#[derive(Clone)]
pub struct InternalKeyComparator {
    user_comparator: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        InternalKeyComparator { user_comparator }
    }
    pub fn user_comparator(&self) -> Arc<dyn Comparator> {
        self.user_comparator.clone()
    }
}

impl Comparator for InternalKeyComparator {
    // order by
    // increasing user key
    // decreasing sequence key
    // decreasing type key
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        // let (left, right) = (left.as_ref(), right.as_ref());
        let left_key = extract_user_key(left);
        let right_key = extract_user_key(right);
        match self.user_comparator.compare(left_key, right_key) {
            Ordering::Less => Ordering::Less,
            Ordering::Greater => Ordering::Greater,
            Ordering::Equal => {
                let left_seq = extract_sequence_key(left);
                let right_seq = extract_sequence_key(right);
                right_seq.cmp(&left_seq)
            }
        }
    }

    fn name(&self) -> &'static str {
        "leveldb.InternalKeyComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let user_start = extract_user_key(start).to_vec();
        let user_limit = extract_user_key(limit);

        let mut tmp = user_start.clone();
        self.user_comparator.find_shortest_separator(&mut tmp, user_limit);

        if tmp.len() < user_start.len()
            && self.user_comparator.compare(&user_start, &tmp) == Ordering::Less
        {
            // The user key shrank but still sorts after user_start, so the
            // shortened key is a valid separator: append a tag that sorts
            // before any real entry for it and swap it in. Comparing the
            // full internal `start` (not just its user-key prefix) against
            // the candidate is what guarantees the separator still sorts
            // strictly between the original start and limit once the tag
            // is attached.
            let mut candidate = tmp;
            candidate.extend_from_slice(&seek_tag_bytes());
            if self.compare(start, &candidate) == Ordering::Less
                && self.compare(&candidate, limit) == Ordering::Less
            {
                *start = candidate;
            }
        }
    }

    fn find_shortest_successor(&self, key: &mut Vec<u8>) {
        let user_key = extract_user_key(key).to_vec();
        let mut tmp = user_key.clone();
        self.user_comparator.find_shortest_successor(&mut tmp);

        if tmp.len() < user_key.len() && self.user_comparator.compare(&user_key, &tmp) == Ordering::Less
        {
            let mut candidate = tmp;
            candidate.extend_from_slice(&seek_tag_bytes());
            if self.compare(key, &candidate) == Ordering::Less {
                *key = candidate;
            }
        }
    }
}

pub struct KeyComparator {
    comparator: InternalKeyComparator,
}

impl KeyComparator {
    pub fn new(comparator: InternalKeyComparator) -> Self {
        KeyComparator { comparator }
    }
}

impl Comparator for KeyComparator {
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        let left_key = get_length_prefixed_slice(left);
        let right_key = get_length_prefixed_slice(right);
        self.comparator.compare(left_key, right_key)
    }

    fn name(&self) -> &'static str {
        "leveldb.KeyComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        self.comparator.find_shortest_separator(start, limit)
    }

    fn find_shortest_successor(&self, key: &mut Vec<u8>) {
        self.comparator.find_shortest_successor(key)
    }
}

pub fn get_length_prefixed_slice(mut buf: &[u8]) -> &[u8] {
    let (len,_) = buf.read_var_u32().unwrap();
    // assert!(len as usize == buf.len());
    &buf[..len as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_shortest_separator() {
        let tests: Vec<(&[u8], &[u8], &[u8])> = vec![
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 6u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
            ),
            (
                &[1u8, 2u8, 3u8, 3u8, 5u8],
                &[1u8, 2u8, 3u8, 5u8, 5u8, 1u8],
                &[1u8, 2u8, 3u8, 4u8],
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
            ),
            (
                &[1u8, 2u8, 4u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 4u8, 4u8, 5u8],
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8, 1u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8, 1u8],
            ),
            (
                &[1u8, 1u8, 3u8, 4u8, 5u8, 6u8],
                &[1u8, 5u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8],
            ),
            (&[], &[], &[]),
            (&[0u8], &[], &[0]),
            (&[], &[0u8], &[]),
        ];

        let comparator = BitWiseComparator {};
        for (i, &(a, b, expect)) in tests.iter().enumerate() {
            let mut start = Vec::from(a);
            comparator.find_shortest_separator(&mut start, b);
            assert_eq!(&start, expect, "{}", i);
        }
    }

    #[test]
    fn test_bit_wise_comparator_cmp() {
        let _tests: Vec<(&[u8], &[u8], Ordering)> = vec![
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 6u8],
                Ordering::Less,
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8, 1u8],
                Ordering::Less,
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                Ordering::Equal,
            ),
            (
                &[1u8, 2u8, 4u8, 4u8, 5u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                Ordering::Greater,
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8, 1u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                Ordering::Greater,
            ),
            (
                &[1u8, 1u8, 3u8, 4u8, 5u8, 6u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                Ordering::Less,
            ),
            (
                &[1u8, 2u8, 3u8, 4u8, 5u8, 7u8],
                &[1u8, 2u8, 3u8, 4u8, 5u8],
                Ordering::Greater,
            ),
            (&[], &[], Ordering::Equal),
            (&[0u8], &[], Ordering::Greater),
        ];
    }
}
