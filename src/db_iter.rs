use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    cmp::Comparator,
    error::Result,
    format::{extract_user_key, ParsedInternalKey},
    iterator::DBIterator,
    memtable::LookupKey,
    types::{SequenceNumber, ValueType},
    Forward,
};

/// Wraps a merged internal-key iterator and presents the user-facing
/// view: entries newer than `sequence` are invisible, deletions are
/// skipped, and only the newest surviving version of each user key is
/// surfaced. The wrapped iterator must produce internal keys in the
/// usual ascending-user-key / descending-sequence order.
pub struct DBIter {
    iter: Box<dyn DBIterator>,
    user_comparator: Arc<dyn Comparator>,
    sequence: SequenceNumber,

    valid: bool,
    direction: Forward,
    saved_key: Vec<u8>,
    saved_value: Vec<u8>,
}

impl DBIter {
    pub fn new(iter: Box<dyn DBIterator>, user_comparator: Arc<dyn Comparator>, sequence: SequenceNumber) -> Self {
        DBIter {
            iter,
            user_comparator,
            sequence,
            valid: false,
            direction: Forward::FORWARD,
            saved_key: Vec::new(),
            saved_value: Vec::new(),
        }
    }

    fn save_key(&mut self, user_key: &[u8]) {
        self.saved_key.clear();
        self.saved_key.extend_from_slice(user_key);
    }

    /// Advances `iter` (already positioned, direction forward) until it
    /// rests on the newest live value for some user key, skipping
    /// tombstones and any entry shadowed by an already-seen newer
    /// version of the same key.
    fn find_next_user_entry(&mut self, mut skipping: bool) {
        debug_assert!(self.direction == Forward::FORWARD);
        while self.iter.valid() {
            let raw = self.iter.key();
            if raw.len() >= 8 {
                let parsed = ParsedInternalKey::parse(raw);
                let sequence = parsed.sequence;
                let val_type = parsed.val_type;
                // Copy out of the borrow on `self.iter` before touching
                // `self` mutably below.
                let user_key = parsed.user_key.to_vec();

                if sequence <= self.sequence {
                    match val_type {
                        ValueType::Deletion => {
                            self.save_key(&user_key);
                            skipping = true;
                        }
                        ValueType::Value | ValueType::LargeValueRef => {
                            if skipping
                                && self.user_comparator.compare(&user_key, &self.saved_key)
                                    != Ordering::Greater
                            {
                                // shadowed by a newer version already seen
                            } else {
                                self.valid = true;
                                self.saved_key.clear();
                                return;
                            }
                        }
                    }
                }
            }
            self.iter.next();
        }
        self.saved_key.clear();
        self.valid = false;
    }

    fn find_prev_user_entry(&mut self) {
        debug_assert!(self.direction == Forward::BACKWARD);
        let mut found_value = false;
        while self.iter.valid() {
            let raw = self.iter.key();
            if raw.len() >= 8 {
                let parsed = ParsedInternalKey::parse(raw);
                let sequence = parsed.sequence;
                let val_type = parsed.val_type;
                let user_key = parsed.user_key.to_vec();

                if sequence <= self.sequence {
                    if found_value
                        && self.user_comparator.compare(&user_key, &self.saved_key) == Ordering::Less
                    {
                        break;
                    }
                    match val_type {
                        ValueType::Deletion => {
                            found_value = false;
                            self.saved_key.clear();
                            self.saved_value.clear();
                        }
                        ValueType::Value | ValueType::LargeValueRef => {
                            found_value = true;
                            self.save_key(&user_key);
                            let raw_value = self.iter.value().to_vec();
                            self.saved_value.clear();
                            self.saved_value.extend_from_slice(&raw_value);
                        }
                    }
                }
            }
            self.iter.prev();
        }

        if !found_value {
            self.valid = false;
            self.saved_key.clear();
            self.saved_value.clear();
            self.direction = Forward::FORWARD;
        } else {
            self.valid = true;
        }
    }
}

impl DBIterator for DBIter {
    fn valid(&self) -> bool {
        self.valid
    }

    fn seek_to_first(&mut self) {
        self.direction = Forward::FORWARD;
        self.saved_value.clear();
        self.iter.seek_to_first();
        if self.iter.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn seek_to_last(&mut self) {
        self.direction = Forward::BACKWARD;
        self.saved_value.clear();
        self.iter.seek_to_last();
        self.find_prev_user_entry();
    }

    fn seek(&mut self, target: &[u8]) {
        self.direction = Forward::FORWARD;
        self.saved_value.clear();
        let lookup = LookupKey::new(target, self.sequence, ValueType::LargeValueRef);
        self.iter.seek(lookup.internal_key());
        if self.iter.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn next(&mut self) {
        assert!(self.valid);
        if self.direction == Forward::BACKWARD {
            self.direction = Forward::FORWARD;
            if !self.iter.valid() {
                self.iter.seek_to_first();
            } else {
                self.iter.next();
            }
            if !self.iter.valid() {
                self.valid = false;
                self.saved_key.clear();
                return;
            }
        } else {
            let user_key = extract_user_key(self.iter.key()).to_vec();
            self.save_key(&user_key);
            self.iter.next();
        }
        self.find_next_user_entry(true);
    }

    fn prev(&mut self) {
        assert!(self.valid);
        if self.direction == Forward::FORWARD {
            let user_key = extract_user_key(self.iter.key()).to_vec();
            self.save_key(&user_key);
            loop {
                self.iter.prev();
                if !self.iter.valid() {
                    self.valid = false;
                    self.saved_key.clear();
                    self.saved_value.clear();
                    return;
                }
                if self
                    .user_comparator
                    .compare(extract_user_key(self.iter.key()), &self.saved_key)
                    == Ordering::Less
                {
                    break;
                }
            }
            self.direction = Forward::BACKWARD;
        }
        self.find_prev_user_entry();
    }

    fn key(&self) -> &[u8] {
        assert!(self.valid);
        if self.direction == Forward::FORWARD {
            extract_user_key(self.iter.key())
        } else {
            &self.saved_key
        }
    }

    fn value(&self) -> &[u8] {
        assert!(self.valid);
        if self.direction == Forward::FORWARD {
            self.iter.value()
        } else {
            &self.saved_value
        }
    }

    fn status(&mut self) -> Result<()> {
        self.iter.status()
    }
}
