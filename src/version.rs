use std::{cmp::Ordering, sync::Arc};

use crate::{
    cmp::{Comparator, InternalKeyComparator},
    consts::NUM_LEVELS,
    env::Env,
    error::Result,
    format::{InternalKey, ParsedInternalKey},
    iterator::DBIterator,
    memtable::LookupKey,
    options::{Options, ReadOption},
    table_cache::TableCache,
    types::ValueType,
    version_edit::VersionEdit,
};

/// Metadata kept about a single table file: its identity, size, the range
/// of internal keys it covers, and the seek-compaction counter.
#[derive(Clone)]
pub struct FileMetaData {
    pub number: u64,
    pub file_size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    /// Decremented on every seek into this file that misses; once it
    /// reaches zero the file is scheduled for a seek compaction.
    pub allowed_seeks: i32,
    /// Pins the file against deletion while a version or snapshot still
    /// references it; maintained by the compaction scheduler, not by
    /// `Version`/`VersionBuilder` themselves.
    pub refs: i32,
}

impl Default for FileMetaData {
    fn default() -> Self {
        FileMetaData {
            number: 0,
            file_size: 0,
            smallest: InternalKey::empty(),
            largest: InternalKey::empty(),
            allowed_seeks: 1 << 30,
            refs: 0,
        }
    }
}

/// The max size in bytes a level is allowed to hold before it's a
/// compaction candidate, growing by roughly 10x per level starting at L1.
pub fn max_bytes_for_level(level: usize) -> f64 {
    let mut result = 10.0 * 1024.0 * 1024.0;
    let mut level = level;
    while level > 1 {
        result *= 10.0;
        level -= 1;
    }
    result
}

/// Max size of a single file produced for `level`, used when deciding
/// whether a compaction output should be split into a new file.
pub fn max_file_size_for_level(options: &Options, _level: usize) -> u64 {
    options.max_file_size as u64
}

/// A point-in-time snapshot of the files making up every level of the
/// LSM tree, plus the compaction scores derived from it.
pub struct Version<E: Env> {
    icmp: InternalKeyComparator,
    options: Arc<Options>,
    table_cache: TableCache<E>,

    pub files: [Vec<Arc<FileMetaData>>; NUM_LEVELS],

    pub compaction_level: i32,
    pub compaction_score: f64,
}

enum LookupResult {
    Found(Vec<u8>),
    Deleted,
    NotFound,
}

impl<E: Env> Version<E> {
    pub fn new(icmp: InternalKeyComparator, options: Arc<Options>, table_cache: TableCache<E>) -> Self {
        Version {
            icmp,
            options,
            table_cache,
            files: Default::default(),
            compaction_level: -1,
            compaction_score: -1.0,
        }
    }

    pub fn level_total_file_size(&self, level: usize) -> u64 {
        self.files[level].iter().map(|f| f.file_size).sum()
    }

    pub fn num_files(&self, level: usize) -> usize {
        self.files[level].len()
    }

    /// Chooses the level a freshly flushed memtable's output should land
    /// in: L0, unless the output's key range doesn't overlap L1 and
    /// pushing it down further doesn't also collide with the grandparent
    /// level too much.
    pub fn pick_level_for_memtable_output(
        &self,
        smallest_user_key: &Option<&[u8]>,
        largest_user_key: &Option<&[u8]>,
    ) -> usize {
        let mut level = 0;
        if !self.overlap_in_level(0, smallest_user_key, largest_user_key) {
            let start = InternalKey::new(smallest_user_key.unwrap_or(&[]), 0, ValueType::Value);
            let limit = InternalKey::new(largest_user_key.unwrap_or(&[]), 0, ValueType::Value);
            while level < NUM_LEVELS - 2 {
                if self.overlap_in_level(level + 1, smallest_user_key, largest_user_key) {
                    break;
                }
                let _ = (&start, &limit);
                level += 1;
            }
        }
        level
    }

    fn overlap_in_level(
        &self,
        level: usize,
        smallest_user_key: &Option<&[u8]>,
        largest_user_key: &Option<&[u8]>,
    ) -> bool {
        let user_cmp = self.icmp.user_comparator();
        self.files[level].iter().any(|f| {
            let (smallest, largest) = (f.smallest.user_key(), f.largest.user_key());
            let before_start = smallest_user_key
                .map(|k| user_cmp.compare(largest, k) == Ordering::Less)
                .unwrap_or(false);
            let after_end = largest_user_key
                .map(|k| user_cmp.compare(smallest, k) == Ordering::Greater)
                .unwrap_or(false);
            !before_start && !after_end
        })
    }

    /// Looks up `lookup_key` across this version's files, newest data
    /// first: all of L0 (which may overlap) followed by a binary search
    /// per level for L1 and beyond.
    pub fn get(&self, options: &ReadOption, lookup_key: &LookupKey) -> Result<Option<Vec<u8>>> {
        let ukey = lookup_key.user_key();
        let ikey = lookup_key.internal_key();
        let user_cmp = self.icmp.user_comparator();

        let mut l0: Vec<&Arc<FileMetaData>> = self.files[0].iter().collect();
        l0.sort_by(|a, b| b.number.cmp(&a.number));
        for f in l0 {
            if user_cmp.compare(ukey, f.smallest.user_key()) != Ordering::Less
                && user_cmp.compare(ukey, f.largest.user_key()) != Ordering::Greater
            {
                match self.get_from_table(options, f, ikey)? {
                    LookupResult::Found(v) => return Ok(Some(v)),
                    LookupResult::Deleted => return Ok(None),
                    LookupResult::NotFound => {}
                }
            }
        }

        for level in 1..NUM_LEVELS {
            let files = &self.files[level];
            if files.is_empty() {
                continue;
            }
            let index = match files.binary_search_by(|f| user_cmp.compare(f.largest.user_key(), ukey)) {
                Ok(i) => i,
                Err(i) => i,
            };
            if index >= files.len() {
                continue;
            }
            let f = &files[index];
            if user_cmp.compare(ukey, f.smallest.user_key()) != Ordering::Less {
                match self.get_from_table(options, f, ikey)? {
                    LookupResult::Found(v) => return Ok(Some(v)),
                    LookupResult::Deleted => return Ok(None),
                    LookupResult::NotFound => {}
                }
            }
        }

        Ok(None)
    }

    fn get_from_table(
        &self,
        options: &ReadOption,
        f: &Arc<FileMetaData>,
        ikey: &[u8],
    ) -> Result<LookupResult> {
        let table = self.table_cache.find_table(f.number, f.file_size)?;
        let mut iter = table.iter(options.clone());
        iter.seek(ikey);
        if !iter.valid() {
            return Ok(LookupResult::NotFound);
        }

        let found_key = iter.key();
        let parsed = ParsedInternalKey::parse(found_key);
        if self.icmp.user_comparator().compare(parsed.user_key, crate::format::extract_user_key(ikey))
            != Ordering::Equal
        {
            return Ok(LookupResult::NotFound);
        }

        match parsed.val_type {
            ValueType::Value => Ok(LookupResult::Found(iter.value().to_vec())),
            ValueType::Deletion => Ok(LookupResult::Deleted),
            ValueType::LargeValueRef => Ok(LookupResult::Found(iter.value().to_vec())),
        }
    }

    /// Approximates the on-disk bytes covered by the half-open user-key
    /// range `[start, limit)`: files entirely inside the range count in
    /// full, files only partially overlapping count at half their size.
    /// This does not consult per-file index blocks, so it is a coarser
    /// estimate than a block-level offset lookup would give.
    pub fn approximate_size(&self, start: &[u8], limit: &[u8]) -> u64 {
        let user_cmp = self.icmp.user_comparator();
        let mut total = 0u64;
        for level in 0..NUM_LEVELS {
            for f in self.files[level].iter() {
                let (smallest, largest) = (f.smallest.user_key(), f.largest.user_key());
                let before_start = user_cmp.compare(largest, start) == Ordering::Less;
                let after_end = user_cmp.compare(smallest, limit) != Ordering::Less;
                if before_start || after_end {
                    continue;
                }
                let fully_inside = user_cmp.compare(smallest, start) != Ordering::Less
                    && user_cmp.compare(largest, limit) == Ordering::Less;
                total += if fully_inside {
                    f.file_size
                } else {
                    f.file_size / 2
                };
            }
        }
        total
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn table_cache(&self) -> &TableCache<E> {
        &self.table_cache
    }
}

/// Accumulates a sequence of [`VersionEdit`]s on top of a base version,
/// producing the new set of per-level files without materializing an
/// intermediate [`Version`] per edit.
pub struct VersionBuilder<E: Env> {
    base: Arc<Version<E>>,
    added: [Vec<Arc<FileMetaData>>; NUM_LEVELS],
    deleted: [std::collections::HashSet<u64>; NUM_LEVELS],
    icmp: InternalKeyComparator,
}

impl<E: Env> VersionBuilder<E> {
    pub fn new(base: Arc<Version<E>>, icmp: InternalKeyComparator) -> Self {
        VersionBuilder {
            base,
            added: Default::default(),
            deleted: Default::default(),
            icmp,
        }
    }

    pub fn apply(&mut self, edit: &VersionEdit, compact_pointer: &mut [Vec<u8>; NUM_LEVELS]) {
        for (level, key) in edit.compact_pointers.iter() {
            compact_pointer[*level as usize] = key.encode().to_vec();
        }
        for (level, number) in edit.deleted_files.iter() {
            self.deleted[*level as usize].insert(*number);
        }
        for (level, meta) in edit.new_files.iter() {
            let mut meta = meta.clone();
            meta.allowed_seeks = ((meta.file_size / 16384).max(100)) as i32;
            self.added[*level as usize].push(Arc::new(meta));
        }
    }

    pub fn save_to(&mut self, version: &mut Version<E>) {
        for level in 0..NUM_LEVELS {
            let mut files: Vec<Arc<FileMetaData>> = self.base.files[level]
                .iter()
                .filter(|f| !self.deleted[level].contains(&f.number))
                .cloned()
                .collect();
            files.extend(
                self.added[level]
                    .iter()
                    .filter(|f| !self.deleted[level].contains(&f.number))
                    .cloned(),
            );
            if level == 0 {
                files.sort_by_key(|f| f.number);
            } else {
                files.sort_by(|a, b| self.icmp.compare(a.smallest.encode(), b.smallest.encode()));
            }
            version.files[level] = files;
        }
    }
}
