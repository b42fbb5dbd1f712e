use std::collections::HashSet;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::builder::build_table;
use crate::cmp::InternalKeyComparator;
use crate::consts::NUM_NON_TABLE_CACHE_FILES;
use crate::db::Range;
use crate::db_iter::DBIter;
use crate::env::WritableFile;
use crate::error::{Error, Result};
use crate::filenames::{
    current_file_name, descriptor_file_name, log_file_name, parse_file_name, set_current_file,
    FileType,
};
use crate::iterator::DBIterator;
use crate::memtable::MemTableLookup;
use crate::merge::new_merging_iterator;
use crate::options::{ReadOption, WriteOption};
use crate::table::table::Table;
use crate::table::two_level_iterator::TwoLevelIterator;
use crate::table_cache::TableCache;
use crate::types::SequenceNumber;
use crate::version::{FileMetaData, Version};
use crate::version_edit::VersionEdit;
use crate::version_set::{LevelFileNumIterator, LevelTableIterBuilder, VersionSet};
use crate::{env::Env, options::Options, write_batch::WriteBatch};
use crate::{LogReader, LogWriter, LookupKey, MemTable, ValueType};

/// A sequence number pinned at the time it was taken, letting a reader
/// see a consistent view of the database across multiple `Get` calls
/// even as later writes land.
#[derive(Clone, Copy)]
pub struct Snapshot {
    sequence: SequenceNumber,
}

impl Snapshot {
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }
}

pub struct LevelDB<E: Env> {
    inner: Arc<DBImplInner<E>>,
}

impl<E: Env> LevelDB<E> {
    pub fn open(options: Options, db_name: impl Into<String>, env: E) -> Result<Self> {
        let db_name = db_name.into();
        let db = DBImplInner::new(options, db_name.as_str(), env.clone());
        let mut edit = VersionEdit::default();
        let mut save_manifest = false;
        db.recovery(&mut edit, &mut save_manifest)?;

        {
            let mut mem = db.mem.write().unwrap();
            let mut versions = db.versions.lock().unwrap();
            let mut wal = db.wal.lock().unwrap();
            if mem.is_none() {
                let new_log_number = versions.new_file_number();
                let file = env.new_writable_file(&log_file_name(&db_name, new_log_number))?;
                wal.log_file_number = new_log_number;
                wal.log = Some(LogWriter::new(file));
                *mem = Some(Arc::new(MemTable::new(db.internal_comparator.clone())));
            }

            if save_manifest {
                edit.set_prev_log_number(0);
                edit.set_log_number(wal.log_file_number);
                versions.log_and_apply(&mut edit)?;
            }
        }

        let db = LevelDB {
            inner: Arc::new(db),
        };
        db.run_compaction_worker();
        info!("database \"{}\" opened", db_name);
        Ok(db)
    }

    pub fn put(&self, options: &WriteOption, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.inner.write(options, Some(batch))
    }

    pub fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put(&WriteOption::default(), key, value)
    }

    pub fn delete(&self, options: &WriteOption, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.inner.write(options, Some(batch))
    }

    pub fn write_batch(&self, options: &WriteOption, batch: WriteBatch) -> Result<()> {
        self.inner.write(options, Some(batch))
    }

    /// Returns the value for `key` as of the latest sequence number, or
    /// `None` if there is no live entry for it.
    pub fn get(&self, options: &ReadOption, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(options, key)
    }

    /// Returns the number of files registered at `level` in the current
    /// version, backing the `leveldb.num-files-at-level<N>` property.
    pub fn num_files_at_level(&self, level: usize) -> usize {
        self.inner
            .versions
            .lock()
            .unwrap()
            .current()
            .map(|v| v.num_files(level))
            .unwrap_or(0)
    }

    /// Pins the current sequence number so subsequent `get` calls made
    /// with it see the database as of this moment, unaffected by writes
    /// that land afterward.
    pub fn get_snapshot(&self) -> Snapshot {
        Snapshot {
            sequence: self.inner.versions.lock().unwrap().last_sequence(),
        }
    }

    /// Releases a snapshot taken with `get_snapshot`. A no-op today since
    /// nothing yet pins files against deletion on a snapshot's behalf;
    /// kept as a distinct call so callers don't need to change when that
    /// lands.
    pub fn release_snapshot(&self, _snapshot: Snapshot) {}

    /// Reports an internal statistic by name, following leveldb's
    /// `leveldb.<name>` property convention. Returns `None` for anything
    /// not recognized.
    pub fn get_property(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix("leveldb.")?;
        if let Some(level) = rest.strip_prefix("num-files-at-level") {
            let level: usize = level.parse().ok()?;
            return Some(self.num_files_at_level(level).to_string());
        }
        match rest {
            "sequence" => Some(
                self.inner
                    .versions
                    .lock()
                    .unwrap()
                    .last_sequence()
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Builds an iterator over the merged, snapshot-filtered view of the
    /// database: the mutable memtable, the immutable memtable (if any),
    /// every level-0 file and one merged child per level ≥ 1.
    pub fn new_iterator(&self, option: &ReadOption) -> Box<dyn DBIterator> {
        self.inner.new_iterator(option)
    }

    /// Estimates the on-disk bytes covered by each of `ranges`, in order.
    pub fn get_approximate_sizes(&self, ranges: &[Range]) -> Vec<u64> {
        let current = self.inner.versions.lock().unwrap().current();
        ranges
            .iter()
            .map(|r| {
                current
                    .as_ref()
                    .map(|v| v.approximate_size(r.start, r.limit))
                    .unwrap_or(0)
            })
            .collect()
    }

    fn run_compaction_worker(&self) {
        let inner = self.inner.clone();
        thread::Builder::new()
            .name("compaction".to_string())
            .spawn(move || {
                while let Ok(_) = inner.compaction_trigger.1.recv() {
                    if inner.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    inner.background_compaction();
                }
            })
            .unwrap();
    }
}

impl<E: Env> Drop for LevelDB<E> {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        let _ = self.inner.compaction_trigger.0.send(());
    }
}

struct Wal<W: WritableFile> {
    pub log_file_number: u64,
    pub log: Option<LogWriter<W>>,
}

fn table_cache_size(sanitized_options: &Arc<Options>) -> u64 {
    sanitized_options.max_open_files - NUM_NON_TABLE_CACHE_FILES
}

pub struct DBImplInner<E: Env> {
    db_name: String,
    env: E,
    internal_comparator: InternalKeyComparator,
    options: Arc<Options>,
    table_cache: TableCache<E>,

    mem: RwLock<Option<Arc<MemTable>>>,
    imm: RwLock<Option<Arc<MemTable>>>,

    versions: Mutex<VersionSet<E>>,

    shutdown: AtomicBool,

    compaction_trigger: (Sender<()>, Receiver<()>),

    wal: Mutex<Wal<E::WritableFile>>,

    /// Serializes writers: leveldb's single-writer discipline is enforced
    /// here instead of via a queued-writer thread, since writes already
    /// complete synchronously on the calling thread.
    write_mutex: Mutex<()>,
}

unsafe impl<E: Env> Send for DBImplInner<E> {}
unsafe impl<E: Env> Sync for DBImplInner<E> {}

impl<E: Env> DBImplInner<E> {
    pub fn new(options: Options, db_name: impl Into<String>, env: E) -> Self {
        let db_name = db_name.into();
        let options = Arc::new(options);
        let table_cache = TableCache::new(
            db_name.clone(),
            options.clone(),
            env.clone(),
            table_cache_size(&options),
        );
        let icmp = InternalKeyComparator::new(options.comparator.clone());
        DBImplInner {
            internal_comparator: icmp.clone(),
            db_name: db_name.clone(),
            env: env.clone(),
            options: options.clone(),
            table_cache: table_cache.clone(),
            mem: RwLock::new(None),
            imm: RwLock::new(None),
            versions: Mutex::new(VersionSet::new(env, db_name, options, table_cache, icmp)),
            shutdown: AtomicBool::new(false),
            compaction_trigger: unbounded(),
            wal: Mutex::new(Wal {
                log_file_number: 0,
                log: None,
            }),
            write_mutex: Mutex::new(()),
        }
    }

    /// Ensures the active memtable has room for another write, rotating
    /// it into the immutable slot (and flushing that slot synchronously
    /// if one is already pending) when it has grown past the configured
    /// write-buffer size.
    fn make_room_for_write(&self, force: bool) -> Result<()> {
        let mut force = force;
        loop {
            let mem_usage = {
                let mem = self.mem.read().unwrap();
                mem.as_ref().unwrap().approximate_memory_usage()
            };

            if !force && mem_usage < self.options.write_buffer_size as usize {
                return Ok(());
            }

            if self.imm.read().unwrap().is_some() {
                // A flush is already queued; run it inline rather than
                // let writers race ahead of the memtable that still
                // needs to reach disk.
                self.compaction_memtable();
                force = false;
                continue;
            }

            let new_log_number = {
                let mut versions = self.versions.lock().unwrap();
                versions.new_file_number()
            };
            let new_log_file = self
                .env
                .new_writable_file(&log_file_name(&self.db_name, new_log_number))?;

            {
                let mut wal = self.wal.lock().unwrap();
                wal.log = Some(LogWriter::new(new_log_file));
                wal.log_file_number = new_log_number;
            }

            {
                let mut mem = self.mem.write().unwrap();
                let mut imm = self.imm.write().unwrap();
                *imm = mem.take();
                *mem = Some(Arc::new(MemTable::new(self.internal_comparator.clone())));
            }

            self.maybe_schedule_compaction();
            return Ok(());
        }
    }

    pub fn write(&self, options: &WriteOption, updates: Option<WriteBatch>) -> Result<()> {
        if let Some(mut batch) = updates {
            let _guard = self.write_mutex.lock().unwrap();
            self.make_room_for_write(false)?;
            self.write_inner(&mut batch, options)?;
        }
        Ok(())
    }

    pub fn recovery(&self, edit: &mut VersionEdit, save_manifest: &mut bool) -> Result<()> {
        let db_path = Path::new(&self.db_name);
        let _ = self.env.create_dir(db_path);
        if !self.env.file_exists(&current_file_name(db_path)) {
            if self.options.create_if_missing {
                self.new_db()?;
            } else {
                return Err(Error::InvalidArgument("db not exists".into()));
            }
        } else if self.options.error_if_exists {
            return Err(Error::InvalidArgument("db exists".into()));
        }

        let mut versions = self.versions.lock().unwrap();
        *save_manifest = versions.recover()?;

        let min_log = versions.log_number();
        let prev_log = versions.prev_log_number();
        let mut file_names = Vec::new();
        self.env.get_children(db_path, &mut file_names)?;
        let mut expect = HashSet::new();
        versions.live_files(&mut expect);

        let mut logs = Vec::new();
        for f in file_names.iter() {
            if let Ok((number, file_type)) = parse_file_name(f) {
                expect.remove(&number);
                if file_type == FileType::Log && (number >= min_log || number == prev_log) {
                    logs.push(number);
                }
            }
        }
        if !expect.is_empty() {
            return Err(Error::Corruption(
                format!("missing files: {:?}", expect).into(),
            ));
        }
        drop(versions);

        logs.sort();
        let mut max_sequence = 0;
        for (i, number) in logs.iter().enumerate() {
            self.recovery_log_file(
                *number,
                i == logs.len() - 1,
                save_manifest,
                edit,
                &mut max_sequence,
            )?;
        }

        let mut versions = self.versions.lock().unwrap();
        if logs.len() > 0 {
            versions.mark_file_number_used(*logs.last().unwrap());
        }
        if versions.last_sequence() < max_sequence {
            versions.set_last_sequence(max_sequence);
        }

        Ok(())
    }

    pub fn recovery_log_file(
        &self,
        log_number: u64,
        _last_log: bool,
        save_manifest: &mut bool,
        edit: &mut VersionEdit,
        max_sequence: &mut SequenceNumber,
    ) -> Result<()> {
        let fname = log_file_name(&self.db_name, log_number);
        let file = self.env.new_sequential_file(&fname)?;
        let mut log_reader = LogReader::new(file, true);

        let mut mem = None;

        let buffer_size = self.options.write_buffer_size;
        let mut compaction = 0;
        loop {
            let mut batch = WriteBatch::new();
            let mut record = Vec::with_capacity(1024);

            if log_reader.read_record(&mut record)?.is_none() {
                break;
            }

            batch.set_content(record);

            if mem.is_none() {
                mem.replace(Arc::new(MemTable::new(self.internal_comparator.clone())));
            }
            let memtable = mem.as_ref().unwrap();
            batch.insert_into(memtable.clone())?;

            let last_sequence = batch.sequence() + batch.count() as SequenceNumber - 1;
            if last_sequence > *max_sequence {
                *max_sequence = last_sequence;
            }

            if memtable.approximate_memory_usage() > buffer_size as usize {
                compaction += 1;
                *save_manifest = true;
                self.write_level0_table(memtable.clone(), edit, None)?;
                mem = None;
            }
        }
        debug!("recovered log {} ({} flush(es))", log_number, compaction);

        if let Some(m) = mem {
            self.write_level0_table(m, edit, None)?;
            *save_manifest = true;
        }
        Ok(())
    }

    /// Looks up `key` across the mutable memtable, the immutable
    /// memtable (if any) and the current on-disk version, in that
    /// order — the order in which fresher data can shadow older data.
    pub fn get(&self, option: &ReadOption, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let snapshot = option
            .snapshot
            .unwrap_or_else(|| self.versions.lock().unwrap().last_sequence());
        // VALUE_TYPE_FOR_SEEK is the numerically largest value type, so the
        // constructed key sorts before any real entry for this user key at
        // this sequence regardless of which type that entry actually has.
        let mem = self.mem.read().unwrap().as_ref().unwrap().clone();
        match mem.get(LookupKey::new(key, snapshot, ValueType::LargeValueRef))? {
            MemTableLookup::Found(v) => return Ok(Some(v)),
            MemTableLookup::Deleted => return Ok(None),
            MemTableLookup::NotFound => {}
        }

        if let Some(imm) = self.imm.read().unwrap().clone() {
            match imm.get(LookupKey::new(key, snapshot, ValueType::LargeValueRef))? {
                MemTableLookup::Found(v) => return Ok(Some(v)),
                MemTableLookup::Deleted => return Ok(None),
                MemTableLookup::NotFound => {}
            }
        }

        let current = self.versions.lock().unwrap().current();
        if let Some(version) = current {
            let lookup_key = LookupKey::new(key, snapshot, ValueType::LargeValueRef);
            return version.get(option, &lookup_key);
        }

        Ok(None)
    }

    /// Builds the merged, snapshot-filtered view described by
    /// `LevelDB::new_iterator`.
    pub fn new_iterator(&self, option: &ReadOption) -> Box<dyn DBIterator> {
        let sequence = option
            .snapshot
            .unwrap_or_else(|| self.versions.lock().unwrap().last_sequence());

        let mut children: Vec<Box<dyn DBIterator>> = Vec::new();

        if let Some(mem) = self.mem.read().unwrap().as_ref() {
            children.push(mem.iter());
        }
        if let Some(imm) = self.imm.read().unwrap().as_ref() {
            children.push(imm.iter());
        }

        if let Some(version) = self.versions.lock().unwrap().current() {
            for f in version.files[0].iter() {
                if let Ok(table) = self.table_cache.find_table(f.number, f.file_size) {
                    children.push(Box::new(Table::iter(table, option.clone())));
                }
            }
            for level in 1..version.files.len() {
                if version.files[level].is_empty() {
                    continue;
                }
                let index_iter =
                    LevelFileNumIterator::new(self.internal_comparator.clone(), version.files[level].clone());
                let builder = LevelTableIterBuilder {
                    table_cache: self.table_cache.clone(),
                };
                children.push(Box::new(TwoLevelIterator::new(
                    index_iter,
                    builder,
                    option.clone(),
                )));
            }
        }

        let merged = new_merging_iterator(self.internal_comparator.clone(), children);
        Box::new(DBIter::new(
            merged,
            self.internal_comparator.user_comparator(),
            sequence,
        ))
    }

    fn write_inner(&self, batch: &mut WriteBatch, options: &WriteOption) -> Result<()> {
        let versions = self.versions.lock().unwrap();
        let mut last_sequence = versions.last_sequence();
        batch.set_sequence(last_sequence + 1);
        last_sequence += batch.count() as u64;
        drop(versions);

        let mut wal = self.wal.lock().unwrap();
        let log_writter = wal.log.as_mut().unwrap();
        log_writter.add_record(batch.content())?;

        if options.sync {
            let res = log_writter.sync();
            if res.is_err() {
                warn!("log sync failed, treating write as applied but unflushed");
            }
            res?;
        }
        drop(wal);

        let mem = self.mem.read().unwrap();
        let mem = mem.as_ref().unwrap();
        batch.insert_into(mem.clone())?;

        let mut versions = self.versions.lock().unwrap();
        versions.set_last_sequence(last_sequence);

        Ok(())
    }

    pub fn delete_obsoleted_files(&self) {
        let mut live = HashSet::new();
        {
            let versions = self.versions.lock().unwrap();
            versions.live_files(&mut live);
        }
        let db_path = Path::new(&self.db_name);
        let mut file_names = Vec::new();
        if self.env.get_children(db_path, &mut file_names).is_err() {
            return;
        }
        for f in file_names.iter() {
            if let Ok((number, file_type)) = parse_file_name(f) {
                let keep = match file_type {
                    FileType::Log | FileType::Descriptor | FileType::Current | FileType::DBLock
                    | FileType::InfoLog | FileType::LargeValue => true,
                    FileType::Table => live.contains(&number),
                    FileType::Temp => false,
                };
                if !keep {
                    let path = db_path.join(f);
                    if self.env.delete_file(&path).is_ok() {
                        debug!("deleted obsolete file {}", f);
                    }
                }
            }
        }
    }

    fn write_level0_table(
        &self,
        mem: Arc<MemTable>,
        edit: &mut VersionEdit,
        base: Option<Arc<Version<E>>>,
    ) -> Result<()> {
        let mut versions = self.versions.lock().unwrap();
        let mut meta = FileMetaData::default();
        meta.number = versions.new_file_number();
        versions.pending_outputs.insert(meta.number);
        drop(versions);

        let iter = mem.iter();
        let res = build_table(
            &self.db_name,
            self.env.clone(),
            &self.options,
            self.table_cache.clone(),
            iter,
            &mut meta,
        );

        let mut versions = self.versions.lock().unwrap();
        versions.pending_outputs.remove(&meta.number);

        let mut level = 0;
        if res.is_ok() && meta.file_size > 0 {
            let smallest_user_key = meta.smallest.user_key();
            let largest_user_key = meta.largest.user_key();
            let base = base.or_else(|| versions.current());
            if let Some(v) = base {
                level = v.pick_level_for_memtable_output(
                    &Some(smallest_user_key),
                    &Some(largest_user_key),
                );
            }
            edit.add_new_file(
                level as u32,
                meta.number,
                meta.file_size,
                meta.smallest.clone(),
                meta.largest.clone(),
            );
        }

        info!(
            "flushed memtable to level {} as file {} ({} bytes)",
            level, meta.number, meta.file_size
        );
        res
    }

    fn background_compaction(&self) {
        if self.imm.read().unwrap().is_some() {
            self.compaction_memtable();
        }
    }

    pub fn compaction_memtable(&self) {
        if let Err(e) = self.do_compaction_memtable() {
            warn!("memtable compaction failed: {}", e);
        }
    }

    pub fn do_compaction_memtable(&self) -> Result<()> {
        let imm = self.imm.read().unwrap().as_ref().unwrap().clone();
        let mut edit = VersionEdit::default();
        let current = self.versions.lock().unwrap().current();

        self.write_level0_table(imm, &mut edit, current)?;
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::CustomError(
                "deleting db during memtable compaction".into(),
            ));
        }

        edit.set_prev_log_number(0);
        edit.set_log_number(self.wal.lock().unwrap().log_file_number);

        {
            let mut versions = self.versions.lock().unwrap();
            versions.log_and_apply(&mut edit)?;
        }

        let mut imm = self.imm.write().unwrap();
        *imm = None;

        self.delete_obsoleted_files();

        Ok(())
    }

    fn maybe_schedule_compaction(&self) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }

        let _ = self.compaction_trigger.0.send(());
    }

    fn new_db(&self) -> Result<()> {
        let mut edit = VersionEdit::default();
        let comparator = self.internal_comparator.user_comparator();
        edit.set_comparator(comparator.name());
        edit.set_log_number(0);
        edit.set_next_file_number(2);
        edit.set_last_sequence(0);

        let manifest = descriptor_file_name(&self.db_name, 1);
        let file = self.env.new_writable_file(&manifest)?;
        let mut log = LogWriter::new(file);
        let mut record = Vec::new();
        edit.encode(&mut record);

        let mut res = log.add_record(record);
        if res.is_ok() {
            res = set_current_file(self.env.clone(), &self.db_name, 1);
        } else {
            let _ = self.env.delete_file(&manifest);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use crate::env::posix::PosixEnv;

    use super::*;

    #[test]
    fn test_base_insert() {
        let mut options = Options::default();
        options.create_if_missing = true;
        let db_name = "demo";
        let env = PosixEnv {};
        let db = LevelDB::open(options, db_name, env).unwrap();

        db.write("liu".as_bytes(), "zhong".as_bytes()).unwrap();
        assert_eq!(
            db.get(&ReadOption::default(), "liu".as_bytes()).unwrap(),
            Some("zhong".as_bytes().to_vec())
        );
    }
}
