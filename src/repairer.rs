use std::mem;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::cmp::{Comparator, InternalKeyComparator};
use crate::env::Env;
use crate::error::Result;
use crate::filenames::{
    descriptor_file_name, log_file_name, lost_dir_name, parse_file_name, set_current_file,
    table_file_name, FileType,
};
use crate::format::InternalKey;
use crate::iterator::DBIterator;
use crate::large_value::LargeValueRef;
use crate::options::{Options, ReadOption};
use crate::table::table::TableBuiler;
use crate::table_cache::TableCache;
use crate::types::SequenceNumber;
use crate::version::FileMetaData;
use crate::version_edit::VersionEdit;
use crate::write_batch::{Handler, WriteBatch};
use crate::{LogReader, LogWriter, ValueType};

/// Rebuilds a usable descriptor for a database whose manifest is missing or
/// unreadable: every log still on disk is replayed into a fresh table,
/// every table's key range is re-derived by scanning it directly, and the
/// result is published as a single-manifest, all-at-level-0 descriptor.
/// Files the repairer can't trust are moved under `lost/`, never deleted.
pub fn repair_db<E: Env>(db_name: &str, options: Arc<Options>, env: E) -> Result<()> {
    Repairer::new(db_name, options, env).run()
}

struct Repairer<E: Env> {
    db_name: String,
    env: E,
    options: Arc<Options>,
    icmp: InternalKeyComparator,
    table_cache: TableCache<E>,

    logs: Vec<u64>,
    table_numbers: Vec<u64>,
    manifests: Vec<String>,
    next_file_number: u64,
    tables: Vec<FileMetaData>,
    large_value_refs: Vec<(LargeValueRef, u64, InternalKey)>,
    max_sequence: SequenceNumber,
}

impl<E: Env> Repairer<E> {
    fn new(db_name: &str, options: Arc<Options>, env: E) -> Self {
        let icmp = InternalKeyComparator::new(options.comparator.clone());
        let table_cache = TableCache::new(
            db_name.to_string(),
            options.clone(),
            env.clone(),
            options.max_open_files,
        );
        Repairer {
            db_name: db_name.to_string(),
            env,
            options,
            icmp,
            table_cache,
            logs: Vec::new(),
            table_numbers: Vec::new(),
            manifests: Vec::new(),
            next_file_number: 1,
            tables: Vec::new(),
            large_value_refs: Vec::new(),
            max_sequence: 0,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.find_files()?;
        self.convert_logs_to_tables();
        self.extract_metadata();
        self.write_descriptor()?;
        self.archive_manifests();
        info!(
            "repair of \"{}\" complete: {} table(s) recovered",
            self.db_name,
            self.tables.len()
        );
        Ok(())
    }

    fn find_files(&mut self) -> Result<()> {
        let db_path = Path::new(&self.db_name);
        let _ = self.env.create_dir(db_path);
        let mut file_names = Vec::new();
        self.env.get_children(db_path, &mut file_names)?;

        for f in file_names.iter() {
            if let Ok((number, file_type)) = parse_file_name(f) {
                if number + 1 > self.next_file_number {
                    self.next_file_number = number + 1;
                }
                match file_type {
                    FileType::Log => self.logs.push(number),
                    FileType::Table => self.table_numbers.push(number),
                    FileType::Descriptor => self.manifests.push(f.clone()),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn convert_logs_to_tables(&mut self) {
        let logs = self.logs.clone();
        for log_number in logs {
            match self.convert_log_to_table(log_number) {
                Ok(Some(number)) => self.table_numbers.push(number),
                Ok(None) => {}
                Err(e) => warn!("log {} could not be converted: {}", log_number, e),
            }
            self.archive_file(&log_file_name(&self.db_name, log_number));
        }
    }

    fn convert_log_to_table(&mut self, log_number: u64) -> Result<Option<u64>> {
        let log_name = log_file_name(&self.db_name, log_number);
        let file = self.env.new_sequential_file(&log_name)?;
        let mut reader = LogReader::new(file, true);

        let mut entries: Vec<(InternalKey, Vec<u8>)> = Vec::new();
        let mut record = Vec::new();
        let mut dropped = 0;
        loop {
            match reader.read_record(&mut record) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    dropped += 1;
                    warn!("log {}: dropping unreadable record: {}", log_number, e);
                    continue;
                }
            }

            let mut batch = WriteBatch::new();
            batch.set_content(mem::take(&mut record));
            let sequence = batch.sequence();
            let collector = EntryCollector {
                sequence,
                entries: &mut entries,
            };
            if let Err(e) = batch.iterate(collector) {
                dropped += 1;
                warn!("log {}: dropping malformed batch: {}", log_number, e);
            }
        }
        if dropped > 0 {
            warn!("log {}: {} record(s) dropped during repair", log_number, dropped);
        }

        if entries.is_empty() {
            return Ok(None);
        }

        entries.sort_by(|a, b| self.icmp.compare(a.0.encode(), b.0.encode()));

        let table_number = self.next_file_number;
        self.next_file_number += 1;
        let table_name = table_file_name(&self.db_name, table_number);
        let file = self.env.new_writable_file(&table_name)?;
        let mut builder = TableBuiler::new(self.options.clone(), file);
        for (key, value) in entries.iter() {
            builder.add(key.encode(), value)?;
        }
        builder.finish(true)?;

        info!("log {} recovered into table {}", log_number, table_number);
        Ok(Some(table_number))
    }

    fn extract_metadata(&mut self) {
        let table_numbers = self.table_numbers.clone();
        for number in table_numbers {
            match self.scan_table(number) {
                Ok((meta, lvrefs, max_sequence)) => {
                    self.tables.push(meta);
                    self.large_value_refs.extend(lvrefs);
                    if max_sequence > self.max_sequence {
                        self.max_sequence = max_sequence;
                    }
                }
                Err(e) => {
                    warn!("table {} unreadable, archiving: {}", number, e);
                    self.archive_file(&table_file_name(&self.db_name, number));
                }
            }
        }
    }

    fn scan_table(
        &self,
        number: u64,
    ) -> Result<(FileMetaData, Vec<(LargeValueRef, u64, InternalKey)>, SequenceNumber)> {
        let table_name = table_file_name(&self.db_name, number);
        let file_size = self.env.file_size(&table_name)? as u64;
        let table = self.table_cache.find_table(number, file_size)?;
        let mut iter = table.iter(ReadOption::default());
        iter.seek_to_first();

        let mut meta = FileMetaData::default();
        meta.number = number;
        meta.file_size = file_size;
        let mut lvrefs = Vec::new();
        // The largest internal key is the largest *user* key (internal
        // order sorts by user key first), so its sequence number has no
        // relation to the table's true maximum; that has to be tracked
        // across every entry instead.
        let mut max_sequence: SequenceNumber = 0;

        let mut first = true;
        while iter.valid() {
            let parsed = crate::format::ParsedInternalKey::parse(iter.key());
            let key = InternalKey::new(parsed.user_key, parsed.sequence, parsed.val_type);
            if parsed.sequence > max_sequence {
                max_sequence = parsed.sequence;
            }
            if parsed.val_type == ValueType::LargeValueRef {
                if let Ok(lvref) = LargeValueRef::decode(iter.value()) {
                    lvrefs.push((lvref, number, key.clone()));
                }
            }
            if first {
                meta.smallest = key.clone();
                first = false;
            }
            meta.largest = key;
            iter.next();
        }
        iter.status()?;
        Ok((meta, lvrefs, max_sequence))
    }

    fn write_descriptor(&mut self) -> Result<()> {
        let mut edit = VersionEdit::default();
        edit.set_comparator(self.icmp.user_comparator().name());
        edit.set_log_number(0);
        edit.set_prev_log_number(0);
        edit.set_next_file_number(self.next_file_number);

        for meta in self.tables.iter() {
            edit.add_new_file(
                0,
                meta.number,
                meta.file_size,
                meta.smallest.clone(),
                meta.largest.clone(),
            );
        }
        edit.set_last_sequence(self.max_sequence);

        for (lvref, file_num, ikey) in self.large_value_refs.iter() {
            edit.add_large_value_ref(lvref.clone(), *file_num, ikey.clone());
        }

        let manifest_name = descriptor_file_name(&self.db_name, 1);
        let file = self.env.new_writable_file(&manifest_name)?;
        let mut writer = LogWriter::new(file);
        let mut record = Vec::new();
        edit.encode(&mut record);
        writer.add_record(&record)?;
        writer.sync()?;

        set_current_file(self.env.clone(), &self.db_name, 1)?;
        Ok(())
    }

    fn archive_manifests(&self) {
        for name in self.manifests.iter() {
            self.archive_file(&Path::new(&self.db_name).join(name));
        }
    }

    fn archive_file(&self, path: &Path) {
        let lost_dir = lost_dir_name(&self.db_name);
        let _ = self.env.create_dir(&lost_dir);
        if let Some(base) = path.file_name() {
            let _ = self.env.rename_file(path, &lost_dir.join(base));
        }
    }
}

struct EntryCollector<'a> {
    sequence: SequenceNumber,
    entries: &'a mut Vec<(InternalKey, Vec<u8>)>,
}

impl<'a> Handler for EntryCollector<'a> {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.entries
            .push((InternalKey::new(key, self.sequence, ValueType::Value), value.to_vec()));
        self.sequence += 1;
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries
            .push((InternalKey::new(key, self.sequence, ValueType::Deletion), Vec::new()));
        self.sequence += 1;
    }
}
