#![allow(dead_code)]

mod builder;
mod cmp;
mod codec;
mod consts;
mod db;
mod db_impl;
mod db_iter;
mod env;
mod error;
mod filenames;
mod filter;
mod format;
mod iterator;
mod large_value;
mod log;
mod memtable;
mod merge;
mod options;
mod repairer;
mod skiplist;
mod slice;
mod table;
mod table_cache;
mod types;
mod utils;
mod version;
mod version_edit;
mod version_set;
mod write_batch;

pub use db::{destroy_db, repair_db, Range};
pub use db_impl::LevelDB;
pub use env::mem::MemEnv;
pub use env::posix::PosixEnv;
pub use env::Env;
pub use iterator::DBIterator;
pub use large_value::LargeValueRef;
pub use log::{LogReader, LogWriter};
pub use memtable::{LookupKey, MemTable};
pub use options::{Options, ReadOption, WriteOption};
pub use types::ValueType;

#[derive(PartialEq)]
pub enum Forward {
    FORWARD = 0,
    BACKWARD = 1,
}
