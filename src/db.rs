use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::env::Env;
use crate::error::Result;
use crate::filenames::parse_file_name;
use crate::options::Options;
use crate::repairer;

/// A half-open byte range `[start, limit)` over user keys, as passed to
/// `LevelDB::get_approximate_sizes`.
pub struct Range<'a> {
    pub start: &'a [u8],
    pub limit: &'a [u8],
}

impl<'a> Range<'a> {
    pub fn new(start: &'a [u8], limit: &'a [u8]) -> Self {
        Range { start, limit }
    }
}

/// Removes every file belonging to the database at `db_name`.
pub fn destroy_db<E: Env>(db_name: &str, env: E) -> Result<()> {
    let db_path = Path::new(db_name);
    let mut file_names = Vec::new();
    if env.get_children(db_path, &mut file_names).is_err() {
        return Ok(());
    }

    for f in file_names.iter() {
        if parse_file_name(f).is_ok() {
            let _ = env.delete_file(&db_path.join(f));
        }
    }
    info!("destroyed database \"{}\"", db_name);
    Ok(())
}

/// Rebuilds a usable descriptor for a database whose manifest is missing
/// or corrupted, per the repair procedure in [`repairer`].
pub fn repair_db<E: Env>(db_name: &str, options: Options, env: E) -> Result<()> {
    repairer::repair_db(db_name, Arc::new(options), env)
}
