use std::{
    collections::HashMap,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use super::{Env, IoResult, RandomAccessFile, SequencialFile, WritableFile};

type SharedData = Arc<Mutex<Vec<u8>>>;

fn short_read() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "short read")
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file", path.display()),
    )
}

pub struct MemRandomAccessFile(SharedData);

impl RandomAccessFile for MemRandomAccessFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<usize> {
        let data = self.0.lock().unwrap();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> IoResult<()> {
        let n = self.read_at(buf, offset)?;
        if n != buf.len() {
            return Err(short_read().into());
        }
        Ok(())
    }
}

pub struct MemWritableFile(SharedData);

impl WritableFile for MemWritableFile {
    fn append(&mut self, data: &[u8]) -> IoResult<()> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> IoResult<()> {
        Ok(())
    }
}

pub struct MemSequentialFile {
    data: SharedData,
    pos: usize,
}

impl SequencialFile for MemSequentialFile {
    fn read_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        let data = self.data.lock().unwrap();
        if self.pos + buf.len() > data.len() {
            return Err(short_read().into());
        }
        buf.copy_from_slice(&data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn read_to_string(&mut self, buf: &mut String) -> IoResult<()> {
        let data = self.data.lock().unwrap();
        let mut rest = &data[self.pos..];
        let n = rest.read_to_string(buf).map_err(io::Error::from)?;
        self.pos += n;
        Ok(())
    }
}

/// An in-memory [`Env`] for tests: every "file" is a `Vec<u8>` behind a
/// shared map, so nothing touches disk and tests don't need cleanup.
#[derive(Clone, Default)]
pub struct MemEnv {
    files: Arc<Mutex<HashMap<PathBuf, SharedData>>>,
}

impl MemEnv {
    pub fn new() -> Self {
        MemEnv::default()
    }
}

impl Env for MemEnv {
    type RandomAccessFile = MemRandomAccessFile;

    type WritableFile = MemWritableFile;

    type SequencialFile = MemSequentialFile;

    fn new_random_access_file(&self, name: &Path) -> IoResult<Self::RandomAccessFile> {
        let files = self.files.lock().unwrap();
        let data = files.get(name).cloned().ok_or_else(|| not_found(name))?;
        Ok(MemRandomAccessFile(data))
    }

    fn new_writable_file(&self, name: &Path) -> IoResult<Self::WritableFile> {
        let mut files = self.files.lock().unwrap();
        let data = files
            .entry(name.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())));
        data.lock().unwrap().clear();
        Ok(MemWritableFile(data.clone()))
    }

    fn file_size(&self, path: &Path) -> IoResult<usize> {
        let files = self.files.lock().unwrap();
        let data = files.get(path).ok_or_else(|| not_found(path))?;
        Ok(data.lock().unwrap().len())
    }

    fn new_sequential_file(&self, name: &Path) -> IoResult<Self::SequencialFile> {
        let files = self.files.lock().unwrap();
        let data = files.get(name).cloned().ok_or_else(|| not_found(name))?;
        Ok(MemSequentialFile { data, pos: 0 })
    }

    fn delete_file(&self, path: &Path) -> IoResult<()> {
        let mut files = self.files.lock().unwrap();
        files.remove(path).ok_or_else(|| not_found(path))?;
        Ok(())
    }

    fn create_dir(&self, _path: &Path) -> IoResult<()> {
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> IoResult<()> {
        let mut files = self.files.lock().unwrap();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn get_children(&self, path: &Path, files: &mut Vec<String>) -> IoResult<()> {
        let guard = self.files.lock().unwrap();
        for name in guard.keys() {
            if let Ok(rest) = name.strip_prefix(path) {
                if let Some(first) = rest.components().next() {
                    files.push(first.as_os_str().to_string_lossy().into_owned());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let env = MemEnv::new();
        let path = Path::new("/db/000001.log");

        let mut w = env.new_writable_file(path).unwrap();
        w.append(b"hello ").unwrap();
        w.append(b"world").unwrap();

        assert_eq!(env.file_size(path).unwrap(), 11);

        let mut seq = env.new_sequential_file(path).unwrap();
        let mut buf = [0u8; 5];
        seq.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        let rand = env.new_random_access_file(path).unwrap();
        let mut buf = [0u8; 5];
        rand.read_exact_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn delete_and_rename() {
        let env = MemEnv::new();
        let a = Path::new("/db/a");
        let b = Path::new("/db/b");

        env.new_writable_file(a).unwrap().append(b"x").unwrap();
        assert!(env.file_exists(a));

        env.rename_file(a, b).unwrap();
        assert!(!env.file_exists(a));
        assert!(env.file_exists(b));

        env.delete_file(b).unwrap();
        assert!(!env.file_exists(b));
    }

    #[test]
    fn get_children_lists_immediate_entries() {
        let env = MemEnv::new();
        env.new_writable_file(Path::new("/db/000001.log")).unwrap();
        env.new_writable_file(Path::new("/db/000002.log")).unwrap();
        env.new_writable_file(Path::new("/other/000003.log"))
            .unwrap();

        let mut children = Vec::new();
        env.get_children(Path::new("/db"), &mut children).unwrap();
        children.sort();
        assert_eq!(children, vec!["000001.log", "000002.log"]);
    }
}
