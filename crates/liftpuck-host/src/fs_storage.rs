//! [`BlockStorage`] over a directory on the host filesystem.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use liftpuck_core::storage::{BlockStorage, DirEntry, Metadata};

/// Maps device paths (`/sessions/x.csv`) below `root`.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn to_metadata(meta: &fs::Metadata) -> Metadata {
    let modified_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64);
    Metadata { size: meta.len(), modified_ms, is_dir: meta.is_dir() }
}

impl BlockStorage for FsStorage {
    type Error = io::Error;

    fn create_dir_all(&mut self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path))
    }

    fn exists(&self, path: &str) -> io::Result<bool> {
        self.resolve(path).try_exists()
    }

    fn create(&mut self, path: &str) -> io::Result<()> {
        File::create(self.resolve(path)).map(drop)
    }

    fn append(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.resolve(path))?
            .write_all(data)
    }

    fn read_at(&self, path: &str, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = File::open(self.resolve(path))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }

    fn metadata(&self, path: &str) -> io::Result<Metadata> {
        fs::metadata(self.resolve(path)).map(|m| to_metadata(&m))
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))
    }

    fn remove(&mut self, path: &str) -> io::Result<()> {
        let path = self.resolve(path);
        if path.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn list(&self, dir: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(dir))? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                meta: to_metadata(&entry.metadata()?),
            });
        }
        Ok(entries)
    }

    fn sync(&mut self, path: &str) -> io::Result<()> {
        OpenOptions::new().append(true).open(self.resolve(path))?.sync_all()
    }
}
