//! RAM-backed [`BlockStorage`], used by tests and the desktop simulator.
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{BlockStorage, DirEntry, Metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemError {
    NotFound,
    NoParent,
    IsDirectory,
    /// Failure requested through [`MemStorage::fail_after`].
    Injected,
}

#[derive(Debug, Default)]
struct File {
    data: Vec<u8>,
    modified_ms: Option<u64>,
}

#[derive(Debug)]
pub struct MemStorage {
    files: BTreeMap<String, File>,
    dirs: BTreeSet<String>,
    now_ms: Option<u64>,
    fail_after: Option<usize>,
    fail_renames: bool,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

impl MemStorage {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(String::from("/"));
        Self {
            files: BTreeMap::new(),
            dirs,
            now_ms: Some(0),
            fail_after: None,
            fail_renames: false,
        }
    }

    /// Modification time stamped on subsequent writes. `None` models a
    /// medium without timestamps.
    pub fn set_time(&mut self, now_ms: Option<u64>) {
        self.now_ms = now_ms;
    }

    /// Let `ops` more mutating operations succeed, then fail every one.
    pub fn fail_after(&mut self, ops: Option<usize>) {
        self.fail_after = ops;
    }

    pub fn fail_renames(&mut self, fail: bool) {
        self.fail_renames = fail;
    }

    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|f| f.data.as_slice())
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Writes a file directly, bypassing failure injection.
    pub fn insert(&mut self, path: &str, data: &[u8]) {
        let mut dir = parent(path);
        while dir != "/" {
            self.dirs.insert(dir.to_string());
            dir = parent(dir);
        }
        let file = File { data: data.to_vec(), modified_ms: self.now_ms };
        self.files.insert(path.to_string(), file);
    }

    fn check(&mut self) -> Result<(), MemError> {
        match self.fail_after.as_mut() {
            Some(0) => Err(MemError::Injected),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn writable(&mut self, path: &str) -> Result<(), MemError> {
        self.check()?;
        if self.dirs.contains(path) {
            return Err(MemError::IsDirectory);
        }
        if !self.dirs.contains(parent(path)) {
            return Err(MemError::NoParent);
        }
        Ok(())
    }
}

impl BlockStorage for MemStorage {
    type Error = MemError;

    fn create_dir_all(&mut self, path: &str) -> Result<(), MemError> {
        self.check()?;
        let mut dir = path.trim_end_matches('/');
        while !dir.is_empty() {
            if self.files.contains_key(dir) {
                return Err(MemError::IsDirectory);
            }
            self.dirs.insert(dir.to_string());
            dir = match dir.rfind('/') {
                Some(i) => &dir[..i],
                None => "",
            };
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, MemError> {
        Ok(self.files.contains_key(path) || self.dirs.contains(path))
    }

    fn create(&mut self, path: &str) -> Result<(), MemError> {
        self.writable(path)?;
        let file = File { data: Vec::new(), modified_ms: self.now_ms };
        self.files.insert(path.to_string(), file);
        Ok(())
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<(), MemError> {
        self.writable(path)?;
        let now = self.now_ms;
        let file = self.files.entry(path.to_string()).or_default();
        file.data.extend_from_slice(data);
        file.modified_ms = now;
        Ok(())
    }

    fn read_at(
        &self,
        path: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, MemError> {
        let file = self.files.get(path).ok_or(MemError::NotFound)?;
        let start = (offset as usize).min(file.data.len());
        let n = buf.len().min(file.data.len() - start);
        buf[..n].copy_from_slice(&file.data[start..start + n]);
        Ok(n)
    }

    fn metadata(&self, path: &str) -> Result<Metadata, MemError> {
        if let Some(file) = self.files.get(path) {
            return Ok(Metadata {
                size: file.data.len() as u64,
                modified_ms: file.modified_ms,
                is_dir: false,
            });
        }
        if self.dirs.contains(path) {
            return Ok(Metadata { size: 0, modified_ms: None, is_dir: true });
        }
        Err(MemError::NotFound)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), MemError> {
        self.writable(to)?;
        if self.fail_renames {
            return Err(MemError::Injected);
        }
        let file = self.files.remove(from).ok_or(MemError::NotFound)?;
        self.files.insert(to.to_string(), file);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), MemError> {
        self.check()?;
        if self.files.remove(path).is_some() {
            return Ok(());
        }
        let prefix = alloc::format!("{}/", path);
        let occupied = self.files.keys().any(|k| k.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix));
        if !occupied && self.dirs.remove(path) {
            return Ok(());
        }
        Err(MemError::NotFound)
    }

    fn list(&self, dir: &str) -> Result<Vec<DirEntry>, MemError> {
        if !self.dirs.contains(dir) {
            return Err(MemError::NotFound);
        }
        let mut entries = Vec::new();
        for (path, file) in &self.files {
            if parent(path) == dir {
                entries.push(DirEntry {
                    name: super::basename(path).to_string(),
                    meta: Metadata {
                        size: file.data.len() as u64,
                        modified_ms: file.modified_ms,
                        is_dir: false,
                    },
                });
            }
        }
        for path in &self.dirs {
            if path != dir && parent(path) == dir {
                entries.push(DirEntry {
                    name: super::basename(path).to_string(),
                    meta: Metadata { size: 0, modified_ms: None, is_dir: true },
                });
            }
        }
        Ok(entries)
    }

    fn sync(&mut self, path: &str) -> Result<(), MemError> {
        self.check()?;
        if !self.files.contains_key(path) {
            return Err(MemError::NotFound);
        }
        Ok(())
    }
}
