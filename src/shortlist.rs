// Shortlist of molecules selected for export.
//
// The store owns the ordered list in memory and writes the whole list back
// through its storage backend after every mutation. Callers sharing a store
// between users must hold an exclusive lock around load/add/clear.
use crate::error::{Error, Result};
use log::debug;
#[cfg(test)]
use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Durable home of the shortlist.
pub trait ShortlistStorage {
    /// `Ok(None)` when nothing has been persisted yet.
    fn read(&self) -> Result<Option<Vec<String>>>;
    fn write(&self, ids: &[String]) -> Result<()>;
}

/// JSON array of molecule ids in a single file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn fail(&self, reason: impl ToString) -> Error {
        Error::Persistence { path: self.path.clone(), reason: reason.to_string() }
    }
}

impl ShortlistStorage for FileStorage {
    fn read(&self) -> Result<Option<Vec<String>>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.fail(e)),
        };
        let ids: Vec<String> = serde_json::from_str(&text).map_err(|e| self.fail(e))?;
        Ok(Some(ids))
    }

    fn write(&self, ids: &[String]) -> Result<()> {
        let json = serde_json::to_string(ids).map_err(|e| self.fail(e))?;
        // Write beside the target and rename over it so readers never see a
        // half-written list.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| self.fail(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.fail(e))?;
        debug!("Persisted {} shortlist entries to {}", ids.len(), self.path.display());
        Ok(())
    }
}

/// In-process backend for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    saved: RefCell<Option<Vec<String>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with(ids: &[&str]) -> Self {
        Self { saved: RefCell::new(Some(ids.iter().map(|s| s.to_string()).collect())) }
    }

    pub fn saved(&self) -> Option<Vec<String>> {
        self.saved.borrow().clone()
    }
}

#[cfg(test)]
impl ShortlistStorage for MemoryStorage {
    fn read(&self) -> Result<Option<Vec<String>>> {
        Ok(self.saved.borrow().clone())
    }

    fn write(&self, ids: &[String]) -> Result<()> {
        *self.saved.borrow_mut() = Some(ids.to_vec());
        Ok(())
    }
}

/// Ordered, duplicate-free list of molecule ids.
#[derive(Debug)]
pub struct ShortlistStore<S: ShortlistStorage> {
    storage: S,
    ids: Vec<String>,
}

impl<S: ShortlistStorage> ShortlistStore<S> {
    /// Load persisted state, starting empty when there is none.
    pub fn load(storage: S) -> Result<Self> {
        let mut ids: Vec<String> = Vec::new();
        // Older files may carry duplicates; keep the first occurrence.
        for id in storage.read()?.unwrap_or_default() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(Self { storage, ids })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, molecule: &str) -> bool {
        self.ids.iter().any(|m| m == molecule)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append a molecule. Returns `false` (and writes nothing) when the id is
    /// blank or already listed.
    pub fn add(&mut self, molecule: &str) -> Result<bool> {
        let molecule = molecule.trim();
        if molecule.is_empty() || self.contains(molecule) {
            return Ok(false);
        }
        self.ids.push(molecule.to_string());
        self.storage.write(&self.ids)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ids.clear();
        self.storage.write(&self.ids)
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
