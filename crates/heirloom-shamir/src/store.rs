//! Fragment persistence
//!
//! A vault's fragments are stored as one unit: a store either holds every
//! fragment of a distribution or none of them.

use crate::fragment::Fragment;
use crate::FragmentError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Backend for encrypted fragments, keyed by vault id.
pub trait FragmentStore {
    /// All fragments for a vault, or `None` if none were distributed.
    fn load(&self, vault_id: u64) -> Result<Option<Vec<Fragment>>, FragmentError>;

    /// Store a complete distribution.
    ///
    /// Fails with [`FragmentError::FragmentsExist`] if the vault already
    /// has fragments; existing fragments are never overwritten.
    fn store_all(&mut self, vault_id: u64, fragments: Vec<Fragment>) -> Result<(), FragmentError>;

    /// Delete a vault's fragments. Returns whether anything was removed.
    fn delete(&mut self, vault_id: u64) -> Result<bool, FragmentError>;
}

/// In-memory store, used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryFragmentStore {
    vaults: HashMap<u64, Vec<Fragment>>,
}

impl MemoryFragmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FragmentStore for MemoryFragmentStore {
    fn load(&self, vault_id: u64) -> Result<Option<Vec<Fragment>>, FragmentError> {
        Ok(self.vaults.get(&vault_id).cloned())
    }

    fn store_all(&mut self, vault_id: u64, fragments: Vec<Fragment>) -> Result<(), FragmentError> {
        if self.vaults.contains_key(&vault_id) {
            return Err(FragmentError::FragmentsExist(vault_id));
        }
        self.vaults.insert(vault_id, fragments);
        Ok(())
    }

    fn delete(&mut self, vault_id: u64) -> Result<bool, FragmentError> {
        Ok(self.vaults.remove(&vault_id).is_some())
    }
}

/// One JSON file per vault: `<dir>/<vault_id>.fragments.json`.
///
/// Writes go to a temporary file in the same directory and are renamed
/// into place, so a crash never leaves a partial distribution behind.
#[derive(Debug, Clone)]
pub struct FileFragmentStore {
    dir: PathBuf,
}

impl FileFragmentStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FragmentError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, vault_id: u64) -> PathBuf {
        self.dir.join(format!("{}.fragments.json", vault_id))
    }
}

impl FragmentStore for FileFragmentStore {
    fn load(&self, vault_id: u64) -> Result<Option<Vec<Fragment>>, FragmentError> {
        let path = self.path_for(vault_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let fragments: Vec<Fragment> = serde_json::from_str(&contents)?;
        for fragment in &fragments {
            fragment.validate()?;
            if fragment.vault_id != vault_id {
                return Err(FragmentError::Store(format!(
                    "{} contains a fragment for vault {}",
                    path.display(),
                    fragment.vault_id
                )));
            }
        }
        Ok(Some(fragments))
    }

    fn store_all(&mut self, vault_id: u64, fragments: Vec<Fragment>) -> Result<(), FragmentError> {
        let path = self.path_for(vault_id);
        if path.exists() {
            return Err(FragmentError::FragmentsExist(vault_id));
        }
        let contents = serde_json::to_string_pretty(&fragments)?;
        let tmp = self.dir.join(format!(".{}.fragments.json.tmp", vault_id));
        fs::write(&tmp, contents)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        log::debug!("Stored {} fragments at {}", fragments.len(), path.display());
        Ok(())
    }

    fn delete(&mut self, vault_id: u64) -> Result<bool, FragmentError> {
        let path = self.path_for(vault_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}
