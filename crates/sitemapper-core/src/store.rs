//! Destination storage for published files.
//!
//! Stores deal in whole files addressed by a flat name. Publishing is
//! all-or-nothing at this boundary: a reader sees either the previous content or
//! the new content, never a partial write.

use crate::config::{StoreConfig, StoreKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Whole-file blob storage.
pub trait FileStore: Send + Sync {
    /// Replace the file `name` with everything read from `content`.
    fn save(&self, name: &str, content: &mut dyn Read) -> Result<()>;

    /// Open the file `name`. A file that does not exist yet reads as empty.
    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>>;
}

impl<T: FileStore + ?Sized> FileStore for Arc<T> {
    fn save(&self, name: &str, content: &mut dyn Read) -> Result<()> {
        (**self).save(name, content)
    }

    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        (**self).get(name)
    }
}

/// Build the store selected by configuration.
pub fn file_store(config: &StoreConfig) -> Result<Arc<dyn FileStore>> {
    match config.kind {
        StoreKind::Local => Ok(Arc::new(LocalStore::new(&config.root)?)),
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Reject names that could escape the store root.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Store("file name cannot be empty".into()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::Store(format!(
            "invalid file name '{name}': contains path traversal characters"
        )));
    }
    if name.starts_with('.') || name.contains('\0') {
        return Err(Error::Store(format!(
            "invalid file name '{name}': contains invalid filesystem characters"
        )));
    }
    Ok(())
}

/// Files in a local directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .map_err(|e| Error::Store(format!("Failed to create store directory: {e}")))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Directory files are stored in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stored file.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl FileStore for LocalStore {
    fn save(&self, name: &str, content: &mut dyn Read) -> Result<()> {
        let path = self.path(name)?;

        // Write next to the target, then rename into place
        let tmp_path = self.root.join(format!("{name}.tmp"));
        if let Err(e) = write_file(&tmp_path, content) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Store(format!("Failed to write {name}: {e}")));
        }

        #[cfg(target_os = "windows")]
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| Error::Store(format!("Failed to remove existing {name}: {e}")))?;
        }

        fs::rename(&tmp_path, &path)
            .map_err(|e| Error::Store(format!("Failed to commit {name}: {e}")))?;

        debug!(name, path = %path.display(), "Saved file");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.path(name)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Box::new(io::empty())),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn write_file(path: &Path, content: &mut dyn Read) -> io::Result<()> {
    let mut file = File::create(path)?;
    io::copy(content, &mut file)?;
    file.sync_all()
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `name` as UTF-8, if present.
    pub fn contents(&self, name: &str) -> Option<String> {
        let files = self.files.read().ok()?;
        files
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Names of all stored files, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl FileStore for MemoryStore {
    fn save(&self, name: &str, content: &mut dyn Read) -> Result<()> {
        validate_name(name)?;
        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Store(format!("Failed to read {name}: {e}")))?;
        self.files
            .write()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))?
            .insert(name.to_string(), bytes);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        validate_name(name)?;
        let bytes = self
            .files
            .read()
            .map_err(|_| Error::Other("memory store lock poisoned".into()))?
            .get(name)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(Cursor::new(bytes)))
    }
}
