//! Persistence for [`VectorIndex`]es.
//!
//! [`FileIndexStorage`] writes the index as JSON to a temporary file next to
//! the target and renames it into place, so a failed or interrupted write
//! never leaves a partial index at the configured path.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// A location a [`VectorIndex`] can be saved to and loaded from.
///
/// Each save replaces whatever was stored before.
pub trait IndexStorage: Send + Sync {
    /// Human-readable location, used in errors and logs.
    fn location(&self) -> String;

    /// Replace the stored index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWrite`] if the index could not be written.
    fn save(&self, index: &VectorIndex) -> Result<()>;

    /// Read the stored index back.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreLoad`] if nothing is stored or the stored
    /// data is corrupt.
    fn load(&self) -> Result<VectorIndex>;
}

/// Stores the index as a JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct FileIndexStorage {
    path: PathBuf,
}

impl FileIndexStorage {
    /// Create a storage backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, message: impl std::fmt::Display) -> RagError {
        RagError::StoreWrite { path: self.location(), message: message.to_string() }
    }

    fn load_err(&self, message: impl std::fmt::Display) -> RagError {
        RagError::StoreLoad { path: self.location(), message: message.to_string() }
    }
}

impl IndexStorage for FileIndexStorage {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn save(&self, index: &VectorIndex) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.write_err(e))?;

        let temp = NamedTempFile::new_in(&dir).map_err(|e| self.write_err(e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, index).map_err(|e| self.write_err(e))?;
            writer.flush().map_err(|e| self.write_err(e))?;
        }
        temp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        temp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        info!(path = %self.path.display(), chunk_count = index.len(), "persisted index");
        Ok(())
    }

    fn load(&self) -> Result<VectorIndex> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.load_err("no persisted index exists"));
            }
            Err(e) => return Err(self.load_err(e)),
        };

        let index: VectorIndex =
            serde_json::from_str(&raw).map_err(|e| self.load_err(format!("corrupt index: {e}")))?;
        index.validate().map_err(|e| self.load_err(e))?;

        debug!(path = %self.path.display(), chunk_count = index.len(), "loaded index");
        Ok(index)
    }
}

/// Keeps the serialized index in memory.
///
/// Useful for ephemeral sessions and tests; the index still goes through the
/// same serialization as the file backend.
#[derive(Debug, Default)]
pub struct MemoryIndexStorage {
    serialized: Mutex<Option<String>>,
}

impl MemoryIndexStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStorage for MemoryIndexStorage {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn save(&self, index: &VectorIndex) -> Result<()> {
        let json = serde_json::to_string(index).map_err(|e| RagError::StoreWrite {
            path: self.location(),
            message: e.to_string(),
        })?;
        let mut slot = self.serialized.lock().map_err(|_| RagError::StoreWrite {
            path: self.location(),
            message: "storage lock poisoned".to_string(),
        })?;
        *slot = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<VectorIndex> {
        let load_err = |message: String| RagError::StoreLoad { path: self.location(), message };
        let slot = self.serialized.lock().map_err(|_| load_err("storage lock poisoned".into()))?;
        let json = slot.as_deref().ok_or_else(|| load_err("no persisted index exists".into()))?;
        let index: VectorIndex =
            serde_json::from_str(json).map_err(|e| load_err(format!("corrupt index: {e}")))?;
        index.validate().map_err(load_err)?;
        Ok(index)
    }
}
