//! JSON file checkpoint backend

use crate::storage::traits::{ProgressStore, StorageError, StorageResult};
use crate::storage::ProgressCheckpoint;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Stores the checkpoint as one JSON document
///
/// Saves go to a temporary file in the same directory that is then renamed
/// over the previous checkpoint.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self) -> StorageResult<Option<ProgressCheckpoint>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StorageError::CorruptCheckpoint {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, checkpoint: &ProgressCheckpoint) -> StorageResult<()> {
        let dir = self.directory();
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, checkpoint)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;

        tracing::trace!("Checkpoint written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
