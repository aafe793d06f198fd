use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::MonitorState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Returns the elements of `current` that do not occur anywhere in
/// `previous`, in `current`'s order.
pub fn diff<T: PartialEq + Clone>(previous: &[T], current: &[T]) -> Vec<T> {
    current
        .iter()
        .filter(|record| !previous.contains(record))
        .cloned()
        .collect()
}

/// JSON file holding the baseline between cycles.
#[derive(Debug, Clone)]
pub struct ChangeStore {
    path: PathBuf,
}

impl ChangeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the baseline. A missing or unreadable file is an empty baseline.
    pub fn load(&self) -> MonitorState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state file yet, starting empty");
                return MonitorState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read state file: {}", e);
                return MonitorState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Corrupt state file, starting empty: {}", e);
                MonitorState::default()
            }
        }
    }

    /// Replaces the baseline on disk. The new content is written to a
    /// sibling temp file and renamed over the target, so readers only ever
    /// see the old or the new file.
    pub fn commit(&self, state: &MonitorState) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| self.io_error(&dir, source))?;

        let json = serde_json::to_vec_pretty(state)?;
        let mut file = NamedTempFile::new_in(&dir).map_err(|source| self.io_error(&dir, source))?;
        file.write_all(&json)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|source| self.io_error(file.path(), source))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error(&self.path, e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            sales = state.last_sales.len(),
            problems = state.last_problems.len(),
            "Baseline committed"
        );
        Ok(())
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
