use super::task::Task;
use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk shape of the queue file: `{"tasks":[...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    tasks: Vec<Task>,
}

/// Whole-file JSON persistence for one task queue.
///
/// Every save rewrites the entire file. Not crash-atomic and not safe
/// against concurrent writers on the same path; the queue manager documents
/// that limitation.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted task list. A missing file is an empty queue;
    /// malformed JSON is a hard failure.
    pub fn load(&self) -> Result<Vec<Task>, QueueError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let file: QueueFile = serde_json::from_slice(&data)?;
        Ok(file.tasks)
    }

    /// Persist the full task list, creating parent directories as needed.
    pub fn save(&self, tasks: &[Task]) -> Result<(), QueueError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = QueueFile {
            tasks: tasks.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&file)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}
