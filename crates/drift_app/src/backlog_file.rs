use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use drift_core::{BacklogItem, ScanStatus, StatusUpdate};
use drift_engine::{AtomicFileWriter, BacklogStore, StoreError};
use drift_logging::{drift_debug, drift_info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedBacklog {
    repositories: Vec<BacklogItem>,
}

/// Backlog kept in a RON file, rewritten atomically after every change.
pub struct FileBacklogStore {
    writer: AtomicFileWriter,
    file_name: String,
    rows: Mutex<Vec<BacklogItem>>,
}

impl FileBacklogStore {
    /// Loads `path`; a missing file is an empty backlog.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StoreError::Unavailable(format!("bad backlog path {:?}", path)))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let rows = match fs::read_to_string(path) {
            Ok(text) => {
                let state: PersistedBacklog = ron::from_str(&text).map_err(|err| {
                    StoreError::Unavailable(format!("failed to parse {:?}: {}", path, err))
                })?;
                drift_info!(
                    "Loaded {} repositories from {:?}",
                    state.repositories.len(),
                    path
                );
                state.repositories
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(StoreError::Unavailable(format!(
                    "failed to read {:?}: {}",
                    path, err
                )))
            }
        };

        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            file_name,
            rows: Mutex::new(rows),
        })
    }

    /// Adds a row, replacing any row with the same URL.
    pub fn upsert(&self, item: BacklogItem) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        let mut next = rows.clone();
        match next.iter_mut().find(|row| row.repo_url == item.repo_url) {
            Some(row) => *row = item,
            None => next.push(item),
        }
        self.commit(&mut rows, next)
    }

    pub fn snapshot(&self) -> Result<Vec<BacklogItem>, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<BacklogItem>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("backlog lock poisoned".into()))
    }

    fn save(&self, rows: &[BacklogItem]) -> Result<(), StoreError> {
        let state = PersistedBacklog {
            repositories: rows.to_vec(),
        };
        let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())
            .map_err(|err| StoreError::Unavailable(format!("failed to serialize backlog: {err}")))?;
        let path = self
            .writer
            .write(&self.file_name, content.as_bytes())
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        drift_debug!("Saved backlog to {:?}", path);
        Ok(())
    }

    fn apply(
        &self,
        update: &StatusUpdate,
        expected: Option<ScanStatus>,
    ) -> Result<bool, StoreError> {
        let mut rows = self.lock()?;
        let index = rows
            .iter()
            .position(|row| row.repo_url == update.repo_url)
            .ok_or_else(|| StoreError::NotFound(update.repo_url.clone()))?;
        if expected.is_some_and(|expected| rows[index].scan_status != expected) {
            return Ok(false);
        }
        let mut next = rows.clone();
        next[index].apply(update);
        self.commit(&mut rows, next)?;
        Ok(true)
    }

    /// Memory only takes `next` once it is on disk.
    fn commit(
        &self,
        rows: &mut MutexGuard<'_, Vec<BacklogItem>>,
        next: Vec<BacklogItem>,
    ) -> Result<(), StoreError> {
        self.save(&next)?;
        **rows = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BacklogStore for FileBacklogStore {
    async fn scan_active(&self) -> Result<Vec<BacklogItem>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|row| row.is_active())
            .cloned()
            .collect())
    }

    async fn query_active_by_status(
        &self,
        status: ScanStatus,
    ) -> Result<Vec<BacklogItem>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|row| row.is_active() && row.scan_status == status)
            .cloned()
            .collect())
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<(), StoreError> {
        self.apply(update, None).map(|_| ())
    }

    async fn update_status_if(
        &self,
        expected: ScanStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        self.apply(update, Some(expected))
    }
}
