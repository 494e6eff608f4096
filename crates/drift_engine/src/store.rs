use std::sync::Mutex;

use drift_core::{BacklogItem, ScanStatus, StatusUpdate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backlog store unavailable: {0}")]
    Unavailable(String),
    #[error("no backlog row for {0}")]
    NotFound(String),
}

/// Key-value table of backlog rows, keyed by repository URL.
#[async_trait::async_trait]
pub trait BacklogStore: Send + Sync {
    /// Every row whose `active` flag is set, any status.
    async fn scan_active(&self) -> Result<Vec<BacklogItem>, StoreError>;

    /// Active rows with the given status, in store order.
    async fn query_active_by_status(&self, status: ScanStatus)
        -> Result<Vec<BacklogItem>, StoreError>;

    async fn update_status(&self, update: &StatusUpdate) -> Result<(), StoreError>;

    /// Applies `update` only while the row still has status `expected`.
    /// Returns whether it was applied.
    async fn update_status_if(
        &self,
        expected: ScanStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError>;
}

/// Backlog held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryBacklogStore {
    rows: Mutex<Vec<BacklogItem>>,
}

impl InMemoryBacklogStore {
    pub fn new(rows: Vec<BacklogItem>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Adds a row, replacing any row with the same URL.
    pub fn upsert(&self, item: BacklogItem) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        match rows.iter_mut().find(|row| row.repo_url == item.repo_url) {
            Some(row) => *row = item,
            None => rows.push(item),
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Vec<BacklogItem>, StoreError> {
        Ok(self.lock()?.clone())
    }

    pub fn get(&self, repo_url: &str) -> Result<Option<BacklogItem>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .find(|row| row.repo_url == repo_url)
            .cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<BacklogItem>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("backlog lock poisoned".into()))
    }
}

#[async_trait::async_trait]
impl BacklogStore for InMemoryBacklogStore {
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
        let mut rows = self.lock()?;
        let row = rows
            .iter_mut()
            .find(|row| row.repo_url == update.repo_url)
            .ok_or_else(|| StoreError::NotFound(update.repo_url.clone()))?;
        row.apply(update);
        Ok(())
    }

    async fn update_status_if(
        &self,
        expected: ScanStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        let mut rows = self.lock()?;
        let row = rows
            .iter_mut()
            .find(|row| row.repo_url == update.repo_url)
            .ok_or_else(|| StoreError::NotFound(update.repo_url.clone()))?;
        if row.scan_status != expected {
            return Ok(false);
        }
        row.apply(update);
        Ok(true)
    }
}
