use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drift_core::{artifact_key, artifact_url, ARTIFACT_CONTENT_TYPE};
use drift_logging::{drift_debug, drift_info};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::types::key_timestamp;
use crate::Clock;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("artifact directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),
    #[error("artifact already exists: {0}")]
    Exists(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if needed and checks it accepts new files.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Writes `{dir}/{name}` through a temp file and rename, so readers never see
/// a partial file.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, name: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(name);
        let tmp = self.staged(content)?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Like [`write`](Self::write) but fails with [`PersistError::Exists`]
    /// instead of replacing an existing file.
    pub fn create(&self, name: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(name);
        let tmp = self.staged(content)?;
        tmp.persist_noclobber(&target).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                PersistError::Exists(name.to_string())
            } else {
                PersistError::Io(e.error)
            }
        })?;
        Ok(target)
    }

    fn staged(&self, content: &[u8]) -> Result<NamedTempFile, PersistError> {
        ensure_output_dir(&self.dir)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        Ok(tmp)
    }
}

/// Blob store for rendered artifacts.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), PersistError>;
}

/// Artifact bucket laid out as `{root}/{bucket}/{key}`. Keys are write-once.
pub struct FsArtifactStore {
    writer: AtomicFileWriter,
}

impl FsArtifactStore {
    pub fn new(root: &Path, bucket: &str) -> Self {
        Self {
            writer: AtomicFileWriter::new(root.join(bucket)),
        }
    }

    pub fn path_of(&self, key: &str) -> PathBuf {
        self.writer.dir().join(key)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), PersistError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        let path = self.writer.create(key, body)?;
        drift_debug!("Stored {} ({}, {} bytes)", path.display(), content_type, body.len());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSettings {
    pub bucket: String,
    pub website_base: String,
}

impl ArtifactSettings {
    /// Settings whose website base is the bucket's static-site endpoint.
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let website_base = format!("http://{bucket}.s3-website-us-east-1.amazonaws.com");
        Self {
            bucket,
            website_base,
        }
    }
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self::for_bucket("html-ai-gen")
    }
}

/// A published artifact and where it can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: String,
    pub url: String,
}

/// Names, stores and addresses rendered reports.
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
    settings: ArtifactSettings,
    clock: Clock,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>, settings: ArtifactSettings, clock: Clock) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &ArtifactSettings {
        &self.settings
    }

    pub async fn publish(&self, prefix: &str, body: &str) -> Result<Artifact, PersistError> {
        let run_id = Uuid::new_v4().simple().to_string();
        let key = artifact_key(prefix, &key_timestamp((self.clock)()), &run_id[..8]);
        self.store
            .put(&key, body.as_bytes(), ARTIFACT_CONTENT_TYPE)
            .await?;
        let url = artifact_url(&self.settings.website_base, &key);
        drift_info!("Uploaded {} to bucket {}", key, self.settings.bucket);
        Ok(Artifact { key, url })
    }
}
