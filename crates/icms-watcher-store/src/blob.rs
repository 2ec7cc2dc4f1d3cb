//! Opaque key-value blob storage.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::StoreError;

/// Load and store binary blobs by key.
///
/// A missing key is `Ok(None)`, not an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Directory-backed store: one `<key>.json` file per key.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never see a partially written blob.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", file_stem(key)?)))
    }
}

/// Map a key onto a safe file stem.
fn file_stem(key: &str) -> Result<String, StoreError> {
    if key.is_empty() || key.chars().all(|c| c == '.') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect())
}

#[async_trait]
impl BlobStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let dir = self.dir.clone();
        let bytes = bytes.to_vec();
        debug!(path = %path.display(), len = bytes.len(), "writing blob");

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Other(format!("blob write task failed: {e}")))?
    }
}

/// In-process store. Counts writes so callers can check for no-op runs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current bytes under `key`, bypassing the trait.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Seed `key` without counting a write.
    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes.into());
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get(key))
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert(key, bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
