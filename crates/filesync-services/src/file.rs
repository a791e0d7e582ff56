//! Per-user content-addressed file storage.
//!
//! Each user owns one directory of checksummed blobs. The file name is the
//! hex-encoded content hash; the file starts with a 32-character checksum
//! line, then the raw payload. Metadata and payload lookups go through the
//! shared LRU caches; a miss reads only as much of the file as needed.
//!
//! Access to a single blob is serialized by a per-hash lock. Different
//! blobs never contend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;
use dashmap::DashMap;

use filesync_core::message::{FileInfo, FILE_HASH_SIZE};

use crate::cache::LruCache;
use crate::fileparser::{self, ParseError};

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid content hash: {0}")]
    BadHash(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Opens per-user stores rooted at the data directory. Stores are shared:
/// two sessions of the same user get the same instance, and with it the
/// same per-hash locks.
pub struct FileStoreFactory {
    base_dir: PathBuf,
    stores: DashMap<String, Arc<FileStore>>,
    file_cache: Arc<LruCache<Bytes>>,
    meta_cache: Arc<LruCache<FileInfo>>,
}

impl FileStoreFactory {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        file_cache: Arc<LruCache<Bytes>>,
        meta_cache: Arc<LruCache<FileInfo>>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            stores: DashMap::new(),
            file_cache,
            meta_cache,
        }
    }

    /// Open (or reuse) the store for one user directory.
    pub fn open(&self, dir_name: &str) -> Result<Arc<FileStore>, FileStoreError> {
        if let Some(store) = self.stores.get(dir_name) {
            return Ok(store.value().clone());
        }
        let store = Arc::new(FileStore::open(
            self.base_dir.join(dir_name),
            dir_name.to_string(),
            self.file_cache.clone(),
            self.meta_cache.clone(),
        )?);
        self.stores.insert(dir_name.to_string(), store.clone());
        Ok(store)
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// One user's storage area.
pub struct FileStore {
    dir: PathBuf,
    /// Cache key prefix; distinguishes users in the shared caches.
    scope: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
    file_cache: Arc<LruCache<Bytes>>,
    meta_cache: Arc<LruCache<FileInfo>>,
}

impl FileStore {
    fn open(
        dir: PathBuf,
        scope: String,
        file_cache: Arc<LruCache<Bytes>>,
        meta_cache: Arc<LruCache<FileInfo>>,
    ) -> Result<Self, FileStoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            scope,
            locks: DashMap::new(),
            file_cache,
            meta_cache,
        })
    }

    fn blob_path(&self, hash: &str) -> Result<PathBuf, FileStoreError> {
        // The hash is the file name; it must be exactly 8 bytes of hex so
        // nothing path-like can sneak in.
        let decoded = hex::decode(hash).map_err(|_| FileStoreError::BadHash(hash.to_string()))?;
        if decoded.len() != FILE_HASH_SIZE {
            return Err(FileStoreError::BadHash(hash.to_string()));
        }
        Ok(self.dir.join(hash))
    }

    fn lock_for(&self, hash: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(hash.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn cache_key(&self, hash: &str) -> String {
        format!("{}/{}", self.scope, hash)
    }

    /// Metadata for one blob, if present.
    pub fn file_info(&self, hash: &str) -> Result<Option<FileInfo>, FileStoreError> {
        let key = self.cache_key(hash);
        if let Some(info) = self.meta_cache.get(&key) {
            return Ok(Some(info));
        }
        let path = self.blob_path(hash)?;
        if !path.exists() {
            return Ok(None);
        }
        let info = self.read_metadata(hash, &path)?;
        self.meta_cache.put(key, info.clone());
        Ok(Some(info))
    }

    fn read_metadata(&self, hash: &str, path: &Path) -> Result<FileInfo, FileStoreError> {
        let mut file = std::fs::File::open(path)?;
        let checksum = fileparser::extract_checksum_from_reader(&mut file)?;
        let timestamp = coarse_timestamp(file.metadata()?.modified()?);
        let hash_bytes = hex::decode(hash).map_err(|_| FileStoreError::BadHash(hash.to_string()))?;
        Ok(FileInfo::new(
            hash_bytes,
            checksum.into_bytes(),
            timestamp,
        ))
    }

    /// The blob payload, with the checksum line stripped.
    pub fn read(&self, hash: &str) -> Result<Vec<u8>, FileStoreError> {
        let key = self.cache_key(hash);
        if let Some(blob) = self.file_cache.get(&key) {
            return Ok(blob.to_vec());
        }
        let path = self.blob_path(hash)?;
        let lock = self.lock_for(hash);
        let _guard = lock.lock().expect("file lock poisoned");
        if !path.exists() {
            return Err(FileStoreError::NotFound(hash.to_string()));
        }
        let content = std::fs::read(&path)?;
        let blob = fileparser::extract_blob(&content)?.to_vec();
        self.file_cache.put(key, Bytes::from(blob.clone()));
        Ok(blob)
    }

    /// Store a blob under its hash. An existing blob with the same hash is
    /// overwritten; content addressing makes that a no-op in practice.
    pub fn create(
        &self,
        hash: &str,
        checksum: &str,
        data: &[u8],
    ) -> Result<FileInfo, FileStoreError> {
        let path = self.blob_path(hash)?;
        let lock = self.lock_for(hash);
        let _guard = lock.lock().expect("file lock poisoned");

        let mut content = Vec::with_capacity(checksum.len() + 1 + data.len());
        content.extend_from_slice(checksum.as_bytes());
        content.push(b'\n');
        content.extend_from_slice(data);
        std::fs::write(&path, &content)?;

        let timestamp = coarse_timestamp(std::fs::metadata(&path)?.modified()?);
        let hash_bytes = hex::decode(hash).map_err(|_| FileStoreError::BadHash(hash.to_string()))?;
        let info = FileInfo::new(hash_bytes, checksum.as_bytes().to_vec(), timestamp);

        let key = self.cache_key(hash);
        self.file_cache.put(key.clone(), Bytes::copy_from_slice(data));
        self.meta_cache.put(key, info.clone());
        Ok(info)
    }

    /// Remove a blob and its metadata.
    pub fn remove(&self, hash: &str) -> Result<(), FileStoreError> {
        let path = self.blob_path(hash)?;
        let lock = self.lock_for(hash);
        {
            let _guard = lock.lock().expect("file lock poisoned");
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    return Err(FileStoreError::NotFound(hash.to_string()))
                }
                Ok(_) => std::fs::remove_file(&path)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(FileStoreError::NotFound(hash.to_string()))
                }
                Err(e) => return Err(e.into()),
            }
            let key = self.cache_key(hash);
            self.file_cache.remove(&key);
            self.meta_cache.remove(&key);
        }
        self.locks.remove(hash);
        Ok(())
    }

    /// Metadata for every blob in the store.
    pub fn list(&self) -> Result<Vec<FileInfo>, FileStoreError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(hash) = name.to_str() else {
                continue;
            };
            match self.file_info(hash) {
                Ok(Some(info)) => files.push(info),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(hash, error = %e, "skipping unreadable blob");
                }
            }
        }
        Ok(files)
    }
}

/// Truncated unix seconds; the wire carries a 16-bit stamp.
fn coarse_timestamp(mtime: SystemTime) -> u16 {
    mtime
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as u16)
        .unwrap_or(0)
}

// ── Tests ────────────────────────────────────────────────────────────────────
