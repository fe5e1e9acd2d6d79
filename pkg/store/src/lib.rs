use std::{
    collections::BTreeMap,
    fs::{OpenOptions, create_dir_all, remove_file, rename},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use thiserror::Error;
use tracing::debug;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("invalid object address: {0}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Byte blobs addressed by `(bucket, key)`.
///
/// Implementations must make `put` atomic per object: a reader sees either
/// the previous bytes or the new bytes, never a partial write. `put`
/// overwrites.
pub trait BlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    fn put_file(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let bytes = std::fs::read(local_path)?;
        self.put(bucket, key, &bytes)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).put(bucket, key, bytes)
    }

    fn put_file(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        (**self).put_file(bucket, key, local_path)
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).put(bucket, key, bytes)
    }

    fn put_file(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        (**self).put_file(bucket, key, local_path)
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketLayout {
    /// `<root>/<bucket>/<key>`
    Directory,
    /// `<root>/<key>`; bucket names are ignored.
    Flat,
}

/// Blob store over a local directory tree. Writes go to a sibling temp file
/// that is fsynced and renamed over the target.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    layout: BucketLayout,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: BucketLayout::Directory,
        }
    }

    /// Every bucket resolves to `root` itself.
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: BucketLayout::Flat,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        if self.layout == BucketLayout::Directory {
            check_segment(bucket, bucket)?;
            path.push(bucket);
        }
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        for segment in key.split('/') {
            check_segment(segment, key)?;
            path.push(segment);
        }
        Ok(path)
    }
}

fn check_segment(segment: &str, whole: &str) -> Result<(), StoreError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return Err(StoreError::InvalidKey(format!(
            "'{whole}' has an unusable path segment '{segment}'"
        )));
    }
    Ok(())
}

impl BlobStore for FsBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        write_file_atomic(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "blob written");
        Ok(())
    }
}

fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp_path = temp_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        rename(&tmp_path, path)
    })();
    if let Err(err) = written {
        let _ = remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

/// Unique per writer so concurrent puts to one key never share a temp file.
fn temp_path(path: &Path) -> PathBuf {
    let nonce = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(format!(".tmp-{}-{nonce}", std::process::id()));
    PathBuf::from(tmp)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys present in `bucket`, in lexicographic order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each write is one map insert, so a poisoned lock still guards a
    /// consistent map.
    fn objects(&self) -> MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        self.objects().insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}
