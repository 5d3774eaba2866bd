//! Blob-storage collaborator.
//!
//! [`BlobStore`] is the narrow get/put interface the pipeline consumes.
//! [`FsBlobStore`] is the production adapter: payloads on local disk sharded
//! beneath `base_path/{bucket}/{shard}/{shard}/{key}`, with a JSON sidecar
//! per payload carrying the attributes an object store would keep as
//! metadata (content type, cache directive, etag).

use std::{
    future::Future,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const MAX_BUCKET_NAME_LEN: usize = 63;
const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidKey,
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucket { name: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Meta(#[from] serde_json::Error),
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

/// Attributes persisted alongside each payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub etag: Option<String>,
    pub size_bytes: u64,
    pub stored_at: DateTime<Utc>,
}

/// A fetched payload with its metadata.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub meta: BlobMeta,
}

/// The storage interface the pipeline depends on. `put` overwrites any
/// previous object at the key; both operations are the only points where a
/// request blocks on an external system.
pub trait BlobStore: Clone + Send + Sync + 'static {
    /// Fetch a stored payload and its metadata.
    fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = BlobStoreResult<StoredBlob>> + Send;

    /// Persist a payload under `key` with the given content type and cache
    /// directive.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> impl Future<Output = BlobStoreResult<()>> + Send;
}

/// Filesystem-backed blob store.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty and overlong keys, keys that begin with `/` or contain
    /// `..`, and keys with control bytes or backslashes.
    fn ensure_key_safe(key: &str) -> BlobStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(BlobStoreError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(BlobStoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(BlobStoreError::InvalidKey);
        }
        Ok(())
    }

    /// Bucket names become directory names, so the character set is kept
    /// tight: ASCII letters, digits, dots, hyphens, underscores.
    fn ensure_bucket_safe(name: &str) -> BlobStoreResult<()> {
        if name.is_empty() || name.len() > MAX_BUCKET_NAME_LEN {
            return Err(BlobStoreError::InvalidBucket {
                name: name.to_string(),
                reason: "must be between 1 and 63 characters".into(),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(BlobStoreError::InvalidBucket {
                name: name.to_string(),
                reason: "allowed characters are letters, digits, dots, hyphens, underscores"
                    .into(),
            });
        }
        if name.starts_with('.') {
            return Err(BlobStoreError::InvalidBucket {
                name: name.to_string(),
                reason: "cannot start with a dot".into(),
            });
        }
        Ok(())
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00-ff). Reduces file count per directory.
    fn shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: `base_path/bucket/{shard}/{shard}/{key}`.
    /// Parent directories may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(bucket, key);
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Sidecar path for a payload path.
    fn meta_path(payload_path: &Path) -> PathBuf {
        let mut os = payload_path.as_os_str().to_owned();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }

    fn synthesized_meta(size_bytes: u64) -> BlobMeta {
        BlobMeta {
            content_type: "application/octet-stream".into(),
            cache_control: None,
            etag: None,
            size_bytes,
            stored_at: Utc::now(),
        }
    }

    /// Read the sidecar for a payload. Payloads seeded into the tree by hand
    /// have no sidecar; a missing or unreadable one degrades to synthesized
    /// defaults rather than failing the read.
    async fn read_meta(&self, payload_path: &Path, size_bytes: u64) -> BlobMeta {
        let meta_path = Self::meta_path(payload_path);
        match fs::read(&meta_path).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(
                        "unreadable sidecar metadata at {}: {}",
                        meta_path.display(),
                        err
                    );
                    Self::synthesized_meta(size_bytes)
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Self::synthesized_meta(size_bytes),
            Err(err) => {
                warn!(
                    "could not read sidecar metadata at {}: {}",
                    meta_path.display(),
                    err
                );
                Self::synthesized_meta(size_bytes)
            }
        }
    }

    /// Open a payload for streaming out, with its metadata.
    ///
    /// Used by the serving route, which must not buffer whole objects.
    pub async fn open_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> BlobStoreResult<(BlobMeta, File)> {
        Self::ensure_bucket_safe(bucket)?;
        Self::ensure_key_safe(key)?;

        let path = self.object_path(bucket, key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                BlobStoreError::Io(err)
            }
        })?;
        let size_bytes = file.metadata().await?.len();
        let meta = self.read_meta(&path, size_bytes).await;
        Ok((meta, file))
    }
}

impl BlobStore for FsBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> BlobStoreResult<StoredBlob> {
        Self::ensure_bucket_safe(bucket)?;
        Self::ensure_key_safe(key)?;

        let path = self.object_path(bucket, key);
        let bytes = match fs::read(&path).await {
            Ok(raw) => Bytes::from(raw),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BlobStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(BlobStoreError::Io(err)),
        };
        let meta = self.read_meta(&path, bytes.len() as u64).await;
        Ok(StoredBlob { bytes, meta })
    }

    /// Write the payload to a temporary file, fsync, and atomically rename
    /// into place, then write the sidecar. Temp files are cleaned up on
    /// every failure path.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> BlobStoreResult<()> {
        Self::ensure_bucket_safe(bucket)?;
        Self::ensure_key_safe(key)?;

        let path = self.object_path(bucket, key);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| BlobStoreError::Io(io::Error::other("payload path has no parent")))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let write_result = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&path).await?;
                fs::rename(&tmp_path, &path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobStoreError::Io(err));
            }
        }

        let meta = BlobMeta {
            content_type: content_type.to_string(),
            cache_control: cache_control.map(str::to_string),
            etag: Some(format!("{:x}", md5::compute(&bytes))),
            size_bytes: bytes.len() as u64,
            stored_at: Utc::now(),
        };
        fs::write(Self::meta_path(&path), serde_json::to_vec(&meta)?).await?;

        debug!(
            bucket,
            key,
            size_bytes = meta.size_bytes,
            "stored payload at {}",
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };
    use tempfile::TempDir;

    /// In-memory store for pipeline tests: seedable, records every put, and
    /// can be told to fail writes.
    #[derive(Clone, Default)]
    pub struct MemoryBlobStore {
        inner: Arc<Mutex<MemoryInner>>,
    }

    #[derive(Default)]
    struct MemoryInner {
        objects: HashMap<(String, String), StoredBlob>,
        puts: Vec<(String, String)>,
        fail_puts: bool,
    }

    impl MemoryBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, bucket: &str, key: &str, bytes: &[u8], content_type: &str) {
            let blob = StoredBlob {
                bytes: Bytes::copy_from_slice(bytes),
                meta: BlobMeta {
                    content_type: content_type.to_string(),
                    cache_control: None,
                    etag: None,
                    size_bytes: bytes.len() as u64,
                    stored_at: Utc::now(),
                },
            };
            self.inner
                .lock()
                .unwrap()
                .objects
                .insert((bucket.to_string(), key.to_string()), blob);
        }

        pub fn fail_puts(&self) {
            self.inner.lock().unwrap().fail_puts = true;
        }

        pub fn stored(&self, bucket: &str, key: &str) -> Option<StoredBlob> {
            self.inner
                .lock()
                .unwrap()
                .objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn put_count(&self) -> usize {
            self.inner.lock().unwrap().puts.len()
        }
    }

    impl BlobStore for MemoryBlobStore {
        async fn get(&self, bucket: &str, key: &str) -> BlobStoreResult<StoredBlob> {
            self.inner
                .lock()
                .unwrap()
                .objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| BlobStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            bytes: Bytes,
            content_type: &str,
            cache_control: Option<&str>,
        ) -> BlobStoreResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_puts {
                return Err(BlobStoreError::Io(io::Error::other("injected put failure")));
            }
            inner.puts.push((bucket.to_string(), key.to_string()));
            let blob = StoredBlob {
                meta: BlobMeta {
                    content_type: content_type.to_string(),
                    cache_control: cache_control.map(str::to_string),
                    etag: Some(format!("{:x}", md5::compute(&bytes))),
                    size_bytes: bytes.len() as u64,
                    stored_at: Utc::now(),
                },
                bytes,
            };
            inner
                .objects
                .insert((bucket.to_string(), key.to_string()), blob);
            Ok(())
        }
    }

    fn store_in(dir: &TempDir) -> FsBlobStore {
        FsBlobStore::new(dir.path())
    }

    #[tokio::test]
    async fn put_then_get_round_trips_payload_and_meta() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .put(
                "images",
                "w_10/cat.jpg",
                Bytes::from_static(b"pixels"),
                "image/png",
                Some("public, max-age=60"),
            )
            .await
            .unwrap();

        let blob = store.get("images", "w_10/cat.jpg").await.unwrap();
        assert_eq!(&blob.bytes[..], b"pixels");
        assert_eq!(blob.meta.content_type, "image/png");
        assert_eq!(blob.meta.cache_control.as_deref(), Some("public, max-age=60"));
        assert_eq!(blob.meta.size_bytes, 6);
        assert_eq!(
            blob.meta.etag.as_deref(),
            Some(format!("{:x}", md5::compute(b"pixels")).as_str())
        );
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let err = store.get("images", "absent").await.unwrap_err();
        assert!(matches!(
            err,
            BlobStoreError::NotFound { bucket, key } if bucket == "images" && key == "absent"
        ));
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .put("images", "k", Bytes::from_static(b"one"), "image/png", None)
            .await
            .unwrap();
        store
            .put("images", "k", Bytes::from_static(b"two"), "image/png", None)
            .await
            .unwrap();

        let blob = store.get("images", "k").await.unwrap();
        assert_eq!(&blob.bytes[..], b"two");
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for key in ["", "/abs", "a/../b", "a\\b"] {
            let err = store
                .put("images", key, Bytes::from_static(b"x"), "image/png", None)
                .await
                .unwrap_err();
            assert!(matches!(err, BlobStoreError::InvalidKey), "key: {key:?}");
        }
    }

    #[tokio::test]
    async fn bad_bucket_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for bucket in ["", "a/b", ".hidden", "sp ace"] {
            let err = store.get(bucket, "k").await.unwrap_err();
            assert!(
                matches!(err, BlobStoreError::InvalidBucket { .. }),
                "bucket: {bucket:?}"
            );
        }
    }

    #[tokio::test]
    async fn missing_sidecar_synthesizes_default_meta() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .put("images", "k", Bytes::from_static(b"raw"), "image/png", None)
            .await
            .unwrap();
        let payload_path = store.object_path("images", "k");
        std::fs::remove_file(FsBlobStore::meta_path(&payload_path)).unwrap();

        let blob = store.get("images", "k").await.unwrap();
        assert_eq!(blob.meta.content_type, "application/octet-stream");
        assert_eq!(blob.meta.etag, None);
        assert_eq!(blob.meta.size_bytes, 3);
    }

    #[tokio::test]
    async fn open_reader_returns_meta_and_streamable_file() {
        use tokio::io::AsyncReadExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .put(
                "images",
                "k",
                Bytes::from_static(b"stream me"),
                "image/png",
                Some("public, max-age=1209600"),
            )
            .await
            .unwrap();

        let (meta, mut file) = store.open_reader("images", "k").await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size_bytes, 9);

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"stream me");
    }
}
