//! src/services/storage_service.rs
//!
//! StorageService — the vault's blob store. Object payloads live on local
//! disk sharded beneath `base_path/{shard}/{shard}/{key}`; writes go through
//! a temp file and an atomic rename, so overwriting an existing key (an
//! idempotent pipeline retry) is safe. Successful writes emit object-created
//! events to subscribers whose key-prefix filter matches, mirroring a bucket
//! notification configuration.

use crate::models::key::encode_event_key;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    future::Future,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Notification emitted after an object write completes.
///
/// `key` is delivered in event encoding (`+` for spaces, percent escapes);
/// consumers decode it with [`crate::models::key::decode_event_key`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectCreatedEvent {
    pub bucket: String,
    pub key: String,
}

/// Metadata describing a stored object.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: i64,
    /// MD5 of the payload; known for writes, not recomputed on reads.
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// The blob-store seam the thumbnail pipeline consumes.
///
/// The pipeline only ever needs whole-object reads and writes, so the trait
/// stays that small; tests substitute an in-memory store behind it.
pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = StorageResult<Bytes>> + Send;
    fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send;
}

struct Subscriber {
    prefixes: Vec<String>,
    tx: UnboundedSender<ObjectCreatedEvent>,
}

/// StorageService provides the blob-store operations the vault needs:
/// - Streamed object writes (temp file, fsync, atomic rename, MD5 etag)
/// - Whole-object and streaming reads
/// - Existence checks and fetch-URL resolution for the gallery read path
/// - Object-created notifications filtered by key prefix
#[derive(Clone)]
pub struct StorageService {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Logical bucket name carried in notifications.
    pub bucket: String,

    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

impl StorageService {
    /// Create a new StorageService rooted at `base_path`, announcing writes
    /// under the logical bucket name `bucket`.
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register for object-created events on keys matching any of `prefixes`.
    ///
    /// The filter runs at the notification layer, like a bucket trigger
    /// configuration; consumers still apply their own key checks.
    pub fn subscribe(
        &self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> UnboundedReceiver<ObjectCreatedEvent> {
        let (tx, rx) = unbounded_channel();
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.push(Subscriber {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            tx,
        });
        rx
    }

    fn notify_created(&self, key: &str) {
        let encoded = encode_event_key(key);
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|sub| {
            if !sub.prefixes.iter().any(|p| key.starts_with(p.as_str())) {
                return true;
            }
            // Drop subscribers whose receiver has gone away.
            sub.tx
                .send(ObjectCreatedEvent {
                    bucket: self.bucket.clone(),
                    key: encoded.clone(),
                })
                .is_ok()
        });
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or contain `..`.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(key) and returns the first two bytes as lowercase hexadecimal
    /// strings (00–ff). Reduces file count per directory.
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Construct a fully-qualified object payload path:
    /// `base_path/{shard}/{shard}/{key}`. Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Stream-write an object to disk and announce it.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - Atomically renames into final location (overwrite semantics).
    /// - Emits an object-created event to matching subscribers.
    ///
    /// Ensures durable writes (fsync) and cleans up temp files on errors.
    pub async fn put_object_stream<S>(
        &self,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let etag = format!("{:x}", digest.compute());
        debug!(key, size_bytes, %etag, "stored object");
        self.notify_created(key);

        Ok(StoredObject {
            key: key.to_string(),
            size_bytes,
            etag: Some(etag),
            content_type,
            last_modified: Utc::now(),
        })
    }

    /// Buffered write convenience for callers that already hold the payload,
    /// such as the thumbnail pipeline's write-back.
    pub async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: impl Into<String>,
    ) -> StorageResult<StoredObject> {
        let chunk: io::Result<Bytes> = Ok(bytes);
        self.put_object_stream(key, Some(content_type.into()), stream::iter([chunk]))
            .await
    }

    /// Fetch an object for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    /// Content type is inferred from the key's extension.
    pub async fn get_object_reader(&self, key: &str) -> StorageResult<(StoredObject, File)> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        let meta = file.metadata().await?;
        let last_modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
        let object = StoredObject {
            key: key.to_string(),
            size_bytes: meta.len() as i64,
            etag: None,
            content_type: content_type_for_key(key).map(str::to_string),
            last_modified,
        };
        Ok((object, file))
    }

    /// Read an object's full payload into memory.
    pub async fn get_object_bytes(&self, key: &str) -> StorageResult<Bytes> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound(key.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Whether an object exists at `key`.
    pub async fn object_exists(&self, key: &str) -> StorageResult<bool> {
        self.ensure_key_safe(key)?;
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Resolve a fetch URL for `key`, or `None` when the object is not (yet)
    /// present. The gallery read path treats `None` as "fall back", never as
    /// an error — a thumbnail that has not been generated is a normal state.
    pub async fn presigned_url(&self, key: &str) -> StorageResult<Option<String>> {
        if self.object_exists(key).await? {
            Ok(Some(format!("/storage/{key}")))
        } else {
            Ok(None)
        }
    }
}

impl ObjectStore for StorageService {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.get_object_bytes(key).await
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<()> {
        self.put_object(key, bytes, content_type).await?;
        Ok(())
    }
}

/// Guess a MIME type from a key's extension. Used for download responses;
/// unknown extensions fall back to octet-stream at the HTTP layer.
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::decode_event_key;

    fn service(dir: &tempfile::TempDir) -> StorageService {
        StorageService::new(dir.path(), "vault-test")
    }

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);

        let stored = storage
            .put_object("photos/u1/a.jpg", Bytes::from_static(b"abc"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(stored.key, "photos/u1/a.jpg");
        assert_eq!(stored.size_bytes, 3);
        assert_eq!(stored.etag.as_deref(), Some(format!("{:x}", md5::compute(b"abc")).as_str()));

        let bytes = storage.get_object_bytes("photos/u1/a.jpg").await.unwrap();
        assert_eq!(&bytes[..], b"abc");
    }

    #[tokio::test]
    async fn overwrite_at_same_key_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);

        storage
            .put_object("photos/u1/a.jpg", Bytes::from_static(b"one"), "image/jpeg")
            .await
            .unwrap();
        storage
            .put_object("photos/u1/a.jpg", Bytes::from_static(b"two"), "image/jpeg")
            .await
            .unwrap();

        let bytes = storage.get_object_bytes("photos/u1/a.jpg").await.unwrap();
        assert_eq!(&bytes[..], b"two");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);

        let err = storage.get_object_bytes("photos/u1/nope.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound(_)));
        assert!(!storage.object_exists("photos/u1/nope.jpg").await.unwrap());
        assert_eq!(storage.presigned_url("photos/u1/nope.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);

        let err = storage
            .put_object("../escape", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidObjectKey));
    }

    #[tokio::test]
    async fn notifies_only_matching_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);
        let mut events = storage.subscribe(["photos/", "videos/"]);

        storage
            .put_object("photos/u1/a.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap();
        storage
            .put_object("thumbnails/u1/a.jpg", Bytes::from_static(b"y"), "image/jpeg")
            .await
            .unwrap();
        storage
            .put_object("videos/u1/b.mp4", Bytes::from_static(b"z"), "video/mp4")
            .await
            .unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.bucket, "vault-test");
        assert_eq!(first.key, "photos/u1/a.jpg");
        // The thumbnail write produced no event; the next one is the video.
        let second = events.recv().await.unwrap();
        assert_eq!(second.key, "videos/u1/b.mp4");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn event_keys_are_encoded_for_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let storage = service(&dir);
        let mut events = storage.subscribe(["photos/"]);

        let raw = "photos/u1/summer trip.jpg";
        storage
            .put_object(raw, Bytes::from_static(b"x"), "image/jpeg")
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.key, "photos/u1/summer+trip.jpg");
        assert_eq!(decode_event_key(&event.key), raw);
    }
}
