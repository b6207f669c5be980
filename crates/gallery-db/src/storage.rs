//! Object storage for gallery blobs.
//!
//! Two backends share the [`ObjectStore`] contract: a filesystem store used by
//! the daemon and an in-memory store for tests and ephemeral runs. Both behave
//! like the hosted bucket API the service was designed against: uploads never
//! overwrite, removing a missing key succeeds, and public URLs are derived
//! from a configured base without touching the backend.

use std::{collections::HashMap, io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::{keys::is_valid_key, GalleryError};

/// Content type recorded when an upload declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const META_DIR: &str = ".meta";

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stores `bytes` under `key`. Fails with [`GalleryError::ObjectExists`]
    /// if the key is already taken.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Removes the object stored under `key`. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn download(&self, key: &str) -> Result<Option<StoredObject>>;

    /// Publicly resolvable URL for `key`.
    fn public_url(&self, key: &str) -> String;

    fn bucket(&self) -> &str;
}

/// A blob together with the metadata captured at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    size: u64,
    uploaded_at: DateTime<Utc>,
}

/// Builds `{base}/{bucket}/{key}` with exactly one slash between segments.
pub fn public_url_for(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

fn ensure_valid_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(GalleryError::InvalidKey(key.to_owned()).into())
    }
}

fn normalise_content_type(content_type: &str) -> String {
    let trimmed = content_type.trim();
    if trimmed.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Bucket stored as plain files below `<root>/<bucket>`, with a JSON sidecar
/// per object under `<root>/<bucket>/.meta`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket: String,
    dir: PathBuf,
    public_base: String,
}

impl FsObjectStore {
    /// Opens (and creates if missing) the bucket directory.
    pub async fn open(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        let root: PathBuf = root.into();
        let dir = root.join(&bucket);
        fs::create_dir_all(dir.join(META_DIR))
            .await
            .with_context(|| format!("failed to create bucket directory {}", dir.display()))?;

        Ok(Self {
            bucket,
            dir,
            public_base: public_base.into(),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(META_DIR).join(format!("{key}.json"))
    }

    async fn discard_partial(&self, key: &str) {
        for path in [self.object_path(key), self.meta_path(key)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to discard partial upload")
                }
            }
        }
    }

    async fn read_meta(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match fs::read(self.meta_path(key)).await {
            Ok(raw) => Ok(Some(
                serde_json::from_slice(&raw).context("failed to decode object metadata")?,
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).context("failed to read object metadata"),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        ensure_valid_key(key)?;
        let path = self.object_path(key);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(GalleryError::ObjectExists(key.to_owned()).into());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to create {}", path.display()))
            }
        };

        let written = async {
            file.write_all(bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            file.flush().await?;
            drop(file);

            let meta = ObjectMeta {
                content_type: normalise_content_type(content_type),
                size: bytes.len() as u64,
                uploaded_at: Utc::now(),
            };
            fs::write(self.meta_path(key), serde_json::to_vec(&meta)?)
                .await
                .context("failed to write object metadata")
        }
        .await;

        if let Err(err) = written {
            // never leave a partial object behind under a taken key
            self.discard_partial(key).await;
            return Err(err);
        }

        debug!(bucket = %self.bucket, key, size = bytes.len(), "object stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        ensure_valid_key(key)?;
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(bucket = %self.bucket, key, "object already absent");
            }
            Err(err) => return Err(err).with_context(|| format!("failed to remove object {key}")),
        }
        match fs::remove_file(self.meta_path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("failed to remove object metadata"),
        }
    }

    async fn download(&self, key: &str) -> Result<Option<StoredObject>> {
        ensure_valid_key(key)?;
        let bytes = match fs::read(self.object_path(key)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("failed to read object {key}")),
        };

        let (content_type, uploaded_at) = match self.read_meta(key).await? {
            Some(meta) => (meta.content_type, meta.uploaded_at),
            None => (DEFAULT_CONTENT_TYPE.to_string(), Utc::now()),
        };

        Ok(Some(StoredObject {
            key: key.to_owned(),
            content_type,
            bytes,
            uploaded_at,
        }))
    }

    fn public_url(&self, key: &str) -> String {
        public_url_for(&self.public_base, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Non-persistent bucket. Clones share the same objects.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    public_base: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>, public_base: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            public_base: public_base.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        ensure_valid_key(key)?;
        let mut objects = self.objects.write();
        if objects.contains_key(key) {
            return Err(GalleryError::ObjectExists(key.to_owned()).into());
        }
        objects.insert(
            key.to_owned(),
            StoredObject {
                key: key.to_owned(),
                content_type: normalise_content_type(content_type),
                bytes: bytes.to_vec(),
                uploaded_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        ensure_valid_key(key)?;
        self.objects.write().remove(key);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Option<StoredObject>> {
        ensure_valid_key(key)?;
        Ok(self.objects.read().get(key).cloned())
    }

    fn public_url(&self, key: &str) -> String {
        public_url_for(&self.public_base, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
