use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, Result};
use async_trait::async_trait;
use gallery_db::{FsObjectStore, MemoryObjectStore, ObjectStore, StoredObject};
use tracing::info;

/// Which object store the daemon runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Fs,
    Memory,
}

impl FromStr for StorageBackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "fs" | "filesystem" => Ok(Self::Fs),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown storage backend '{other}' (expected 'fs' or 'memory')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageBackendKind,
    pub root: PathBuf,
    pub bucket: String,
    pub public_base: String,
}

/// Object store selected at start-up.
#[derive(Debug, Clone)]
pub enum ObjectBackend {
    Fs(FsObjectStore),
    Memory(MemoryObjectStore),
}

impl ObjectBackend {
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend = match config.kind {
            StorageBackendKind::Fs => ObjectBackend::Fs(
                FsObjectStore::open(&config.root, &config.bucket, &config.public_base).await?,
            ),
            StorageBackendKind::Memory => ObjectBackend::Memory(MemoryObjectStore::new(
                &config.bucket,
                &config.public_base,
            )),
        };
        info!(backend = ?config.kind, bucket = %config.bucket, "object store ready");
        Ok(backend)
    }

    fn inner(&self) -> &dyn ObjectStore {
        match self {
            ObjectBackend::Fs(store) => store,
            ObjectBackend::Memory(store) => store,
        }
    }
}

#[async_trait]
impl ObjectStore for ObjectBackend {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.inner().upload(key, bytes, content_type).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner().remove(key).await
    }

    async fn download(&self, key: &str) -> Result<Option<StoredObject>> {
        self.inner().download(key).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner().public_url(key)
    }

    fn bucket(&self) -> &str {
        self.inner().bucket()
    }
}
