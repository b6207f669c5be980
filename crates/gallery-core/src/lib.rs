//! Gallery workflow orchestration.
//!
//! Each workflow is a strictly serial chain of record-store and object-store
//! calls. Nothing spans both stores transactionally: a failure part way
//! through is reported, logged, and left as is. The windows are:
//!
//! * create: the blob stays behind if the insert fails;
//! * update: the old blob is already gone if the new upload fails;
//! * delete: the record stays (pointing at a removed blob) if the record
//!   delete fails after the blob was removed.
//!
//! Concurrent workflows on the same id are not coordinated.

mod error;

use std::sync::Arc;

use chrono::Utc;
use gallery_db::{
    keys::derive_blob_key, GalleryFilter, GalleryRecord, GalleryUpdate, NewGalleryRecord,
    ObjectStore, Pagination, RecordStore,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use error::{ErrorKind, MutationStage, WorkflowError};

/// Listing parameters. Absent filters match everything.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tag: Option<String>,
    pub pagination: Pagination,
}

impl ListQuery {
    pub fn filter(&self) -> GalleryFilter {
        let mut filter = GalleryFilter::new()
            .with_title(self.title.clone())
            .with_description(self.description.clone())
            .with_tag(self.tag.clone());
        if let Some(id) = self.id {
            filter = filter.with_id(id);
        }
        filter
    }
}

/// A file received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Request payload when adding an image.
#[derive(Debug, Clone)]
pub struct CreateImage {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Used as the record's URL only when no file is uploaded.
    pub image_url: Option<String>,
    pub file: Option<UploadedFile>,
}

impl CreateImage {
    pub fn new<T: Into<String>, D: Into<String>>(title: T, description: D, tags: Vec<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags,
            image_url: None,
            file: None,
        }
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        validate_tags(&self.tags)?;
        let has_override = self
            .image_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false);
        if self.file.is_none() && !has_override {
            return Err(WorkflowError::InvalidInput(
                "either a file or an imageUrl must be provided".into(),
            ));
        }
        Ok(())
    }
}

/// Partial update. `None` keeps the stored value; `Some("")` stores an empty
/// string.
#[derive(Debug, Clone, Default)]
pub struct UpdateImage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub file: Option<UploadedFile>,
}

impl UpdateImage {
    fn validate(&self) -> Result<(), WorkflowError> {
        match &self.tags {
            Some(tags) => validate_tags(tags),
            None => Ok(()),
        }
    }
}

fn validate_tags(tags: &[String]) -> Result<(), WorkflowError> {
    if tags.iter().any(|tag| tag.is_empty()) {
        return Err(WorkflowError::InvalidInput(
            "type entries must be non-empty strings".into(),
        ));
    }
    Ok(())
}

/// Composes a record store and an object store into the four gallery
/// workflows.
pub struct GalleryWorkflow<R, O>
where
    R: RecordStore,
    O: ObjectStore,
{
    records: Arc<R>,
    objects: Arc<O>,
}

impl<R, O> Clone for GalleryWorkflow<R, O>
where
    R: RecordStore,
    O: ObjectStore,
{
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            objects: self.objects.clone(),
        }
    }
}

impl<R, O> GalleryWorkflow<R, O>
where
    R: RecordStore,
    O: ObjectStore,
{
    pub fn new(records: R, objects: O) -> Self {
        Self::from_shared(Arc::new(records), Arc::new(objects))
    }

    pub fn from_shared(records: Arc<R>, objects: Arc<O>) -> Self {
        Self { records, objects }
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    /// Lists matching items, newest first.
    #[instrument(skip(self, query), fields(page = query.pagination.page(), limit = query.pagination.limit()))]
    pub async fn list(&self, query: ListQuery) -> Result<Vec<GalleryRecord>, WorkflowError> {
        let filter = query.filter();
        let records = self
            .records
            .list(&filter, query.pagination)
            .await
            .map_err(|err| WorkflowError::ListFailed(format!("{err:#}")))?;
        info!(count = records.len(), "gallery images listed");
        Ok(records)
    }

    /// Uploads the file (if any) and inserts the record.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create(&self, request: CreateImage) -> Result<GalleryRecord, WorkflowError> {
        request.validate()?;

        let (image_url, image_key) = match &request.file {
            Some(file) => {
                let key = self.store_blob(file, MutationStage::Create).await?;
                (self.objects.public_url(&key), Some(key))
            }
            None => (
                request
                    .image_url
                    .clone()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                None,
            ),
        };

        let record = self
            .records
            .insert(NewGalleryRecord {
                title: &request.title,
                description: &request.description,
                tags: &request.tags,
                image_url: &image_url,
                image_key: image_key.as_deref(),
            })
            .await
            .map_err(|err| {
                if let Some(key) = image_key.as_deref() {
                    warn!(key, error = %err, "record insert failed; uploaded blob left orphaned");
                }
                WorkflowError::RecordInsertFailed(format!("{err:#}"))
            })?;

        info!(image_id = %record.id, "gallery image created");
        Ok(record)
    }

    /// Optionally replaces the blob, then rewrites the record with every
    /// absent field falling back to its stored value.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateImage,
    ) -> Result<GalleryRecord, WorkflowError> {
        request.validate()?;
        let existing = self.fetch_existing(id).await?;

        let mut image_url = existing.image_url.clone();
        let mut image_key = existing.image_key.clone();

        if let Some(file) = &request.file {
            match existing.blob_key() {
                Some(old_key) => {
                    if let Err(err) = self.objects.remove(old_key).await {
                        warn!(image_id = %id, key = %old_key, error = %err,
                            "failed to remove previous blob; continuing with replacement");
                    }
                }
                None => debug!(image_id = %id, url = %existing.image_url,
                    "previous image is a URL override; nothing to remove"),
            }

            let key = self.store_blob(file, MutationStage::Update).await?;
            image_url = self.objects.public_url(&key);
            image_key = Some(key);
        }

        let title = request.title.unwrap_or(existing.title);
        let description = request.description.unwrap_or(existing.description);
        let tags = request.tags.unwrap_or(existing.tags);

        let record = self
            .records
            .update(
                id,
                GalleryUpdate {
                    title: &title,
                    description: &description,
                    tags: &tags,
                    image_url: &image_url,
                    image_key: image_key.as_deref(),
                },
            )
            .await
            .map_err(|err| WorkflowError::RecordUpdateFailed(format!("{err:#}")))?;

        info!(image_id = %record.id, "gallery image updated");
        Ok(record)
    }

    /// Removes the blob, then the record. Returns the deleted id.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<Uuid, WorkflowError> {
        let existing = self.fetch_existing(id).await?;

        match existing.blob_key() {
            Some(key) => {
                self.objects.remove(key).await.map_err(|err| {
                    WorkflowError::StorageDeleteFailed {
                        key: key.to_owned(),
                        detail: format!("{err:#}"),
                    }
                })?;
            }
            None => debug!(image_id = %id, url = %existing.image_url,
                "image is a URL override; skipping storage removal"),
        }

        self.records.delete(id).await.map_err(|err| {
            warn!(image_id = %id, error = %err, "blob removed but record delete failed; record left stale");
            WorkflowError::RecordDeleteFailed(format!("{err:#}"))
        })?;

        info!(image_id = %id, "gallery image deleted");
        Ok(id)
    }

    async fn fetch_existing(&self, id: Uuid) -> Result<GalleryRecord, WorkflowError> {
        match self.records.fetch(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(WorkflowError::not_found(id)),
            Err(err) => Err(WorkflowError::NotFound {
                id,
                detail: Some(format!("{err:#}")),
            }),
        }
    }

    async fn store_blob(
        &self,
        file: &UploadedFile,
        stage: MutationStage,
    ) -> Result<String, WorkflowError> {
        let key = derive_blob_key(Utc::now(), &file.file_name);
        self.objects
            .upload(&key, &file.bytes, &file.content_type)
            .await
            .map_err(|err| WorkflowError::UploadFailed {
                stage,
                key: key.clone(),
                detail: format!("{err:#}"),
            })?;
        Ok(key)
    }
}
