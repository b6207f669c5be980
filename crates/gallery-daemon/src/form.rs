//! Multipart form decoding for the create and update routes.

use axum::extract::Multipart;
use gallery_core::{CreateImage, UpdateImage, UploadedFile, WorkflowError};
use gallery_db::storage::DEFAULT_CONTENT_TYPE;
use tracing::debug;

use crate::server::ApiError;

/// Raw fields of a gallery form. Every field is optional at this stage.
#[derive(Debug, Default)]
pub(crate) struct GalleryForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub file: Option<UploadedFile>,
}

impl GalleryForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = GalleryForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let bytes = field.bytes().await?;
                    // browsers send an empty part when no file was picked
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "imageUrl" | "image_url" => form.image_url = Some(field.text().await?),
                "type" | "type[]" => {
                    let raw = field.text().await?;
                    form.push_tags(&raw)?;
                }
                _ => debug!(field = %name, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// Accepts either a single tag per part or a JSON array of tags.
    fn push_tags(&mut self, raw: &str) -> Result<(), WorkflowError> {
        let tags = self.tags.get_or_insert_with(Vec::new);
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            let parsed: Vec<String> = serde_json::from_str(trimmed).map_err(|err| {
                WorkflowError::InvalidInput(format!("type must be a JSON array of strings: {err}"))
            })?;
            tags.extend(parsed);
        } else {
            tags.push(trimmed.to_string());
        }
        Ok(())
    }

    pub fn into_create(self) -> Result<CreateImage, WorkflowError> {
        let title = self.title.ok_or_else(|| missing("title"))?;
        let description = self.description.ok_or_else(|| missing("description"))?;
        let tags = self.tags.ok_or_else(|| missing("type"))?;

        Ok(CreateImage {
            title,
            description,
            tags,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            file: self.file,
        })
    }

    pub fn into_update(self) -> UpdateImage {
        if self.image_url.is_some() {
            debug!("imageUrl is ignored on update");
        }
        UpdateImage {
            title: self.title,
            description: self.description,
            tags: self.tags,
            file: self.file,
        }
    }
}

fn missing(field: &str) -> WorkflowError {
    WorkflowError::InvalidInput(format!("{field} is required"))
}
