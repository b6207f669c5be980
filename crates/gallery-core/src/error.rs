use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Which mutation an upload belonged to. The user-facing message differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    Create,
    Update,
}

/// Failure of one workflow step. Every variant keeps the underlying store
/// message so callers can surface it next to the fixed user-facing message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("gallery item {id} not found")]
    NotFound { id: Uuid, detail: Option<String> },
    #[error("upload of '{key}' failed: {detail}")]
    UploadFailed {
        stage: MutationStage,
        key: String,
        detail: String,
    },
    #[error("removing blob '{key}' failed: {detail}")]
    StorageDeleteFailed { key: String, detail: String },
    #[error("record insert failed: {0}")]
    RecordInsertFailed(String),
    #[error("record update failed: {0}")]
    RecordUpdateFailed(String),
    #[error("record delete failed: {0}")]
    RecordDeleteFailed(String),
    #[error("listing failed: {0}")]
    ListFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Machine-readable classification of a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UploadFailed,
    StorageDeleteFailed,
    RecordInsertFailed,
    RecordUpdateFailed,
    RecordDeleteFailed,
    ListFailed,
    InvalidInput,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::StorageDeleteFailed => "storage_delete_failed",
            ErrorKind::RecordInsertFailed => "record_insert_failed",
            ErrorKind::RecordUpdateFailed => "record_update_failed",
            ErrorKind::RecordDeleteFailed => "record_delete_failed",
            ErrorKind::ListFailed => "list_failed",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl WorkflowError {
    pub fn not_found(id: Uuid) -> Self {
        WorkflowError::NotFound { id, detail: None }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotFound { .. } => ErrorKind::NotFound,
            WorkflowError::UploadFailed { .. } => ErrorKind::UploadFailed,
            WorkflowError::StorageDeleteFailed { .. } => ErrorKind::StorageDeleteFailed,
            WorkflowError::RecordInsertFailed(_) => ErrorKind::RecordInsertFailed,
            WorkflowError::RecordUpdateFailed(_) => ErrorKind::RecordUpdateFailed,
            WorkflowError::RecordDeleteFailed(_) => ErrorKind::RecordDeleteFailed,
            WorkflowError::ListFailed(_) => ErrorKind::ListFailed,
            WorkflowError::InvalidInput(_) => ErrorKind::InvalidInput,
            WorkflowError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Fixed message shown to API callers.
    pub fn message(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "Image not found",
            WorkflowError::UploadFailed {
                stage: MutationStage::Create,
                ..
            } => "Failed to upload file",
            WorkflowError::UploadFailed {
                stage: MutationStage::Update,
                ..
            } => "Failed to upload new file",
            WorkflowError::StorageDeleteFailed { .. } => "Failed to delete file from storage",
            WorkflowError::RecordInsertFailed(_) => "Failed to insert into database",
            WorkflowError::RecordUpdateFailed(_) => "Failed to update database record",
            WorkflowError::RecordDeleteFailed(_) => "Failed to delete database record",
            WorkflowError::ListFailed(_) => "Failed to fetch gallery images",
            WorkflowError::InvalidInput(_) => "Invalid request",
            WorkflowError::Unexpected(_) => "Unexpected error occurred",
        }
    }

    /// Underlying store or validation message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            WorkflowError::NotFound { detail, .. } => detail.clone(),
            WorkflowError::UploadFailed { detail, .. }
            | WorkflowError::StorageDeleteFailed { detail, .. } => Some(detail.clone()),
            WorkflowError::RecordInsertFailed(detail)
            | WorkflowError::RecordUpdateFailed(detail)
            | WorkflowError::RecordDeleteFailed(detail)
            | WorkflowError::ListFailed(detail)
            | WorkflowError::InvalidInput(detail)
            | WorkflowError::Unexpected(detail) => Some(detail.clone()),
        }
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(value: anyhow::Error) -> Self {
        WorkflowError::Unexpected(format!("{value:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_message_depends_on_stage() {
        let create = WorkflowError::UploadFailed {
            stage: MutationStage::Create,
            key: "k".into(),
            detail: "boom".into(),
        };
        let update = WorkflowError::UploadFailed {
            stage: MutationStage::Update,
            key: "k".into(),
            detail: "boom".into(),
        };
        assert_eq!(create.message(), "Failed to upload file");
        assert_eq!(update.message(), "Failed to upload new file");
        assert_eq!(create.kind().as_str(), "upload_failed");
        assert_eq!(create.detail().as_deref(), Some("boom"));
    }

    #[test]
    fn not_found_without_detail() {
        let err = WorkflowError::not_found(Uuid::nil());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Image not found");
        assert!(err.detail().is_none());
    }

    #[test]
    fn anyhow_errors_become_unexpected() {
        let err = WorkflowError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.detail().as_deref(), Some("disk on fire"));
    }
}
