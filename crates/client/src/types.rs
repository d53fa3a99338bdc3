use filerelay_protocol::FileRecord;
use filerelay_transfer::TaskId;
use serde::Serialize;

use crate::download::BlobRef;
use crate::error::{ErrorClass, ErrorKind};

/// Outcome of an upload, download or profile-image operation.
///
/// Failures are values here, not errors; see
/// [`ClientError`](crate::ClientError) for the exceptions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub retryable: bool,
    /// Absent when the request was rejected before a task was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl<T> TransferResult<T> {
    pub fn ok(task_id: TaskId, message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_kind: None,
            retryable: false,
            task_id: Some(task_id),
        }
    }

    /// Success of an operation that never had a task, such as a removal.
    pub fn done(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error_kind: None,
            retryable: false,
            task_id: None,
        }
    }

    pub fn failed(task_id: Option<TaskId>, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error_kind: Some(class.kind),
            retryable: class.retryable,
            task_id,
        }
    }

    /// Rejected before any network call.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::failed(
            None,
            ErrorClass::new(ErrorKind::Validation, false),
            message,
        )
    }

    pub fn is_canceled(&self) -> bool {
        self.error_kind == Some(ErrorKind::Canceled)
    }
}

/// Payload of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadData {
    /// Stored file metadata; `url` is the preview URL.
    pub file: FileRecord,
    /// Other top-level fields of the finalize response.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Payload of a successful download.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadData {
    /// Name the file was saved under, before target sanitising.
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Where the save target put the file.
    pub location: String,
    /// Transient reference to the payload; released shortly after saving.
    pub blob_ref: BlobRef,
}

/// Payload of a successful profile-image upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageData {
    /// Path or URL exactly as the server returned it.
    pub image_url: String,
    /// `image_url` resolved against the API base.
    pub resolved_url: String,
}
