use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use filerelay_protocol::constants::DEFAULT_CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::TransferError;
use crate::validation::{FileDescriptor, Validator, file_extension};

/// Identifier of one transfer attempt.
///
/// Generated per attempt, never derived from the file name, so two
/// concurrent transfers of `a.png` get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Whether a task moves bytes to or from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// A lifecycle state machine for one kind of transfer.
pub trait Phase: Copy + Eq + fmt::Debug {
    /// Whether moving from `self` to `next` is a legal transition.
    fn can_transition_to(self, next: Self) -> bool;

    /// Completed, canceled or failed.
    fn is_terminal(self) -> bool;
}

/// Upload lifecycle: validate → presign → PUT → finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Validating,
    Presigning,
    Uploading,
    Finalizing,
    Completed,
    Canceled,
    Failed,
}

impl Phase for UploadPhase {
    fn can_transition_to(self, next: Self) -> bool {
        use UploadPhase::*;
        match (self, next) {
            (Validating, Presigning | Failed) => true,
            (Presigning, Uploading) | (Uploading, Finalizing) | (Finalizing, Completed) => true,
            (Presigning | Uploading | Finalizing, Canceled | Failed) => true,
            _ => false,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadPhase::Completed | UploadPhase::Canceled | UploadPhase::Failed
        )
    }
}

/// Download lifecycle: probe → fetch → save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    Probing,
    Fetching,
    Saving,
    Completed,
    Canceled,
    Failed,
}

impl Phase for DownloadPhase {
    fn can_transition_to(self, next: Self) -> bool {
        use DownloadPhase::*;
        match (self, next) {
            (Probing, Fetching) | (Fetching, Saving) | (Saving, Completed) => true,
            (Probing | Fetching, Canceled) => true,
            (Probing | Fetching | Saving, Failed) => true,
            _ => false,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadPhase::Completed | DownloadPhase::Canceled | DownloadPhase::Failed
        )
    }
}

/// One in-flight transfer, owned by the orchestrator driving it.
///
/// Size and MIME type are fixed at creation.
#[derive(Debug)]
pub struct TransferTask<P: Phase> {
    id: TaskId,
    file_name: String,
    size: u64,
    mime_type: String,
    direction: Direction,
    cancel: CancellationToken,
    phase: P,
}

impl<P: Phase> TransferTask<P> {
    pub fn new(
        id: TaskId,
        file_name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        direction: Direction,
        initial: P,
    ) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            size,
            mime_type: mime_type.into(),
            direction,
            cancel: CancellationToken::new(),
            phase: initial,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> P {
        self.phase
    }

    /// The handle that aborts whatever call this task has in flight.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Moves to `next`, refusing illegal transitions.
    pub fn advance(&mut self, next: P) -> Result<(), TransferError> {
        if !self.phase.can_transition_to(next) {
            return Err(TransferError::InvalidTransition(format!(
                "{:?} -> {:?}",
                self.phase, next
            )));
        }
        tracing::debug!(
            task = %self.id,
            direction = %self.direction,
            from = ?self.phase,
            to = ?next,
            "phase transition"
        );
        self.phase = next;
        Ok(())
    }
}

/// A validated-or-not file plus the bytes that will be PUT.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub descriptor: FileDescriptor,
    pub data: Bytes,
}

impl UploadFile {
    /// Builds an upload from in-memory bytes; size comes from `data`.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            descriptor: FileDescriptor::new(name, data.len() as u64, mime_type),
            data,
        }
    }

    /// Reads a file from disk, inferring the MIME type from its extension.
    ///
    /// Unknown extensions get `application/octet-stream`, which the
    /// validator then rejects as unsupported.
    pub async fn from_path(path: &Path, validator: &Validator) -> Result<Self, TransferError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TransferError::InvalidName(format!("no file name in: {}", path.display()))
            })?;
        let data = tokio::fs::read(path).await?;
        let mime_type = validator
            .mime_for_extension(&file_extension(&name))
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        Ok(Self::new(name, mime_type, data))
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub fn mime_type(&self) -> &str {
        &self.descriptor.mime_type
    }
}
