//! File validation, transfer task state and cancellation tracking.
//!
//! Everything here is free of network I/O; the orchestrators in
//! `filerelay-client` drive these types through the HTTP phases.

mod format;
mod progress;
mod registry;
mod types;
mod validation;

pub use format::format_file_size;
pub use progress::{Progress, ProgressCallback, ProgressReporter, percent};
pub use registry::{ActiveTask, CancellationRegistry, Registration};
pub use types::{
    Direction, DownloadPhase, Phase, TaskId, TransferTask, UploadFile, UploadPhase,
};
pub use validation::{
    DEFAULT_RULES, FileDescriptor, TypeRule, ValidationError, Validator, file_extension,
    safe_file_name, validate,
};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task already registered: {0}")]
    DuplicateTask(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("invalid phase transition: {0}")]
    InvalidTransition(String),
}
