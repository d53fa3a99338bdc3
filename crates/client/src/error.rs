//! Error types and the transport-failure classifier.

use std::fmt;

use filerelay_protocol::constants::RETRYABLE_STATUSES;
use filerelay_transfer::{Direction, TransferError};
use serde::Serialize;

/// Errors surfaced as `Err` by the public client operations.
///
/// Ordinary transfer failures are reported through
/// [`TransferResult`](crate::TransferResult); only re-authentication and
/// local faults end up here.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("authentication expired, please log in again")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

/// A failed request, as seen by the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response: refused, reset, DNS or socket failure.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("request canceled")]
    Canceled,

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// `message` field of a JSON error body, when present.
        message: Option<String>,
    },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn server_message(&self) -> Option<&str> {
        match self {
            TransportError::Status {
                message: Some(m), ..
            } => Some(m.as_str()),
            _ => None,
        }
    }
}

/// Closed failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    Unauthorized,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    UnsupportedType,
    ServerError,
    Canceled,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorClass {
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl ErrorClass {
    pub const fn new(kind: ErrorKind, retryable: bool) -> Self {
        Self { kind, retryable }
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::Validation,
        401 => ErrorKind::Unauthorized,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::Timeout,
        413 => ErrorKind::PayloadTooLarge,
        415 => ErrorKind::UnsupportedType,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Unknown,
    }
}

/// Maps a transport failure onto the taxonomy.
pub fn classify(err: &TransportError) -> ErrorClass {
    match err {
        TransportError::Network(_) => ErrorClass::new(ErrorKind::Network, true),
        TransportError::Timeout => ErrorClass::new(ErrorKind::Timeout, true),
        TransportError::Canceled => ErrorClass::new(ErrorKind::Canceled, false),
        TransportError::Status { status, .. } => ErrorClass::new(
            kind_for_status(*status),
            RETRYABLE_STATUSES.contains(status),
        ),
        TransportError::Decode(_) | TransportError::InvalidRequest(_) => {
            ErrorClass::new(ErrorKind::Unknown, false)
        }
    }
}

/// Response-less failures, timeouts and 408/429/500/502/503/504 may be retried.
pub fn is_retryable_error(err: &TransportError) -> bool {
    classify(err).retryable
}

/// Generic message for an HTTP status.
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request.",
        401 => "Authentication required.",
        403 => "You do not have permission to access this file.",
        404 => "File not found.",
        413 => "File is too large.",
        415 => "Unsupported file type.",
        500 => "A server error occurred.",
        503 => "Service temporarily unavailable.",
        _ => "An unknown error occurred.",
    }
}

/// User-facing message for a failed upload or download.
///
/// Transport error text is never included; only server-provided
/// `message` fields and fixed strings are.
pub fn user_message(err: &TransportError, direction: Direction) -> String {
    let fallback = match direction {
        Direction::Upload => "File upload failed.",
        Direction::Download => "File download failed.",
    };

    match err {
        TransportError::Timeout => match direction {
            Direction::Upload => "File upload timed out.".into(),
            Direction::Download => "File download timed out.".into(),
        },
        TransportError::Canceled => match direction {
            Direction::Upload => "Upload canceled.".into(),
            Direction::Download => "Download canceled.".into(),
        },
        TransportError::Status { status, .. } => {
            let status = *status;
            let server = err.server_message();
            match (direction, status) {
                (_, 400) => server.unwrap_or(status_message(400)).into(),
                (Direction::Upload, 401 | 413 | 415 | 500) => status_message(status).into(),
                (Direction::Download, 403 | 404 | 500) => status_message(status).into(),
                _ => server.unwrap_or(fallback).into(),
            }
        }
        TransportError::Network(_) => fallback.into(),
        TransportError::Decode(_) | TransportError::InvalidRequest(_) => {
            "An unknown error occurred.".into()
        }
    }
}
