//! Client for a presigned-URL file transfer API.
//!
//! Uploads go presign → direct PUT → finalize; downloads go existence
//! probe → fetch → save. [`FileService`] owns the shared state and is the
//! usual entry point.

pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod notifier;
pub mod profile;
pub mod service;
pub mod transport;
pub mod types;
pub mod upload;
pub mod urls;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use download::{
    Blob, BlobRef, DirectorySaveTarget, Downloader, ObjectUrls, SaveTarget,
    filename_from_disposition,
};
pub use error::{
    ClientError, ErrorClass, ErrorKind, TransportError, classify, is_retryable_error,
    status_message, user_message,
};
pub use http::ReqwestTransport;
pub use notifier::{Notice, NoticeKind, NoticeQueue, Notifier, TracingNotifier};
pub use profile::{ProfileImageUploader, validate_profile_image};
pub use service::{CancelOutcome, FileService};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, auth_headers};
pub use types::{DownloadData, ProfileImageData, TransferResult, UploadData};
pub use upload::Uploader;
pub use urls::{Mode, UrlResolver};
