use std::time::Duration;

/// Presign endpoint for chat file uploads.
pub const PRESIGN_PATH: &str = "/api/files/presign";

/// Finalize endpoint for chat file uploads (multipart form, `uploadId` field).
pub const FINALIZE_PATH: &str = "/api/files/upload";

/// Prefix for the download resource (`HEAD` probe and `GET` fetch).
pub const DOWNLOAD_PATH: &str = "/api/files/download";

/// Prefix for the inline preview resource.
pub const VIEW_PATH: &str = "/api/files/view";

/// Presign endpoint for profile images.
pub const PROFILE_PRESIGN_PATH: &str = "/api/users/profile-image/presign";

/// Finalize endpoint for profile images (JSON body).
pub const PROFILE_FINALIZE_PATH: &str = "/api/users/profile-image/finalize";

/// Profile image resource (`DELETE` removes the current image).
pub const PROFILE_IMAGE_PATH: &str = "/api/users/profile-image";

/// Header carrying the caller's auth token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Header carrying the caller's session id.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// `Accept` value sent on every origin request.
pub const ACCEPT_VALUE: &str = "application/json, */*";

/// Query parameter names used by authenticated preview URLs.
pub const TOKEN_QUERY_PARAM: &str = "token";
pub const SESSION_ID_QUERY_PARAM: &str = "sessionId";

/// Multipart field carrying the upload id on finalize.
pub const UPLOAD_ID_FIELD: &str = "uploadId";

/// Content type used when the server does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Global upload ceiling (50 MB), checked before any per-type ceiling.
pub const UPLOAD_LIMIT: u64 = 50 * 1024 * 1024;

/// Ceiling for profile images (5 MB).
pub const PROFILE_IMAGE_LIMIT: u64 = 5 * 1024 * 1024;

/// Timeout for the download body fetch.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before a transient download reference is released.
pub const BLOB_RELEASE_DELAY: Duration = Duration::from_millis(100);

/// Suggested retry budget for callers acting on the `retryable` flag.
///
/// The orchestrators never retry on their own.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Suggested delay between caller-driven retries.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP statuses a caller may retry.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];
