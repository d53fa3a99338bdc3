//! Download orchestration: existence probe, fetch, save.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use filerelay_protocol::Credentials;
use filerelay_protocol::constants::DEFAULT_CONTENT_TYPE;
use filerelay_transfer::{
    CancellationRegistry, Direction, DownloadPhase, TaskId, TransferError, TransferTask,
    safe_file_name,
};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorClass, ErrorKind, TransportError, classify, user_message};
use crate::transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, auth_headers, send_cancellable,
};
use crate::types::{DownloadData, TransferResult};
use crate::urls::{Mode, UrlResolver};

const PREPARE_FAILED: &str = "An error occurred while preparing the download.";
const SAVE_FAILED: &str = "Could not save the downloaded file.";

/// A downloaded payload with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub content_type: String,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Opaque `blob:<uuid>` handle to a payload held in [`ObjectUrls`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table of transient payload references.
///
/// A reference is valid from [`create`](Self::create) until it is revoked;
/// downloads revoke theirs a short delay after the save completes.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrls {
    entries: Arc<Mutex<HashMap<BlobRef, Blob>>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlobRef, Blob>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, blob: Blob) -> BlobRef {
        let blob_ref = BlobRef(format!("blob:{}", uuid::Uuid::new_v4()));
        self.lock().insert(blob_ref.clone(), blob);
        blob_ref
    }

    pub fn resolve(&self, blob_ref: &BlobRef) -> Option<Blob> {
        self.lock().get(blob_ref).cloned()
    }

    pub fn revoke(&self, blob_ref: &BlobRef) -> bool {
        self.lock().remove(blob_ref).is_some()
    }

    /// Revokes `blob_ref` after `delay` on a background task.
    pub fn revoke_after(&self, blob_ref: BlobRef, delay: Duration) -> tokio::task::JoinHandle<()> {
        let urls = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if urls.revoke(&blob_ref) {
                debug!(blob = %blob_ref, "transient reference released");
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Where downloaded files end up.
pub trait SaveTarget: Send + Sync {
    /// Persists `blob` under (a sanitised form of) `file_name` and returns
    /// its location.
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        blob: &'a Blob,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>>;
}

/// Writes downloads into a directory.
///
/// Names are reduced to their final path component. An existing file is
/// never overwritten; ` (1)`, ` (2)`, ... is appended to the stem instead.
#[derive(Debug, Clone)]
pub struct DirectorySaveTarget {
    dir: PathBuf,
}

impl DirectorySaveTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, file_name: &str, blob: &Blob) -> Result<String, TransferError> {
        let name = safe_file_name(file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = unique_path(&self.dir, &name).await;
        tokio::fs::write(&path, &blob.data).await?;
        info!(path = %path.display(), bytes = blob.data.len(), "file saved");
        Ok(path.display().to_string())
    }
}

impl SaveTarget for DirectorySaveTarget {
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        blob: &'a Blob,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(self.write(file_name, blob))
    }
}

async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Extracts the save-as name from a `Content-Disposition` value.
///
/// Tries `filename*=UTF-8''...`, then `filename="..."`, then bare
/// `filename=...`. The capture is percent-decoded; a capture that does not
/// decode to UTF-8 is returned as is.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let capture = extended_filename(header)
        .or_else(|| quoted_filename(header))
        .or_else(|| bare_filename(header))?;
    let decoded = match percent_decode_str(capture).decode_utf8() {
        Ok(s) => s.into_owned(),
        Err(_) => capture.to_string(),
    };
    Some(decoded)
}

fn extended_filename(header: &str) -> Option<&str> {
    const KEY: &str = "filename*=UTF-8''";
    let start = header.find(KEY)? + KEY.len();
    take_until_semicolon(&header[start..])
}

fn quoted_filename(header: &str) -> Option<&str> {
    const KEY: &str = "filename=\"";
    header.match_indices(KEY).find_map(|(i, _)| {
        let rest = &header[i + KEY.len()..];
        let end = rest.find('"')?;
        (end > 0).then(|| &rest[..end])
    })
}

fn bare_filename(header: &str) -> Option<&str> {
    const KEY: &str = "filename=";
    header
        .match_indices(KEY)
        .find_map(|(i, _)| take_until_semicolon(&header[i + KEY.len()..]))
}

fn take_until_semicolon(s: &str) -> Option<&str> {
    let value = s.split(';').next().unwrap_or("").trim();
    (!value.is_empty()).then_some(value)
}

enum Failure {
    Transport(TransportError),
    /// The probe answered with a status that is neither 200 nor handled.
    Prepare(u16),
    Save(TransferError),
}

/// Drives one download through probe → fetch → save.
pub struct Downloader<'a> {
    transport: &'a dyn HttpTransport,
    registry: &'a CancellationRegistry,
    urls: &'a UrlResolver,
    object_urls: &'a ObjectUrls,
    target: &'a dyn SaveTarget,
    timeout: Duration,
    release_delay: Duration,
}

impl<'a> Downloader<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        registry: &'a CancellationRegistry,
        urls: &'a UrlResolver,
        object_urls: &'a ObjectUrls,
        target: &'a dyn SaveTarget,
    ) -> Self {
        Self {
            transport,
            registry,
            urls,
            object_urls,
            target,
            timeout: filerelay_protocol::constants::DOWNLOAD_TIMEOUT,
            release_delay: filerelay_protocol::constants::BLOB_RELEASE_DELAY,
        }
    }

    /// Overrides the fetch timeout (default 30 s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the delay before the transient reference is released.
    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    pub async fn download(
        &self,
        filename: &str,
        display_name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<DownloadData>, ClientError> {
        self.download_with_task(TaskId::new(), filename, display_name, credentials)
            .await
    }

    /// Like [`download`](Self::download) with a caller-chosen task id, so
    /// the caller can cancel through the registry.
    pub async fn download_with_task(
        &self,
        task_id: TaskId,
        filename: &str,
        display_name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<DownloadData>, ClientError> {
        let mut task = TransferTask::new(
            task_id,
            filename,
            0,
            DEFAULT_CONTENT_TYPE,
            Direction::Download,
            DownloadPhase::Probing,
        );
        let _registration = self.registry.register(&task)?;
        let cancel = task.cancel_token();
        info!(task = %task_id, file = %filename, "download started");

        let outcome = self
            .run(&mut task, filename, display_name, credentials, &cancel)
            .await;

        match outcome {
            Ok(data) => {
                advance(&mut task, DownloadPhase::Completed);
                info!(task = %task_id, file = %data.file_name, bytes = data.size, "download complete");
                Ok(TransferResult::ok(task_id, "File downloaded.", data))
            }
            Err(Failure::Transport(err)) => {
                if err.status() == Some(401) {
                    advance(&mut task, DownloadPhase::Failed);
                    warn!(task = %task_id, "download unauthorized");
                    return Err(ClientError::Unauthorized);
                }
                let class = classify(&err);
                let message = user_message(&err, Direction::Download);
                if class.kind == ErrorKind::Canceled {
                    advance(&mut task, DownloadPhase::Canceled);
                    info!(task = %task_id, "download canceled");
                } else {
                    advance(&mut task, DownloadPhase::Failed);
                    warn!(task = %task_id, error = %err, kind = %class.kind, "download failed");
                }
                Ok(TransferResult::failed(Some(task_id), class, message))
            }
            Err(Failure::Prepare(status)) => {
                advance(&mut task, DownloadPhase::Failed);
                warn!(task = %task_id, status, "download probe failed");
                let class = classify(&TransportError::Status {
                    status,
                    message: None,
                });
                Ok(TransferResult::failed(Some(task_id), class, PREPARE_FAILED))
            }
            Err(Failure::Save(err)) => {
                advance(&mut task, DownloadPhase::Failed);
                warn!(task = %task_id, error = %err, "saving download failed");
                Ok(TransferResult::failed(
                    Some(task_id),
                    ErrorClass::new(ErrorKind::Unknown, false),
                    SAVE_FAILED,
                ))
            }
        }
    }

    async fn run(
        &self,
        task: &mut TransferTask<DownloadPhase>,
        filename: &str,
        display_name: &str,
        credentials: Option<&Credentials>,
        cancel: &CancellationToken,
    ) -> Result<DownloadData, Failure> {
        let url = self.urls.resource_url(filename, Mode::Download);
        let headers = auth_headers(credentials);

        let probe = HttpRequest::new(Method::Head, &url).headers(headers.clone());
        let probe = send_cancellable(self.transport, probe, cancel)
            .await
            .map_err(Failure::Transport)?;
        match probe.status {
            200 => {}
            401 | 403 | 404 | 500..=599 => {
                return Err(Failure::Transport(TransportError::Status {
                    status: probe.status,
                    message: None,
                }));
            }
            other => return Err(Failure::Prepare(other)),
        }

        advance(task, DownloadPhase::Fetching);
        let fetch = HttpRequest::new(Method::Get, &url)
            .headers(headers)
            .timeout(self.timeout);
        let response = match tokio::time::timeout(
            self.timeout,
            send_cancellable(self.transport, fetch, cancel),
        )
        .await
        {
            Ok(result) => result.map_err(Failure::Transport)?,
            Err(_) => return Err(Failure::Transport(TransportError::Timeout)),
        };
        let response = response.error_for_status().map_err(Failure::Transport)?;

        advance(task, DownloadPhase::Saving);
        self.save(task.id(), response, display_name, filename).await
    }

    async fn save(
        &self,
        task_id: TaskId,
        response: HttpResponse,
        display_name: &str,
        filename: &str,
    ) -> Result<DownloadData, Failure> {
        let content_type = response
            .header("content-type")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let file_name = response
            .header("content-disposition")
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| {
                if display_name.is_empty() {
                    filename.to_string()
                } else {
                    display_name.to_string()
                }
            });

        let blob = Blob::new(response.body, content_type.clone());
        let size = blob.size();
        let blob_ref = self.object_urls.create(blob.clone());
        debug!(task = %task_id, blob = %blob_ref, file = %file_name, "saving download");

        let saved = self.target.save(&file_name, &blob).await;
        self.object_urls
            .revoke_after(blob_ref.clone(), self.release_delay);

        let location = saved.map_err(Failure::Save)?;
        Ok(DownloadData {
            file_name,
            content_type,
            size,
            location,
            blob_ref,
        })
    }
}

fn advance(task: &mut TransferTask<DownloadPhase>, next: DownloadPhase) {
    if let Err(e) = task.advance(next) {
        warn!(task = %task.id(), error = %e, "ignored phase change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingSaveTarget, MemorySaveTarget, MockTransport, Reply, json, status};

    const BASE: &str = "https://api.test";

    struct Fixture {
        transport: MockTransport,
        registry: CancellationRegistry,
        urls: UrlResolver,
        object_urls: ObjectUrls,
        target: MemorySaveTarget,
    }

    impl Fixture {
        fn new(transport: MockTransport) -> Self {
            Self {
                transport,
                registry: CancellationRegistry::new(),
                urls: UrlResolver::new(BASE),
                object_urls: ObjectUrls::new(),
                target: MemorySaveTarget::default(),
            }
        }

        fn downloader(&self) -> Downloader<'_> {
            Downloader::new(
                &self.transport,
                &self.registry,
                &self.urls,
                &self.object_urls,
                &self.target,
            )
        }
    }

    fn file_response(disposition: Option<&str>) -> Reply {
        let mut resp = HttpResponse::new(200)
            .with_header("Content-Type", "application/pdf")
            .with_body("%PDF-1.7");
        if let Some(d) = disposition {
            resp = resp.with_header("Content-Disposition", d);
        }
        Reply::Respond(resp)
    }

    fn creds() -> Credentials {
        Credentials::new("tok", "sess")
    }

    #[test]
    fn disposition_quoted() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn disposition_extended() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''report%20final.pdf").as_deref(),
            Some("report final.pdf")
        );
    }

    #[test]
    fn disposition_extended_preferred_over_quoted() {
        let h = "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf";
        assert_eq!(filename_from_disposition(h).as_deref(), Some("보고서.pdf"));
    }

    #[test]
    fn disposition_bare() {
        assert_eq!(
            filename_from_disposition("attachment; filename=plain.txt; size=3").as_deref(),
            Some("plain.txt")
        );
    }

    #[test]
    fn disposition_invalid_utf8_used_raw() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''bad%FF.pdf").as_deref(),
            Some("bad%FF.pdf")
        );
    }

    #[test]
    fn disposition_without_filename() {
        assert_eq!(filename_from_disposition("inline"), None);
        assert_eq!(filename_from_disposition("attachment; filename="), None);
    }

    #[tokio::test]
    async fn happy_path_saves_with_header_name() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/api/files/download/abc.pdf", status(200))
                .on(
                    Method::Get,
                    "/api/files/download/abc.pdf",
                    file_response(Some("attachment; filename=\"report.pdf\"")),
                ),
        );

        let result = fx
            .downloader()
            .download("abc.pdf", "Original.pdf", Some(&creds()))
            .await
            .unwrap();

        assert!(result.success, "{}", result.message);
        let data = result.data.unwrap();
        assert_eq!(data.file_name, "report.pdf");
        assert_eq!(data.content_type, "application/pdf");
        assert_eq!(data.size, 8);
        assert_eq!(data.location, "memory://report.pdf");

        let saved = fx.target.saved.lock().unwrap();
        assert_eq!(saved[0].1.data.as_ref(), b"%PDF-1.7");
        assert!(fx.registry.is_empty());

        for req in fx.transport.requests() {
            assert_eq!(req.url, format!("{BASE}/api/files/download/abc.pdf"));
            assert_eq!(req.header_value("x-auth-token"), Some("tok"));
            assert_eq!(req.header_value("x-session-id"), Some("sess"));
        }
    }

    #[tokio::test]
    async fn falls_back_to_display_name() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/x.bin", status(200))
                .on(
                    Method::Get,
                    "/x.bin",
                    Reply::Respond(HttpResponse::new(200).with_body("raw")),
                ),
        );

        let result = fx
            .downloader()
            .download("x.bin", "Nice Name.bin", None)
            .await
            .unwrap();
        let data = result.data.unwrap();
        assert_eq!(data.file_name, "Nice Name.bin");
        assert_eq!(data.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn not_found_probe_skips_fetch() {
        let fx = Fixture::new(MockTransport::new().on(Method::Head, "/gone.pdf", status(404)));

        let result = fx
            .downloader()
            .download("gone.pdf", "gone.pdf", None)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(result.message, "File not found.");
        assert_eq!(fx.transport.count(Method::Get, "/gone.pdf"), 0);
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn forbidden_probe() {
        let fx = Fixture::new(MockTransport::new().on(Method::Head, "/s.pdf", status(403)));
        let result = fx.downloader().download("s.pdf", "", None).await.unwrap();
        assert_eq!(result.error_kind, Some(ErrorKind::Forbidden));
        assert_eq!(
            result.message,
            "You do not have permission to access this file."
        );
        assert_eq!(fx.transport.count(Method::Get, "/s.pdf"), 0);
    }

    #[tokio::test]
    async fn other_probe_status_is_prepare_error() {
        let fx = Fixture::new(MockTransport::new().on(Method::Head, "/s.pdf", status(409)));
        let result = fx.downloader().download("s.pdf", "", None).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, PREPARE_FAILED);
        assert_eq!(fx.transport.count(Method::Get, "/s.pdf"), 0);
    }

    #[tokio::test]
    async fn probe_5xx_is_server_error() {
        let fx = Fixture::new(MockTransport::new().on(Method::Head, "/s.pdf", status(500)));
        let result = fx.downloader().download("s.pdf", "", None).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::ServerError));
        assert!(result.retryable);
        assert_eq!(result.message, "A server error occurred.");
        assert_eq!(fx.transport.count(Method::Get, "/s.pdf"), 0);
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_probe_is_err() {
        let fx = Fixture::new(MockTransport::new().on(Method::Head, "/s.pdf", status(401)));
        let err = fx.downloader().download("s.pdf", "", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_fetch_is_err() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/s.pdf", status(200))
                .on(Method::Get, "/s.pdf", json(401, r#"{"message":"expired"}"#)),
        );
        let err = fx.downloader().download("s.pdf", "", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn server_error_on_fetch_is_retryable() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/s.pdf", status(200))
                .on(Method::Get, "/s.pdf", status(503)),
        );
        let result = fx.downloader().download("s.pdf", "", None).await.unwrap();
        assert_eq!(result.error_kind, Some(ErrorKind::ServerError));
        assert!(result.retryable);
    }

    #[tokio::test]
    async fn network_failure_on_probe() {
        let fx = Fixture::new(MockTransport::new().on(
            Method::Head,
            "/s.pdf",
            Reply::Fail(TransportError::Network("refused".into())),
        ));
        let result = fx.downloader().download("s.pdf", "", None).await.unwrap();
        assert_eq!(result.error_kind, Some(ErrorKind::Network));
        assert!(result.retryable);
        assert!(!result.message.contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_times_out() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/slow.pdf", status(200))
                .on(Method::Get, "/slow.pdf", Reply::Hang),
        );

        let result = fx
            .downloader()
            .with_timeout(Duration::from_secs(30))
            .download("slow.pdf", "", None)
            .await
            .unwrap();

        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(result.message, "File download timed out.");
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn cancel_during_fetch() {
        let fx = Arc::new(Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/big.pdf", status(200))
                .on(Method::Get, "/big.pdf", Reply::Hang),
        ));
        let task_id = TaskId::new();

        let canceller = {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.transport.wait_for(Method::Get, "/big.pdf").await;
                fx.registry.cancel(task_id)
            })
        };

        let result = fx
            .downloader()
            .download_with_task(task_id, "big.pdf", "", None)
            .await
            .unwrap();

        assert!(canceller.await.unwrap());
        assert!(result.is_canceled());
        assert_eq!(result.message, "Download canceled.");
        assert!(!result.retryable);
        assert!(!fx.registry.contains(task_id));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_reference_released_after_delay() {
        let fx = Fixture::new(
            MockTransport::new()
                .on(Method::Head, "/a.pdf", status(200))
                .on(Method::Get, "/a.pdf", file_response(None)),
        );

        let result = fx.downloader().download("a.pdf", "a.pdf", None).await.unwrap();
        let blob_ref = result.data.unwrap().blob_ref;
        assert!(blob_ref.as_str().starts_with("blob:"));
        assert!(fx.object_urls.resolve(&blob_ref).is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fx.object_urls.resolve(&blob_ref).is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fx.object_urls.is_empty());
    }

    #[tokio::test]
    async fn save_failure_is_reported() {
        let transport = MockTransport::new()
            .on(Method::Head, "/a.pdf", status(200))
            .on(Method::Get, "/a.pdf", file_response(None));
        let registry = CancellationRegistry::new();
        let urls = UrlResolver::new(BASE);
        let object_urls = ObjectUrls::new();

        let result = Downloader::new(&transport, &registry, &urls, &object_urls, &FailingSaveTarget)
            .download("a.pdf", "a.pdf", None)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.message, SAVE_FAILED);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn directory_target_writes_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectorySaveTarget::new(dir.path().join("out"));
        let blob = Blob::new("one", "text/plain");

        let first = target.save("docs/notes.txt", &blob).await.unwrap();
        let second = target
            .save("notes.txt", &Blob::new("two", "text/plain"))
            .await
            .unwrap();

        assert!(first.ends_with("notes.txt"));
        assert!(second.ends_with("notes (1).txt"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two");
    }

    #[tokio::test]
    async fn directory_target_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let target = DirectorySaveTarget::new(dir.path());
        let err = target
            .save("  ", &Blob::new("x", "text/plain"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidName(_)));
    }

    #[test]
    fn object_urls_lifecycle() {
        let urls = ObjectUrls::new();
        let r = urls.create(Blob::new("abc", "text/plain"));
        assert_eq!(urls.len(), 1);
        assert_eq!(urls.resolve(&r).unwrap().size(), 3);
        assert!(urls.revoke(&r));
        assert!(!urls.revoke(&r));
        assert!(urls.is_empty());
    }
}
