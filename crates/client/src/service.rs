//! Facade that owns the shared state and wires the orchestrators together.

use std::sync::Arc;

use filerelay_protocol::{Credentials, FileRecord};
use filerelay_transfer::{
    ActiveTask, CancellationRegistry, Direction, FileDescriptor, ProgressCallback, TaskId, UploadFile,
    ValidationError, Validator, format_file_size,
};
use serde::Serialize;
use tracing::info;

use crate::config::ClientConfig;
use crate::download::{DirectorySaveTarget, Downloader, ObjectUrls, SaveTarget};
use crate::error::ClientError;
use crate::notifier::{Notifier, TracingNotifier};
use crate::profile::ProfileImageUploader;
use crate::transport::{HttpTransport, auth_headers};
use crate::types::{DownloadData, ProfileImageData, TransferResult, UploadData};
use crate::upload::Uploader;
use crate::urls::{Mode, UrlResolver};

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

/// Entry point for file transfers against one API.
///
/// Built once and shared; every method takes `&self`.
pub struct FileService {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    registry: CancellationRegistry,
    urls: UrlResolver,
    validator: Validator,
    notifier: Arc<dyn Notifier>,
    object_urls: ObjectUrls,
    save_target: Arc<dyn SaveTarget>,
}

impl FileService {
    pub fn new(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let urls = UrlResolver::new(config.api_url.as_str());
        let save_target = Arc::new(DirectorySaveTarget::new(config.download_dir.clone()));
        Self {
            config,
            transport,
            registry: CancellationRegistry::new(),
            urls,
            validator: Validator::default(),
            notifier: Arc::new(TracingNotifier),
            object_urls: ObjectUrls::new(),
            save_target,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_save_target(mut self, target: Arc<dyn SaveTarget>) -> Self {
        self.save_target = target;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credentials from the configuration, when both parts are set.
    pub fn credentials(&self) -> Option<Credentials> {
        self.config.credentials()
    }

    pub fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }

    pub fn object_urls(&self) -> &ObjectUrls {
        &self.object_urls
    }

    pub fn active_transfers(&self) -> Vec<ActiveTask> {
        self.registry.active()
    }

    fn uploader(&self) -> Uploader<'_> {
        Uploader::new(
            self.transport.as_ref(),
            &self.registry,
            &self.urls,
            &self.validator,
            self.notifier.as_ref(),
        )
    }

    fn downloader(&self) -> Downloader<'_> {
        Downloader::new(
            self.transport.as_ref(),
            &self.registry,
            &self.urls,
            &self.object_urls,
            self.save_target.as_ref(),
        )
        .with_timeout(self.config.download_timeout())
        .with_release_delay(self.config.blob_release_delay())
    }

    fn profile(&self) -> ProfileImageUploader<'_> {
        ProfileImageUploader::new(
            self.transport.as_ref(),
            &self.registry,
            &self.urls,
            self.notifier.as_ref(),
        )
    }

    pub async fn upload(
        &self,
        file: &UploadFile,
        on_progress: Option<ProgressCallback>,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<UploadData>, ClientError> {
        self.uploader().upload(file, on_progress, credentials).await
    }

    pub async fn upload_with_task(
        &self,
        task_id: TaskId,
        file: &UploadFile,
        on_progress: Option<ProgressCallback>,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<UploadData>, ClientError> {
        self.uploader()
            .upload_with_task(task_id, file, on_progress, credentials)
            .await
    }

    pub async fn download(
        &self,
        filename: &str,
        display_name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<DownloadData>, ClientError> {
        self.downloader()
            .download(filename, display_name, credentials)
            .await
    }

    pub async fn download_with_task(
        &self,
        task_id: TaskId,
        filename: &str,
        display_name: &str,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<DownloadData>, ClientError> {
        self.downloader()
            .download_with_task(task_id, filename, display_name, credentials)
            .await
    }

    /// Cancels one in-flight upload. Downloads are left alone.
    pub fn cancel_upload(&self, task_id: TaskId) -> CancelOutcome {
        let found = self
            .registry
            .cancel_matching(|t| t.id == task_id && t.direction == Direction::Upload);
        if found == 1 {
            info!(task = %task_id, "cancel requested");
            CancelOutcome {
                success: true,
                message: "Upload canceled.".into(),
                count: 1,
            }
        } else {
            CancelOutcome {
                success: false,
                message: "No upload found to cancel.".into(),
                count: 0,
            }
        }
    }

    /// Cancels every in-flight upload. Downloads are left alone.
    pub fn cancel_all_uploads(&self) -> CancelOutcome {
        let count = self
            .registry
            .cancel_matching(|t| t.direction == Direction::Upload);
        info!(count, "cancel all requested");
        CancelOutcome {
            success: true,
            message: format!("{count} upload(s) canceled."),
            count,
        }
    }

    pub async fn upload_profile_image(
        &self,
        file: &UploadFile,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<ProfileImageData>, ClientError> {
        self.profile().upload(file, credentials).await
    }

    pub async fn remove_profile_image(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<()>, ClientError> {
        self.profile().remove(credentials).await
    }

    pub fn file_url(&self, filename: &str, mode: Mode) -> String {
        self.urls.resource_url(filename, mode)
    }

    pub fn preview_url(
        &self,
        file: &FileRecord,
        credentials: Option<&Credentials>,
        with_auth: bool,
    ) -> String {
        self.urls.preview_url(file, credentials, with_auth)
    }

    pub fn profile_image_url(&self, path: &str) -> String {
        self.urls.profile_image_url(path)
    }

    pub fn file_type(&self, file_name: &str) -> &'static str {
        self.validator.file_type(file_name)
    }

    pub fn format_file_size(&self, bytes: u64) -> String {
        format_file_size(bytes)
    }

    pub fn validate(&self, file: Option<&FileDescriptor>) -> Result<(), ValidationError> {
        self.validator.validate(file)
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn auth_headers(&self, credentials: Option<&Credentials>) -> Vec<(String, String)> {
        auth_headers(credentials)
    }
}
