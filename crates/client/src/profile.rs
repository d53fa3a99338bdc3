//! Profile image upload and removal.
//!
//! Same presign → PUT → finalize shape as file uploads, against the
//! `/api/users/profile-image` endpoints and with an image-only rule.

use filerelay_protocol::constants::{
    PROFILE_FINALIZE_PATH, PROFILE_IMAGE_LIMIT, PROFILE_IMAGE_PATH, PROFILE_PRESIGN_PATH,
};
use filerelay_protocol::messages::{ProfileFinalizeRequest, ProfileImageResponse};
use filerelay_protocol::Credentials;
use filerelay_transfer::{
    CancellationRegistry, Direction, TaskId, TransferTask, UploadFile, UploadPhase,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorClass, ErrorKind, TransportError, classify, user_message};
use crate::notifier::Notifier;
use crate::transport::{HttpRequest, HttpTransport, Method, auth_headers, send_cancellable};
use crate::types::{ProfileImageData, TransferResult};
use crate::upload::{Failure, presign, put_object};
use crate::urls::UrlResolver;

const NOT_AN_IMAGE: &str = "Only image files can be uploaded.";
const TOO_LARGE: &str = "File size cannot exceed 5 MB.";
const NO_CREDENTIALS: &str = "Authentication information is missing.";
const PRESIGN_FAILED: &str = "Failed to create an upload URL.";
const FINALIZE_FAILED: &str = "Failed to complete the image upload.";
const REMOVE_FAILED: &str = "Failed to remove the image.";
const UPDATED: &str = "Profile image updated.";
const REMOVED: &str = "Profile image removed.";

/// Image-only check applied before any request.
pub fn validate_profile_image(file: &UploadFile) -> Result<(), &'static str> {
    if !file.mime_type().starts_with("image/") {
        return Err(NOT_AN_IMAGE);
    }
    if file.size() > PROFILE_IMAGE_LIMIT {
        return Err(TOO_LARGE);
    }
    Ok(())
}

/// Message for a failed profile call: the server's own text when it sent
/// one, otherwise the phase default.
fn failure_message(err: &TransportError, default: &str) -> String {
    match err {
        TransportError::Canceled => user_message(err, Direction::Upload),
        TransportError::Status {
            message: Some(m), ..
        } => m.clone(),
        _ => default.to_string(),
    }
}

pub struct ProfileImageUploader<'a> {
    transport: &'a dyn HttpTransport,
    registry: &'a CancellationRegistry,
    urls: &'a UrlResolver,
    notifier: &'a dyn Notifier,
}

impl<'a> ProfileImageUploader<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        registry: &'a CancellationRegistry,
        urls: &'a UrlResolver,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            transport,
            registry,
            urls,
            notifier,
        }
    }

    pub async fn upload(
        &self,
        file: &UploadFile,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<ProfileImageData>, ClientError> {
        self.upload_with_task(TaskId::new(), file, credentials).await
    }

    pub async fn upload_with_task(
        &self,
        task_id: TaskId,
        file: &UploadFile,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<ProfileImageData>, ClientError> {
        if let Err(message) = validate_profile_image(file) {
            debug!(file = %file.name(), reason = message, "profile image rejected");
            self.notifier.error(message);
            return Ok(TransferResult::rejected(message));
        }
        let Some(credentials) = credentials.filter(|c| c.is_complete()) else {
            self.notifier.error(NO_CREDENTIALS);
            return Ok(TransferResult::rejected(NO_CREDENTIALS));
        };

        let mut task = TransferTask::new(
            task_id,
            file.name(),
            file.size(),
            file.mime_type(),
            Direction::Upload,
            UploadPhase::Validating,
        );
        let _registration = self.registry.register(&task)?;
        let cancel = task.cancel_token();
        info!(task = %task_id, file = %file.name(), "profile image upload started");

        match self.run(&mut task, file, credentials, &cancel).await {
            Ok(image_url) => {
                advance(&mut task, UploadPhase::Completed);
                info!(task = %task_id, image = %image_url, "profile image updated");
                self.notifier.success(UPDATED);
                let resolved_url = self.urls.profile_image_url(&image_url);
                Ok(TransferResult::ok(
                    task_id,
                    UPDATED,
                    ProfileImageData {
                        image_url,
                        resolved_url,
                    },
                ))
            }
            Err((Failure::Transport(err), default)) => {
                if err.status() == Some(401) {
                    advance(&mut task, UploadPhase::Failed);
                    return Err(ClientError::Unauthorized);
                }
                let class = classify(&err);
                let message = failure_message(&err, default);
                if class.kind == ErrorKind::Canceled {
                    advance(&mut task, UploadPhase::Canceled);
                    info!(task = %task_id, "profile image upload canceled");
                } else {
                    advance(&mut task, UploadPhase::Failed);
                    warn!(task = %task_id, error = %err, "profile image upload failed");
                    self.notifier.error(&message);
                }
                Ok(TransferResult::failed(Some(task_id), class, message))
            }
            Err((Failure::Server(message), _)) => {
                advance(&mut task, UploadPhase::Failed);
                warn!(task = %task_id, reason = %message, "profile image rejected by server");
                self.notifier.error(&message);
                Ok(TransferResult::failed(
                    Some(task_id),
                    ErrorClass::new(ErrorKind::ServerError, false),
                    message,
                ))
            }
        }
    }

    /// Returns the stored image path, or the failure with its phase default.
    async fn run(
        &self,
        task: &mut TransferTask<UploadPhase>,
        file: &UploadFile,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<String, (Failure, &'static str)> {
        let headers = auth_headers(Some(credentials));

        advance(task, UploadPhase::Presigning);
        let presigned = presign(
            self.transport,
            self.urls.api_url(PROFILE_PRESIGN_PATH),
            &headers,
            file,
            cancel,
        )
        .await
        .map_err(|f| match f {
            Failure::Server(_) => (Failure::Server(PRESIGN_FAILED.into()), PRESIGN_FAILED),
            other => (other, PRESIGN_FAILED),
        })?;

        advance(task, UploadPhase::Uploading);
        put_object(self.transport, &presigned, file, None, cancel)
            .await
            .map_err(|e| (Failure::Transport(e), FINALIZE_FAILED))?;

        advance(task, UploadPhase::Finalizing);
        let finalize = HttpRequest::new(Method::Post, self.urls.api_url(PROFILE_FINALIZE_PATH))
            .headers(headers)
            .json(&ProfileFinalizeRequest {
                upload_id: presigned.upload_id.clone(),
            })
            .map_err(|e| (Failure::Transport(e), FINALIZE_FAILED))?;
        let resp = send_cancellable(self.transport, finalize, cancel)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| (Failure::Transport(e), FINALIZE_FAILED))?;

        let body = resp.json::<ProfileImageResponse>().unwrap_or_default();
        let message = body.message.filter(|m| !m.trim().is_empty());
        match body.image_url.filter(|u| !u.is_empty()) {
            Some(url) if body.success => Ok(url),
            _ => Err((
                Failure::Server(message.unwrap_or_else(|| FINALIZE_FAILED.into())),
                FINALIZE_FAILED,
            )),
        }
    }

    /// Removes the current profile image.
    pub async fn remove(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<()>, ClientError> {
        let Some(credentials) = credentials.filter(|c| c.is_complete()) else {
            self.notifier.error(NO_CREDENTIALS);
            return Ok(TransferResult::rejected(NO_CREDENTIALS));
        };

        let request = HttpRequest::new(Method::Delete, self.urls.api_url(PROFILE_IMAGE_PATH))
            .headers(auth_headers(Some(credentials)));
        let outcome = self
            .transport
            .send(request)
            .await
            .and_then(|r| r.error_for_status());

        match outcome {
            Ok(_) => {
                info!("profile image removed");
                self.notifier.success(REMOVED);
                Ok(TransferResult::done(REMOVED, ()))
            }
            Err(err) if err.status() == Some(401) => Err(ClientError::Unauthorized),
            Err(err) => {
                warn!(error = %err, "profile image removal failed");
                let message = failure_message(&err, REMOVE_FAILED);
                self.notifier.error(&message);
                Ok(TransferResult::failed(None, classify(&err), message))
            }
        }
    }
}

fn advance(task: &mut TransferTask<UploadPhase>, next: UploadPhase) {
    if let Err(e) = task.advance(next) {
        warn!(task = %task.id(), error = %e, "ignored phase change");
    }
}
