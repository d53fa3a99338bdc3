//! Three-phase upload: presign → direct PUT → finalize.

use filerelay_protocol::constants::{FINALIZE_PATH, PRESIGN_PATH, UPLOAD_ID_FIELD};
use filerelay_protocol::messages::{FinalizeResponse, PresignRequest, PresignResponse};
use filerelay_protocol::Credentials;
use filerelay_transfer::{
    CancellationRegistry, Direction, ProgressCallback, ProgressReporter, TaskId, TransferTask,
    UploadFile, UploadPhase, Validator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorClass, ErrorKind, TransportError, classify, user_message};
use crate::notifier::Notifier;
use crate::transport::{HttpRequest, HttpTransport, Method, auth_headers, send_cancellable};
use crate::types::{TransferResult, UploadData};
use crate::urls::{Mode, UrlResolver};

const PRESIGN_FAILED: &str = "Could not create an upload URL.";
const FINALIZE_FAILED: &str = "File upload failed.";
const UPLOADED: &str = "File uploaded successfully.";

/// Presign response with both required fields present.
#[derive(Debug)]
pub(crate) struct Presigned {
    pub(crate) upload_url: String,
    pub(crate) upload_id: String,
    pub(crate) headers: Vec<(String, String)>,
}

impl Presigned {
    pub(crate) fn from_response(resp: PresignResponse) -> Option<Self> {
        let upload_url = resp.upload_url.filter(|u| !u.is_empty())?;
        let upload_id = resp.upload_id.filter(|u| !u.is_empty())?;
        // Content-Type is always the file's own.
        let headers = resp
            .headers
            .into_iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("content-type"))
            .collect();
        Some(Self {
            upload_url,
            upload_id,
            headers,
        })
    }
}

pub(crate) enum Failure {
    Transport(TransportError),
    /// A 2xx answer the protocol cannot use.
    Server(String),
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        Failure::Transport(err)
    }
}

/// POSTs the presign request and checks the answer has both required fields.
pub(crate) async fn presign(
    transport: &dyn HttpTransport,
    url: String,
    headers: &[(String, String)],
    file: &UploadFile,
    cancel: &CancellationToken,
) -> Result<Presigned, Failure> {
    let request = HttpRequest::new(Method::Post, url)
        .headers(headers.iter().cloned())
        .json(&PresignRequest {
            filename: file.name().to_string(),
            mimetype: file.mime_type().to_string(),
            size: file.size(),
        })?;
    let resp = send_cancellable(transport, request, cancel)
        .await?
        .error_for_status()?;
    resp.json::<PresignResponse>()
        .ok()
        .and_then(Presigned::from_response)
        .ok_or_else(|| Failure::Server(PRESIGN_FAILED.into()))
}

/// PUTs the bytes to a presigned URL. Credentials are never attached.
pub(crate) async fn put_object(
    transport: &dyn HttpTransport,
    presigned: &Presigned,
    file: &UploadFile,
    progress: Option<ProgressReporter>,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let put = HttpRequest::new(Method::Put, &presigned.upload_url)
        .headers(presigned.headers.iter().cloned())
        .header("Content-Type", file.mime_type())
        .bytes(file.data.clone(), progress);
    send_cancellable(transport, put, cancel)
        .await?
        .error_for_status()?;
    Ok(())
}

/// Drives one upload through validate → presign → PUT → finalize.
pub struct Uploader<'a> {
    transport: &'a dyn HttpTransport,
    registry: &'a CancellationRegistry,
    urls: &'a UrlResolver,
    validator: &'a Validator,
    notifier: &'a dyn Notifier,
}

impl<'a> Uploader<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        registry: &'a CancellationRegistry,
        urls: &'a UrlResolver,
        validator: &'a Validator,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            transport,
            registry,
            urls,
            validator,
            notifier,
        }
    }

    pub async fn upload(
        &self,
        file: &UploadFile,
        on_progress: Option<ProgressCallback>,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<UploadData>, ClientError> {
        self.upload_with_task(TaskId::new(), file, on_progress, credentials)
            .await
    }

    /// Like [`upload`](Self::upload) with a caller-chosen task id, so the
    /// caller can cancel through the registry.
    ///
    /// Only a 401 from the server, or a task id that is already registered,
    /// is returned as `Err`.
    pub async fn upload_with_task(
        &self,
        task_id: TaskId,
        file: &UploadFile,
        on_progress: Option<ProgressCallback>,
        credentials: Option<&Credentials>,
    ) -> Result<TransferResult<UploadData>, ClientError> {
        if let Err(e) = self.validator.validate(Some(&file.descriptor)) {
            let message = e.to_string();
            debug!(file = %file.name(), reason = %message, "upload rejected");
            self.notifier.error(&message);
            return Ok(TransferResult::rejected(message));
        }

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
        info!(task = %task_id, file = %file.name(), size = file.size(), "upload started");

        let outcome = self
            .run(&mut task, file, on_progress, credentials, &cancel)
            .await;

        match outcome {
            Ok((data, message)) => {
                advance(&mut task, UploadPhase::Completed);
                info!(task = %task_id, stored = %data.file.filename, "upload complete");
                Ok(TransferResult::ok(task_id, message, data))
            }
            Err(Failure::Transport(err)) => {
                if err.status() == Some(401) {
                    advance(&mut task, UploadPhase::Failed);
                    warn!(task = %task_id, "upload unauthorized");
                    return Err(ClientError::Unauthorized);
                }
                let class = classify(&err);
                let message = user_message(&err, Direction::Upload);
                if class.kind == ErrorKind::Canceled {
                    advance(&mut task, UploadPhase::Canceled);
                    info!(task = %task_id, "upload canceled");
                } else {
                    advance(&mut task, UploadPhase::Failed);
                    warn!(task = %task_id, error = %err, kind = %class.kind, "upload failed");
                }
                Ok(TransferResult::failed(Some(task_id), class, message))
            }
            Err(Failure::Server(message)) => {
                advance(&mut task, UploadPhase::Failed);
                warn!(task = %task_id, reason = %message, "upload rejected by server");
                Ok(TransferResult::failed(
                    Some(task_id),
                    ErrorClass::new(ErrorKind::ServerError, false),
                    message,
                ))
            }
        }
    }

    async fn run(
        &self,
        task: &mut TransferTask<UploadPhase>,
        file: &UploadFile,
        on_progress: Option<ProgressCallback>,
        credentials: Option<&Credentials>,
        cancel: &CancellationToken,
    ) -> Result<(UploadData, String), Failure> {
        let headers = auth_headers(credentials);

        advance(task, UploadPhase::Presigning);
        let presigned = presign(
            self.transport,
            self.urls.api_url(PRESIGN_PATH),
            &headers,
            file,
            cancel,
        )
        .await?;
        debug!(task = %task.id(), upload_id = %presigned.upload_id, "presigned");

        advance(task, UploadPhase::Uploading);
        let reporter = on_progress.map(|cb| ProgressReporter::new(task.id(), file.size(), Some(cb)));
        put_object(self.transport, &presigned, file, reporter, cancel).await?;

        advance(task, UploadPhase::Finalizing);
        let finalize = HttpRequest::new(Method::Post, self.urls.api_url(FINALIZE_PATH))
            .headers(headers)
            .form(vec![(UPLOAD_ID_FIELD.to_string(), presigned.upload_id.clone())]);
        let resp = send_cancellable(self.transport, finalize, cancel)
            .await?
            .error_for_status()?;

        let body = resp.json::<FinalizeResponse>().unwrap_or_default();
        if !body.success {
            return Err(Failure::Server(
                body.message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| FINALIZE_FAILED.into()),
            ));
        }
        let mut record = body
            .file
            .filter(|f| !f.filename.is_empty())
            .ok_or_else(|| Failure::Server(FINALIZE_FAILED.into()))?;
        record.url = self.urls.resource_url(&record.filename, Mode::Preview);

        let message = body
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| UPLOADED.into());
        Ok((
            UploadData {
                file: record,
                extra: body.extra,
            },
            message,
        ))
    }
}

fn advance(task: &mut TransferTask<UploadPhase>, next: UploadPhase) {
    if let Err(e) = task.advance(next) {
        warn!(task = %task.id(), error = %e, "ignored phase change");
    }
}
