//! HTTP transport seam.
//!
//! The orchestrators talk to the network only through [`HttpTransport`].
//! [`ReqwestTransport`](crate::http::ReqwestTransport) is the production
//! implementation; tests substitute scripted mocks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use filerelay_protocol::Credentials;
use filerelay_protocol::constants::{ACCEPT_VALUE, AUTH_TOKEN_HEADER, SESSION_ID_HEADER};
use filerelay_protocol::messages::ApiMessage;
use filerelay_transfer::ProgressReporter;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON, sent with `Content-Type: application/json`.
    Json(Vec<u8>),
    /// `multipart/form-data` text fields.
    Form(Vec<(String, String)>),
    /// Raw bytes; the reporter is advanced as the body is written.
    Bytes {
        data: Bytes,
        progress: Option<ProgressReporter>,
    },
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, TransportError> {
        let body =
            serde_json::to_vec(value).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.body = RequestBody::Json(body);
        Ok(self)
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn bytes(mut self, data: Bytes, progress: Option<ProgressReporter>) -> Self {
        self.body = RequestBody::Bytes { data, progress };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response with any status; the body is fully buffered.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Turns a non-2xx response into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(TransportError::Status {
            status: self.status,
            message: ApiMessage::message_from(&self.body),
        })
    }
}

/// Sends HTTP requests.
///
/// Implementations return a response for every status the server sends
/// and fail only when no response was obtained. Dropping the returned
/// future must abort the request.
pub trait HttpTransport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

/// Headers attached to every origin request.
///
/// Credentials are included only when both parts are present.
pub fn auth_headers(credentials: Option<&Credentials>) -> Vec<(String, String)> {
    let mut headers = vec![("Accept".to_string(), ACCEPT_VALUE.to_string())];
    if let Some(c) = credentials.filter(|c| c.is_complete()) {
        headers.push((AUTH_TOKEN_HEADER.to_string(), c.token.clone()));
        headers.push((SESSION_ID_HEADER.to_string(), c.session_id.clone()));
    }
    headers
}

/// Sends `request`, abandoning it as soon as `cancel` fires.
///
/// Dropping the in-flight future aborts the underlying request.
pub(crate) async fn send_cancellable(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    cancel: &CancellationToken,
) -> Result<HttpResponse, TransportError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Canceled),
        result = transport.send(request) => result,
    }
}
