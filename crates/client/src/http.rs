//! `reqwest`-backed transport.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use filerelay_transfer::ProgressReporter;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

use crate::error::{ClientError, TransportError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody};

/// Size of the slices a byte body is streamed in; one progress tick each.
const PROGRESS_CHUNK: usize = 64 * 1024;

/// Production [`HttpTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Wraps an already configured client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.header(CONTENT_TYPE, "application/json").body(body),
            RequestBody::Form(fields) => {
                let form = fields
                    .into_iter()
                    .fold(reqwest::multipart::Form::new(), |form, (k, v)| form.text(k, v));
                builder.multipart(form)
            }
            RequestBody::Bytes { data, progress } => builder
                .header(CONTENT_LENGTH, data.len() as u64)
                .body(progress_body(data, progress)),
        };

        let resp = builder.send().await.map_err(map_error)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp.bytes().await.map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}

/// Streams `data` in fixed slices, advancing `progress` as each is handed
/// to the connection.
fn progress_body(data: Bytes, progress: Option<ProgressReporter>) -> reqwest::Body {
    let Some(reporter) = progress else {
        return reqwest::Body::from(data);
    };

    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(PROGRESS_CHUNK)
        .map(|start| data.slice(start..(start + PROGRESS_CHUNK).min(data.len())))
        .collect();
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        reporter.advance(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}
