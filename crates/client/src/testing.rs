//! Scripted transport and save target shared by the orchestrator tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use crate::download::{Blob, SaveTarget};
use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody};
use filerelay_transfer::TransferError;

pub(crate) enum Reply {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Never completes; only cancellation or a timeout ends the call.
    Hang,
}

pub(crate) fn json(status: u16, body: &str) -> Reply {
    Reply::Respond(
        HttpResponse::new(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string()),
    )
}

pub(crate) fn status(code: u16) -> Reply {
    Reply::Respond(HttpResponse::new(code))
}

struct Route {
    method: Method,
    suffix: String,
    replies: VecDeque<Reply>,
}

/// Answers requests from per-route reply queues and records every request.
///
/// Routes match on method and URL suffix; the first route with a queued
/// reply wins. Unmatched requests get a 599.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, method: Method, suffix: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().push(Route {
            method,
            suffix: suffix.to_string(),
            replies: VecDeque::from([reply]),
        });
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }

    /// Waits until a matching request has been sent.
    pub(crate) async fn wait_for(&self, method: Method, suffix: &str) {
        while self.count(method, suffix) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn next_reply(&self, request: &HttpRequest) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap();
        routes
            .iter_mut()
            .find(|r| {
                r.method == request.method
                    && request.url.ends_with(&r.suffix)
                    && !r.replies.is_empty()
            })
            .and_then(|r| r.replies.pop_front())
    }
}

impl HttpTransport for MockTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        if let RequestBody::Bytes {
            data,
            progress: Some(progress),
        } = &request.body
        {
            let half = data.len() as u64 / 2;
            progress.advance(half);
            progress.advance(data.len() as u64 - half);
        }
        let reply = self.next_reply(&request);
        self.requests.lock().unwrap().push(request);

        Box::pin(async move {
            match reply {
                Some(Reply::Respond(resp)) => Ok(resp),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                None => Ok(HttpResponse::new(599)),
            }
        })
    }
}

/// Keeps saved files in memory.
#[derive(Default)]
pub(crate) struct MemorySaveTarget {
    pub(crate) saved: Mutex<Vec<(String, Blob)>>,
}

impl SaveTarget for MemorySaveTarget {
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        blob: &'a Blob,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(async move {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), blob.clone()));
            Ok(format!("memory://{file_name}"))
        })
    }
}

/// Always fails with a permission error.
pub(crate) struct FailingSaveTarget;

impl SaveTarget for FailingSaveTarget {
    fn save<'a>(
        &'a self,
        _file_name: &'a str,
        _blob: &'a Blob,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(async {
            Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        })
    }
}
