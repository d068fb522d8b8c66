//! HTTP input/output adapters.
//!
//! The listener hands each HTTP activation a raw [`HttpRequest`] and an
//! [`HttpResponder`] (the sending half of the response channel). The
//! adapters wrap those handles for handler code and are reset in place
//! when the owning execution context is recycled.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("no HTTP response is bound")]
    NotBound,
    #[error("response already ended")]
    AlreadyEnded,
}

/// Raw inbound request handle.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Builder helper, mostly for tests. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A finished response, as delivered through the responder channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for HttpReply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Raw response handle: completing it delivers the reply to the listener.
#[derive(Debug)]
pub struct HttpResponder {
    tx: oneshot::Sender<HttpReply>,
}

impl HttpResponder {
    pub fn channel() -> (Self, oneshot::Receiver<HttpReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    fn complete(self, reply: HttpReply) {
        if self.tx.send(reply).is_err() {
            debug!("HTTP client went away before the response was ready");
        }
    }
}

/// Read-side adapter over the current request.
#[derive(Debug, Default)]
pub struct HttpInput {
    request: Option<HttpRequest>,
}

impl HttpInput {
    pub fn set(&mut self, request: HttpRequest) {
        self.request = Some(request);
    }

    pub fn reset(&mut self) {
        self.request = None;
    }

    pub fn is_set(&self) -> bool {
        self.request.is_some()
    }

    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    pub fn method(&self) -> Option<&Method> {
        self.request.as_ref().map(|r| &r.method)
    }

    pub fn path(&self) -> &str {
        self.request.as_ref().map_or("", |r| r.uri.path())
    }

    /// Header value as text; names match case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .as_ref()?
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    /// Raw query parameter value (no percent-decoding).
    pub fn query(&self, key: &str) -> Option<&str> {
        let query = self.request.as_ref()?.uri.query()?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    pub fn body(&self) -> &[u8] {
        self.request
            .as_ref()
            .map(|r| &r.body[..])
            .unwrap_or_default()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body())
    }
}

/// Write-side adapter over the current response handle.
#[derive(Debug)]
pub struct HttpOutput {
    status: StatusCode,
    headers: HeaderMap,
    responder: Option<HttpResponder>,
    ended: bool,
}

impl Default for HttpOutput {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            responder: None,
            ended: false,
        }
    }
}

impl HttpOutput {
    pub fn set(&mut self, responder: HttpResponder) {
        self.reset();
        self.responder = Some(responder);
    }

    /// Return to the empty state, keeping the header map's allocation.
    /// A responder that was never ended is dropped, which the listener
    /// reports to the client as a server error.
    pub fn reset(&mut self) {
        if self.responder.take().is_some() {
            warn!("HTTP response dropped without being ended");
        }
        self.status = StatusCode::OK;
        self.headers.clear();
        self.ended = false;
    }

    pub fn is_bound(&self) -> bool {
        self.responder.is_some()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
        self.headers.insert(header, value);
        Ok(())
    }

    /// Send the response with `body`. Only the first call delivers.
    pub fn end(&mut self, body: impl Into<Bytes>) -> Result<(), HttpError> {
        if self.ended {
            warn!("HTTP response ended twice, second body ignored");
            return Err(HttpError::AlreadyEnded);
        }
        let responder = self.responder.take().ok_or(HttpError::NotBound)?;
        self.ended = true;
        responder.complete(HttpReply {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: body.into(),
        });
        Ok(())
    }
}
