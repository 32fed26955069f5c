//! Talking to the backend.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use hyper::{Body, Client, Request, StatusCode, Uri};
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, CACHE_CONTROL};
use serde::de::DeserializeOwned;
use crate::sse;


//------------ ApiClient -----------------------------------------------------

/// An HTTP client for the backend.
///
/// All requests are made relative to a base URI.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client<HttpConnector>,
    base: String,
}

impl ApiClient {
    pub fn new(base: &Uri) -> Self {
        ApiClient {
            client: Client::new(),
            base: base.to_string().trim_end_matches('/').into(),
        }
    }

    /// Returns the URI for the given path.
    pub fn uri(&self, path: &str) -> Result<Uri, FetchError> {
        format!("{}{}", self.base, path).parse().map_err(|_| {
            FetchError::InvalidUri(path.into())
        })
    }

    /// Fetches a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self, path: &str
    ) -> Result<T, FetchError> {
        let request = Request::get(self.uri(path)?)
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;
        let response = self.client.request(request).await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()))
        }
        let body = hyper::body::to_bytes(response.into_body()).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Opens an event stream.
    pub async fn open_stream(
        &self, path: &str
    ) -> Result<EventStream, FetchError> {
        let request = Request::get(self.uri(path)?)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::empty())?;
        let response = self.client.request(request).await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()))
        }
        Ok(EventStream::new(response.into_body()))
    }
}


//------------ EventStream ---------------------------------------------------

/// An open event stream.
pub struct EventStream {
    body: Body,
    decoder: sse::Decoder,
    pending: VecDeque<sse::Event>,
}

impl EventStream {
    fn new(body: Body) -> Self {
        EventStream {
            body,
            decoder: sse::Decoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the server has closed the stream.
    pub async fn next_event(
        &mut self
    ) -> Result<Option<sse::Event>, FetchError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event))
            }
            match self.body.data().await {
                Some(chunk) => {
                    self.pending.extend(self.decoder.feed(&chunk?));
                }
                None => {
                    self.decoder.finish();
                    return Ok(None)
                }
            }
        }
    }

    /// Returns the reconnection delay requested by the server.
    pub fn retry(&self) -> Option<Duration> {
        self.decoder.retry()
    }
}


//------------ FetchError ----------------------------------------------------

/// Talking to the backend has failed.
#[derive(Debug)]
pub enum FetchError {
    InvalidUri(String),
    Request(hyper::http::Error),
    Http(hyper::Error),
    Status(StatusCode),
    Json(serde_json::Error),
}

impl From<hyper::http::Error> for FetchError {
    fn from(err: hyper::http::Error) -> Self {
        FetchError::Request(err)
    }
}

impl From<hyper::Error> for FetchError {
    fn from(err: hyper::Error) -> Self {
        FetchError::Http(err)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Json(err)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FetchError::InvalidUri(ref path) => {
                write!(f, "invalid URI for path '{}'", path)
            }
            FetchError::Request(ref err) => {
                write!(f, "failed to build request: {}", err)
            }
            FetchError::Http(ref err) => write!(f, "{}", err),
            FetchError::Status(status) => {
                write!(f, "server responded with {}", status)
            }
            FetchError::Json(ref err) => {
                write!(f, "malformed response: {}", err)
            }
        }
    }
}

impl std::error::Error for FetchError { }


//============ Tests =========================================================
