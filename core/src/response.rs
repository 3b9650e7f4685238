//! The outcome of one request execution.
//!
//! # Design
//! Every execution produces a fresh, immutable `Response`. Transport
//! failures and HTTP error statuses are recorded here rather than returned
//! as `Err`, and the "combined" accessors merge both into a single
//! code/message pair: the transport failure wins when present, otherwise an
//! HTTP status in `[400, 600)` reports its status line.

use std::collections::HashMap;
use std::fmt;

use crate::transport::TransportFailure;

/// The standard ranges partitioning status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Below 100, including 0 when no response was received.
    Unknown,
    Informational,
    Success,
    Redirect,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Unknown,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, StatusClass::ClientError | StatusClass::ServerError)
    }
}

/// The unified failure of an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    Transport(TransportFailure),
    /// A complete exchange whose status is in `[400, 600)`. `status_line` is
    /// the first captured response header line.
    Http { status: u16, status_line: String },
}

impl RequestError {
    pub fn code(&self) -> u32 {
        match self {
            RequestError::Transport(failure) => failure.code,
            RequestError::Http { status, .. } => u32::from(*status),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RequestError::Transport(failure) => &failure.message,
            RequestError::Http { status_line, .. } => status_line,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(failure) => write!(f, "{failure}"),
            RequestError::Http { status, status_line } => {
                write!(f, "HTTP {status}: {status_line}")
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// Results of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) transport_error: Option<TransportFailure>,
    pub(crate) status: u16,
    pub(crate) header_lines: Vec<String>,
    pub(crate) request_headers: Vec<String>,
    pub(crate) effective_url: String,
}

impl Response {
    /// Derive a response from the raw pieces of one exchange.
    ///
    /// `raw_request_headers` is the transport's CRLF-separated outgoing
    /// header text; empty segments are dropped.
    pub fn from_exchange(
        body: Result<Vec<u8>, TransportFailure>,
        status: u16,
        header_lines: Vec<String>,
        raw_request_headers: &str,
        effective_url: String,
    ) -> Self {
        let (body, transport_error) = match body {
            Ok(body) => (Some(body), None),
            Err(failure) => (None, Some(failure)),
        };
        let transport_error = transport_error.filter(|failure| failure.code != 0);
        let request_headers = raw_request_headers
            .split("\r\n")
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            body,
            transport_error,
            status,
            header_lines,
            request_headers,
            effective_url,
        }
    }

    /// The body, or `None` when the transport failed before producing one.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The body decoded as UTF-8 (lossy); empty when there is none.
    pub fn text(&self) -> String {
        self.body
            .as_deref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default()
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body.as_deref().unwrap_or_default())
    }

    /// HTTP status code, 0 if no response was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }

    pub fn transport_error(&self) -> Option<&TransportFailure> {
        self.transport_error.as_ref()
    }

    pub fn transport_error_code(&self) -> u32 {
        self.transport_error.as_ref().map_or(0, |failure| failure.code)
    }

    pub fn transport_error_message(&self) -> Option<&str> {
        self.transport_error
            .as_ref()
            .map(|failure| failure.message.as_str())
    }

    pub fn is_transport_error(&self) -> bool {
        self.transport_error.is_some()
    }

    /// Status in `[400, 600)`.
    pub fn is_http_error(&self) -> bool {
        self.status_class().is_error()
    }

    /// Either a transport failure or an HTTP error status.
    pub fn is_error(&self) -> bool {
        self.is_transport_error() || self.is_http_error()
    }

    pub fn is_info(&self) -> bool {
        self.status_class() == StatusClass::Informational
    }

    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    pub fn is_redirect(&self) -> bool {
        self.status_class() == StatusClass::Redirect
    }

    pub fn is_client_error(&self) -> bool {
        self.status_class() == StatusClass::ClientError
    }

    pub fn is_server_error(&self) -> bool {
        self.status_class() == StatusClass::ServerError
    }

    /// Transport code if the transport failed, else the HTTP status if it is
    /// an error status, else 0.
    pub fn error_code(&self) -> u32 {
        self.error().map_or(0, |err| err.code())
    }

    /// The response status line when the execution failed, else empty.
    pub fn http_error_message(&self) -> &str {
        if !self.is_error() {
            return "";
        }
        self.header_lines.first().map_or("", String::as_str)
    }

    /// Transport message if the transport failed, else `http_error_message`.
    pub fn error_message(&self) -> &str {
        match &self.transport_error {
            Some(failure) => &failure.message,
            None => self.http_error_message(),
        }
    }

    pub fn error(&self) -> Option<RequestError> {
        if let Some(failure) = &self.transport_error {
            return Some(RequestError::Transport(failure.clone()));
        }
        if self.is_http_error() {
            return Some(RequestError::Http {
                status: self.status,
                status_line: self.http_error_message().to_string(),
            });
        }
        None
    }

    /// Raw header lines of the final response block, status line first.
    pub fn header_lines(&self) -> &[String] {
        &self.header_lines
    }

    /// Outgoing request line and headers as sent.
    pub fn request_headers(&self) -> &[String] {
        &self.request_headers
    }

    pub fn effective_url(&self) -> &str {
        &self.effective_url
    }

    /// All headers keyed by lower-cased name. Each line is split on its first
    /// colon; the status line ends up under its own (value-less) key. Later
    /// duplicates overwrite earlier ones.
    pub fn headers(&self) -> HashMap<String, String> {
        self.header_lines
            .iter()
            .map(|line| {
                let (name, value) = line.split_once(':').unwrap_or((line.as_str(), ""));
                (name.trim().to_lowercase(), value.trim().to_string())
            })
            .collect()
    }

    /// Case-insensitive single header lookup.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers().remove(&name.to_lowercase())
    }
}
