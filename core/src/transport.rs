//! The transport seam: the contract between `HttpClient` and the library
//! that actually moves bytes.
//!
//! # Design
//! A `Transport` is a factory for handles; a `TransportHandle` is one
//! configurable connection context, shaped after libcurl's easy handle:
//! options are pushed one at a time, `perform` runs a blocking exchange and
//! streams every received header line (status line included) into a
//! `HeaderSink`, and `info` reports what happened. The client never parses
//! wire data itself.

use std::fmt;
use std::time::Duration;

use crate::error::ClientError;
use crate::form::Form;

/// Numeric failure codes reported by transports. The values match libcurl's
/// `CURLcode` so callers familiar with curl can interpret them directly.
pub mod codes {
    pub const UNSUPPORTED_PROTOCOL: u32 = 1;
    pub const URL_MALFORMAT: u32 = 3;
    pub const NOT_BUILT_IN: u32 = 4;
    pub const COULDNT_RESOLVE_HOST: u32 = 6;
    pub const COULDNT_CONNECT: u32 = 7;
    pub const WRITE_ERROR: u32 = 23;
    pub const READ_ERROR: u32 = 26;
    pub const OPERATION_TIMEDOUT: u32 = 28;
    pub const SSL_CONNECT_ERROR: u32 = 35;
    pub const BAD_FUNCTION_ARGUMENT: u32 = 43;
    pub const RECV_ERROR: u32 = 56;
    pub const BAD_CONTENT_ENCODING: u32 = 61;
}

/// HTTP authentication schemes a handle can be asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    GssNegotiate,
    Ntlm,
    /// Let the transport pick any scheme it supports.
    Any,
    /// Any scheme except Basic.
    AnySafe,
}

/// The body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` text.
    UrlEncoded(String),
    /// Serialized JSON text.
    Json(String),
    /// Pre-encoded bytes with an optional content type.
    Raw {
        content_type: Option<String>,
        data: Vec<u8>,
    },
    /// Structured fields including file uploads; the transport builds the
    /// `multipart/form-data` encoding.
    Multipart(Form),
}

/// A single configuration option for a handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOption {
    Method(String),
    Url(String),
    Body(RequestBody),
    /// Complete list of extra header lines (`"Name: value"`), replacing any
    /// previously set list.
    Headers(Vec<String>),
    UserAgent(String),
    Referer(String),
    /// Serialized `Cookie` header value.
    Cookie(String),
    HttpAuth(AuthScheme),
    /// `user:password` credentials.
    UserPwd(String),
    /// Zero waits forever.
    ConnectTimeout(Duration),
    /// Zero waits forever.
    Timeout(Duration),
    VerifyPeer(bool),
    VerifyHost(bool),
    /// Accepted content encodings, e.g. `gzip,deflate`. Responses in an
    /// advertised encoding are decoded. Empty sends no `Accept-Encoding`
    /// and leaves bodies as received.
    Encoding(String),
    Verbose(bool),
    FollowLocation(bool),
    /// Record the outgoing request headers for `TransportInfo`.
    CaptureRequestHeaders(bool),
    /// Prepend the response header block to the returned body.
    IncludeHeadersInBody(bool),
    /// Return the body from `perform` instead of writing it to stdout.
    ReturnTransfer(bool),
}

/// A low-level failure: no usable HTTP exchange took place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub code: u32,
    pub message: String,
}

impl TransportFailure {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error {}: {}", self.code, self.message)
    }
}

/// What a handle reports about its most recent exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportInfo {
    /// Final HTTP status, 0 if no response was received.
    pub status: u16,
    pub effective_url: String,
    /// Raw outgoing request line and headers, CRLF separated. Empty unless
    /// `CaptureRequestHeaders(true)` was set.
    pub request_headers: String,
    /// `Content-Type` of the final response, if it had one.
    pub content_type: Option<String>,
    /// Wall time of the whole exchange, failures included.
    pub total_time: Duration,
}

/// Receives raw response header lines as they arrive.
pub trait HeaderSink {
    /// Called once per line including its terminator. Returns the number of
    /// bytes consumed; anything other than `line.len()` aborts the exchange.
    fn header_line(&mut self, line: &[u8]) -> usize;
}

/// One exclusively owned connection context.
pub trait TransportHandle {
    fn set_option(&mut self, option: TransportOption);

    /// Run one blocking exchange. Returns the body, or the failure when no
    /// usable HTTP response was obtained.
    fn perform(&mut self, headers: &mut dyn HeaderSink) -> Result<Vec<u8>, TransportFailure>;

    fn info(&self) -> TransportInfo;

    /// Release any resources. Must tolerate repeated calls.
    fn close(&mut self);
}

/// A factory for transport handles.
pub trait Transport {
    type Handle: TransportHandle;

    /// Whether this transport can be used in the current build/runtime.
    fn is_available(&self) -> bool {
        true
    }

    fn open(&self) -> Result<Self::Handle, ClientError>;
}
