//! Stateful HTTP client facade over a pluggable blocking transport.
//!
//! # Overview
//! `HttpClient` offers convenience verbs (GET/POST/PUT/PATCH/DELETE/PURGE),
//! persistent headers and cookies, authentication helpers and structured
//! access to each response's status, headers and unified error.
//!
//! # Design
//! - The network work is delegated to a `Transport`; the default is
//!   `UreqTransport`. Tests swap in scripted transports.
//! - Each execution returns an immutable `Response`. Transport failures and
//!   HTTP error statuses are recorded on it, never returned as `Err`.
//! - `Err(ClientError)` is reserved for misuse and encoding failures.
//! - Response header lines pass through `HeaderCapture`, which drops the
//!   header block of an interim `100 Continue` response.

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod response;
pub mod transport;
pub mod ureq_transport;

pub use capture::{CaptureState, HeaderCapture};
pub use client::HttpClient;
pub use config::{ClientConfig, DEFAULT_USER_AGENT};
pub use error::ClientError;
pub use form::{Form, FormValue, UploadFile};
pub use response::{RequestError, Response, StatusClass};
pub use transport::{
    codes, AuthScheme, HeaderSink, RequestBody, Transport, TransportFailure, TransportHandle,
    TransportInfo, TransportOption,
};
pub use ureq_transport::{UreqHandle, UreqTransport};
