//! Stateful HTTP client facade over a pluggable transport.
//!
//! # Design
//! `HttpClient` owns exactly one transport handle between `reset()` calls.
//! Persistent request state (extra headers, cookies, auth, timeouts) lives on
//! the handle and survives across requests; per-request state (method, URL,
//! body) is set explicitly by every verb method so nothing leaks from the
//! previous call. Each execution returns a fresh `Response`; network and
//! HTTP-status failures are recorded there and never returned as `Err`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::capture::HeaderCapture;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::form::{encode_pairs, Form};
use crate::response::Response;
use crate::transport::{
    AuthScheme, RequestBody, Transport, TransportHandle, TransportInfo, TransportOption,
};
use crate::ureq_transport::UreqTransport;

/// Timeout in seconds applied by `HttpClient::make`.
const MAKE_TIMEOUT_SECS: u64 = 5;

/// HTTP client with convenience verbs, persistent headers and cookies.
pub struct HttpClient<T: Transport = UreqTransport> {
    transport: T,
    handle: Option<T::Handle>,
    config: ClientConfig,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
}

impl HttpClient<UreqTransport> {
    pub fn new() -> Result<Self, ClientError> {
        Self::with_transport(UreqTransport::new())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_transport_and_config(UreqTransport::new(), config)
    }

    /// A client with 5 second connect and overall timeouts.
    pub fn make() -> Result<Self, ClientError> {
        Self::with_config(ClientConfig {
            connect_timeout_secs: MAKE_TIMEOUT_SECS,
            timeout_secs: MAKE_TIMEOUT_SECS,
            ..ClientConfig::default()
        })
    }
}

impl<T: Transport> HttpClient<T> {
    pub fn with_transport(transport: T) -> Result<Self, ClientError> {
        Self::with_transport_and_config(transport, ClientConfig::default())
    }

    pub fn with_transport_and_config(transport: T, config: ClientConfig) -> Result<Self, ClientError> {
        if !transport.is_available() {
            return Err(ClientError::Unavailable(format!(
                "{} cannot be used in this build",
                std::any::type_name::<T>()
            )));
        }
        let mut client = Self {
            transport,
            handle: None,
            config,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        };
        client.init()?;
        Ok(client)
    }

    /// Open a handle and apply the baseline configuration.
    fn init(&mut self) -> Result<(), ClientError> {
        let mut handle = self.transport.open()?;
        let config = &self.config;
        for option in [
            TransportOption::UserAgent(config.user_agent.clone()),
            TransportOption::CaptureRequestHeaders(true),
            TransportOption::IncludeHeadersInBody(false),
            TransportOption::ReturnTransfer(true),
            TransportOption::ConnectTimeout(config.connect_timeout()),
            TransportOption::Timeout(config.timeout()),
            TransportOption::VerifyPeer(config.verify_peer),
            TransportOption::VerifyHost(config.verify_host),
            TransportOption::Encoding(config.encoding.clone()),
            TransportOption::Verbose(config.verbose),
            TransportOption::FollowLocation(config.follow_location),
        ] {
            handle.set_option(option);
        }
        self.handle = Some(handle);
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Extra request headers by name, each holding its full `Name: value` line.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Run the request currently configured on the handle.
    pub fn execute(&mut self) -> Result<Response, ClientError> {
        let handle = self.handle.as_mut().ok_or(ClientError::Closed)?;
        let mut capture = HeaderCapture::new();
        let started = Instant::now();
        let outcome = handle.perform(&mut capture);
        let info = handle.info();

        let response = Response::from_exchange(
            outcome,
            info.status,
            capture.into_lines(),
            &info.request_headers,
            info.effective_url,
        );
        debug!(
            url = response.effective_url(),
            status = response.status(),
            error_code = response.error_code(),
            elapsed_ms = millis(started.elapsed());
            "request finished"
        );
        if let Some(failure) = response.transport_error() {
            debug!(code = failure.code; "transport failure: {}", failure.message);
        }
        Ok(response)
    }

    fn dispatch(&mut self, method: &str, url: String, body: RequestBody) -> Result<Response, ClientError> {
        let handle = self.handle.as_mut().ok_or(ClientError::Closed)?;
        debug!(method = method, url = url.as_str(); "dispatching request");
        handle.set_option(TransportOption::Method(method.to_string()));
        handle.set_option(TransportOption::Url(url));
        handle.set_option(TransportOption::Body(body));
        self.execute()
    }

    /// GET, with `data` appended as a query string when non-empty.
    pub fn get(&mut self, url: &str, data: &Form) -> Result<Response, ClientError> {
        let url = if data.is_empty() {
            url.to_string()
        } else {
            append_query(url, &data.to_query())
        };
        self.dispatch("GET", url, RequestBody::Empty)
    }

    /// PURGE, typically sent to a caching reverse proxy. A given `host` is
    /// stored as a persistent `Host` header.
    pub fn purge(&mut self, url: &str, host: Option<&str>) -> Result<Response, ClientError> {
        if let Some(host) = host.filter(|host| !host.is_empty()) {
            self.set_header("Host", host);
        }
        self.dispatch("PURGE", url.to_string(), RequestBody::Empty)
    }

    /// POST `data` as a URL-encoded (or multipart) payload, or as JSON.
    pub fn post(&mut self, url: &str, data: &Form, as_json: bool) -> Result<Response, ClientError> {
        let body = if as_json {
            json_body(data)?
        } else {
            payload_body(data)
        };
        self.dispatch("POST", url.to_string(), body)
    }

    /// POST pre-encoded bytes.
    pub fn post_raw(
        &mut self,
        url: &str,
        data: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<Response, ClientError> {
        let body = RequestBody::Raw {
            content_type: content_type.map(str::to_string),
            data: data.into(),
        };
        self.dispatch("POST", url.to_string(), body)
    }

    /// PUT. Non-empty `data` goes in the body when `payload` is set,
    /// otherwise into the query string.
    pub fn put(&mut self, url: &str, data: &Form, payload: bool, as_json: bool) -> Result<Response, ClientError> {
        let (url, body) = shape_request(url, data, payload, as_json)?;
        self.dispatch("PUT", url, body)
    }

    /// PATCH, shaped like `put`.
    pub fn patch(&mut self, url: &str, data: &Form, payload: bool, as_json: bool) -> Result<Response, ClientError> {
        let (url, body) = shape_request(url, data, payload, as_json)?;
        self.dispatch("PATCH", url, body)
    }

    /// DELETE, shaped like `put` without the JSON option.
    pub fn delete(&mut self, url: &str, data: &Form, payload: bool) -> Result<Response, ClientError> {
        let (url, body) = shape_request(url, data, payload, false)?;
        self.dispatch("DELETE", url, body)
    }

    /// Pass an option straight to the transport handle.
    pub fn set_opt(&mut self, option: TransportOption) -> &mut Self {
        match self.handle.as_mut() {
            Some(handle) => handle.set_option(option),
            None => warn!("option ignored on closed client: {option:?}"),
        }
        self
    }

    /// What the handle reports about the last exchange.
    pub fn info(&self) -> Option<TransportInfo> {
        self.handle.as_ref().map(|handle| handle.info())
    }

    /// Effective URL of the last exchange.
    pub fn endpoint(&self) -> Option<String> {
        self.info().map(|info| info.effective_url)
    }

    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.insert(key.to_string(), format!("{key}: {value}"));
        let lines = self.headers.values().cloned().collect();
        self.set_opt(TransportOption::Headers(lines))
    }

    pub fn set_cookie(&mut self, key: &str, value: &str) -> &mut Self {
        self.cookies.insert(key.to_string(), value.to_string());
        let cookie = encode_pairs(&self.cookies, "; ");
        self.set_opt(TransportOption::Cookie(cookie))
    }

    pub fn set_user_agent(&mut self, user_agent: &str) -> &mut Self {
        self.set_opt(TransportOption::UserAgent(user_agent.to_string()))
    }

    pub fn set_referer(&mut self, referer: &str) -> &mut Self {
        self.set_opt(TransportOption::Referer(referer.to_string()))
    }

    pub fn set_http_auth(&mut self, scheme: AuthScheme) -> &mut Self {
        self.set_opt(TransportOption::HttpAuth(scheme))
    }

    pub fn set_basic_authentication(&mut self, username: &str, password: &str) -> &mut Self {
        self.set_http_auth(AuthScheme::Basic);
        self.set_opt(TransportOption::UserPwd(format!("{username}:{password}")))
    }

    /// Connect and overall timeouts in seconds; zero waits forever.
    pub fn set_timeout(&mut self, connect_timeout: u64, timeout: u64) -> &mut Self {
        self.set_opt(TransportOption::ConnectTimeout(Duration::from_secs(connect_timeout)));
        self.set_opt(TransportOption::Timeout(Duration::from_secs(timeout)))
    }

    pub fn set_ssl_verify(&mut self, verify_peer: bool, verify_host: bool) -> &mut Self {
        self.set_opt(TransportOption::VerifyPeer(verify_peer));
        self.set_opt(TransportOption::VerifyHost(verify_host))
    }

    /// Accepted content encodings, e.g. `gzip,deflate`.
    pub fn set_encoding(&mut self, encoding: &str) -> &mut Self {
        self.set_opt(TransportOption::Encoding(encoding.to_string()))
    }

    pub fn set_verbose(&mut self, on: bool) -> &mut Self {
        self.set_opt(TransportOption::Verbose(on))
    }

    pub fn set_follow_location(&mut self, on: bool) -> &mut Self {
        self.set_opt(TransportOption::FollowLocation(on))
    }

    /// Drop the handle, headers and cookies and start over with a fresh,
    /// freshly configured handle.
    pub fn reset(&mut self) -> Result<&mut Self, ClientError> {
        self.close();
        self.headers.clear();
        self.cookies.clear();
        self.init()?;
        Ok(self)
    }

    /// Release the transport handle. Safe to call repeatedly.
    pub fn close(&mut self) -> &mut Self {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self
    }
}

impl<T: Transport> Drop for HttpClient<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

fn json_body(data: &Form) -> Result<RequestBody, ClientError> {
    let json = serde_json::to_string(&data.to_json()?)?;
    Ok(RequestBody::Json(json))
}

/// File uploads pass through unencoded so the transport can build a
/// multipart body.
fn payload_body(data: &Form) -> RequestBody {
    if data.has_file() {
        RequestBody::Multipart(data.clone())
    } else {
        RequestBody::UrlEncoded(data.to_query())
    }
}

/// URL and body for PUT, PATCH and DELETE. Empty data leaves both untouched.
fn shape_request(url: &str, data: &Form, payload: bool, as_json: bool) -> Result<(String, RequestBody), ClientError> {
    if data.is_empty() {
        return Ok((url.to_string(), RequestBody::Empty));
    }
    if !payload {
        return Ok((append_query(url, &data.to_query()), RequestBody::Empty));
    }
    let body = if as_json {
        json_body(data)?
    } else {
        payload_body(data)
    };
    Ok((url.to_string(), body))
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
