//! Ureq-based transport (blocking).
//!
//! Translates handle options into a `ureq::Agent` configuration plus an
//! `http::Request`, and replays the received response head into the
//! `HeaderSink` line by line so the client sees it the way a raw HTTP/1.1
//! stream would present it. Ureq errors are mapped onto the numeric codes in
//! `transport::codes`.

use std::io::{self, Read as _, Write as _};
use std::time::{Duration, Instant};

use base64ct::{Base64, Encoding as _};
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use log::{debug, warn};
use serde_json::Value;
use ureq::config::AutoHeaderValue;
use ureq::http::{self, header, Method, Uri};
use ureq::tls::TlsConfig;
use ureq::ResponseExt as _;
use uuid::Uuid;

use crate::error::ClientError;
use crate::form::{Form, FormValue};
use crate::transport::{
    codes, AuthScheme, HeaderSink, RequestBody, Transport, TransportFailure, TransportHandle,
    TransportInfo, TransportOption,
};

const WIRE_TARGET: &str = "http_facade::wire";
const MAX_REDIRECTS: u32 = 10;

/// A [`Transport`] that opens [`UreqHandle`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for UreqTransport {
    type Handle = UreqHandle;

    fn open(&self) -> Result<UreqHandle, ClientError> {
        Ok(UreqHandle::default())
    }
}

/// Option state accumulated on a handle. Defaults follow libcurl's.
#[derive(Debug, Clone)]
struct Settings {
    method: String,
    url: String,
    body: RequestBody,
    headers: Vec<String>,
    user_agent: Option<String>,
    referer: Option<String>,
    cookie: Option<String>,
    auth: Option<AuthScheme>,
    credentials: Option<String>,
    connect_timeout: Duration,
    timeout: Duration,
    verify_peer: bool,
    verify_host: bool,
    encoding: Option<String>,
    verbose: bool,
    follow_location: bool,
    capture_request_headers: bool,
    include_headers_in_body: bool,
    return_transfer: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            body: RequestBody::Empty,
            headers: Vec::new(),
            user_agent: None,
            referer: None,
            cookie: None,
            auth: None,
            credentials: None,
            connect_timeout: Duration::ZERO,
            timeout: Duration::ZERO,
            verify_peer: true,
            verify_host: true,
            encoding: None,
            verbose: false,
            follow_location: false,
            capture_request_headers: false,
            include_headers_in_body: false,
            return_transfer: false,
        }
    }
}

impl Settings {
    /// Bodies are decoded only for encodings the request advertised.
    fn decodes_content(&self) -> bool {
        self.encoding.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// A handle backed by a lazily built `ureq::Agent`. The agent is rebuilt
/// after any option that changes connection behaviour.
#[derive(Debug, Default)]
pub struct UreqHandle {
    settings: Settings,
    agent: Option<ureq::Agent>,
    last: TransportInfo,
}

impl TransportHandle for UreqHandle {
    fn set_option(&mut self, option: TransportOption) {
        let settings = &mut self.settings;
        match option {
            TransportOption::Method(method) => settings.method = method,
            TransportOption::Url(url) => settings.url = url,
            TransportOption::Body(body) => settings.body = body,
            TransportOption::Headers(headers) => settings.headers = headers,
            TransportOption::UserAgent(user_agent) => settings.user_agent = Some(user_agent),
            TransportOption::Referer(referer) => settings.referer = Some(referer),
            TransportOption::Cookie(cookie) => settings.cookie = Some(cookie),
            TransportOption::HttpAuth(scheme) => settings.auth = Some(scheme),
            TransportOption::UserPwd(credentials) => settings.credentials = Some(credentials),
            TransportOption::Encoding(encoding) => settings.encoding = Some(encoding),
            TransportOption::Verbose(on) => settings.verbose = on,
            TransportOption::CaptureRequestHeaders(on) => settings.capture_request_headers = on,
            TransportOption::IncludeHeadersInBody(on) => settings.include_headers_in_body = on,
            TransportOption::ReturnTransfer(on) => settings.return_transfer = on,
            TransportOption::ConnectTimeout(timeout) => {
                settings.connect_timeout = timeout;
                self.agent = None;
            }
            TransportOption::Timeout(timeout) => {
                settings.timeout = timeout;
                self.agent = None;
            }
            TransportOption::VerifyPeer(on) => {
                settings.verify_peer = on;
                self.agent = None;
            }
            TransportOption::VerifyHost(on) => {
                settings.verify_host = on;
                self.agent = None;
            }
            TransportOption::FollowLocation(on) => {
                settings.follow_location = on;
                self.agent = None;
            }
        }
    }

    fn perform(&mut self, sink: &mut dyn HeaderSink) -> Result<Vec<u8>, TransportFailure> {
        self.last = TransportInfo {
            effective_url: self.settings.url.clone(),
            ..TransportInfo::default()
        };
        let started = Instant::now();
        let outcome = self.exchange(sink);
        self.last.total_time = started.elapsed();
        outcome
    }

    fn info(&self) -> TransportInfo {
        self.last.clone()
    }

    fn close(&mut self) {
        self.agent = None;
    }
}

impl UreqHandle {
    fn exchange(&mut self, sink: &mut dyn HeaderSink) -> Result<Vec<u8>, TransportFailure> {
        let uri = parse_uri(&self.settings.url)?;
        let method = Method::from_bytes(self.settings.method.as_bytes()).map_err(|e| {
            TransportFailure::new(codes::BAD_FUNCTION_ARGUMENT, format!("invalid method: {e}"))
        })?;
        let mut headers = outgoing_headers(&self.settings)?;
        let payload = encode_body(&self.settings.body)?;
        if let Some((content_type, data)) = &payload {
            if find_header(&headers, "content-type").is_none() {
                headers.push(("Content-Type".to_string(), content_type.clone()));
            }
            if find_header(&headers, "content-length").is_none() {
                headers.push(("Content-Length".to_string(), data.len().to_string()));
            }
        }

        if self.settings.capture_request_headers {
            self.last.request_headers = request_head(&method, &uri, &headers);
        }
        if self.settings.verbose {
            for line in request_head(&method, &uri, &headers).split("\r\n").filter(|l| !l.is_empty()) {
                debug!(target: WIRE_TARGET, "> {line}");
            }
        }

        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let settings = &self.settings;
        let agent = self.agent.get_or_insert_with(|| build_agent(settings));
        let result = match payload {
            Some((_, data)) => builder.body(data).map(|request| agent.run(request)),
            None => builder.body(()).map(|request| agent.run(request)),
        }
        .map_err(|e| {
            TransportFailure::new(codes::BAD_FUNCTION_ARGUMENT, format!("invalid request: {e}"))
        })?;
        let response = result.map_err(map_ureq_error)?;

        self.last.effective_url = response.get_uri().to_string();
        let (parts, body) = response.into_parts();
        self.last.status = parts.status.as_u16();
        self.last.content_type = header_value(&parts.headers, header::CONTENT_TYPE);

        let head = response_head(&parts);
        for line in &head {
            if self.settings.verbose {
                debug!(target: WIRE_TARGET, "< {}", line.trim_end());
            }
            if sink.header_line(line.as_bytes()) != line.len() {
                return Err(TransportFailure::new(
                    codes::WRITE_ERROR,
                    "Failed writing header",
                ));
            }
        }

        let mut raw = Vec::new();
        body.into_reader().read_to_end(&mut raw).map_err(|e| {
            TransportFailure::new(
                codes::RECV_ERROR,
                format!("Failure when receiving data from the peer: {e}"),
            )
        })?;
        let decoded = if self.settings.decodes_content() {
            let encoding = header_value(&parts.headers, header::CONTENT_ENCODING);
            decode_content(encoding.as_deref(), raw)?
        } else {
            raw
        };

        let mut data = Vec::new();
        if self.settings.include_headers_in_body {
            data.extend(head.concat().into_bytes());
        }
        data.extend(decoded);

        if self.settings.return_transfer {
            Ok(data)
        } else {
            io::stdout()
                .write_all(&data)
                .map_err(|e| TransportFailure::new(codes::WRITE_ERROR, e.to_string()))?;
            Ok(Vec::new())
        }
    }
}

fn build_agent(settings: &Settings) -> ureq::Agent {
    ureq::Agent::config_builder()
        // Status codes are classified by the client, not treated as errors.
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        // Every outgoing header comes from `outgoing_headers`.
        .user_agent(AutoHeaderValue::None)
        .accept(AutoHeaderValue::None)
        .accept_encoding(AutoHeaderValue::None)
        .timeout_connect(non_zero(settings.connect_timeout))
        .timeout_global(non_zero(settings.timeout))
        .max_redirects(if settings.follow_location { MAX_REDIRECTS } else { 0 })
        .tls_config(tls_config(settings))
        .build()
        .new_agent()
}

/// Certificate checks stay on while peer verification is requested. Ureq
/// cannot skip only the hostname check, so `verify_host = false` on its own
/// is ignored.
fn tls_config(settings: &Settings) -> TlsConfig {
    if settings.verify_peer && !settings.verify_host {
        warn!("host verification cannot be disabled without peer verification, keeping both on");
    }
    TlsConfig::builder()
        .disable_verification(!settings.verify_peer)
        .build()
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn parse_uri(url: &str) -> Result<Uri, TransportFailure> {
    let uri: Uri = url
        .parse()
        .map_err(|e| TransportFailure::new(codes::URL_MALFORMAT, format!("URL rejected: {e}")))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => Ok(uri),
        Some(other) => Err(TransportFailure::new(
            codes::UNSUPPORTED_PROTOCOL,
            format!("Protocol \"{other}\" not supported"),
        )),
        None => Err(TransportFailure::new(
            codes::URL_MALFORMAT,
            format!("URL rejected: no scheme in `{url}`"),
        )),
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a (String, String)> {
    headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// Built-in headers first, then the caller's list; a caller header replaces
/// a built-in one of the same name.
fn outgoing_headers(settings: &Settings) -> Result<Vec<(String, String)>, TransportFailure> {
    let mut headers: Vec<(String, String)> = Vec::new();
    if let Some(user_agent) = &settings.user_agent {
        headers.push(("User-Agent".to_string(), user_agent.clone()));
    }
    if let Some(referer) = &settings.referer {
        headers.push(("Referer".to_string(), referer.clone()));
    }
    if let Some(cookie) = settings.cookie.as_ref().filter(|c| !c.is_empty()) {
        headers.push(("Cookie".to_string(), cookie.clone()));
    }
    if let Some(encoding) = settings.encoding.as_ref().filter(|e| !e.is_empty()) {
        headers.push(("Accept-Encoding".to_string(), encoding.clone()));
    }
    headers.push(("Accept".to_string(), "*/*".to_string()));
    if let Some(credentials) = &settings.credentials {
        match settings.auth.unwrap_or(AuthScheme::Basic) {
            AuthScheme::Basic | AuthScheme::Any => headers.push((
                "Authorization".to_string(),
                format!("Basic {}", Base64::encode_string(credentials.as_bytes())),
            )),
            other => {
                return Err(TransportFailure::new(
                    codes::NOT_BUILT_IN,
                    format!("{other:?} authentication is not supported by this transport"),
                ))
            }
        }
    }

    for line in &settings.headers {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.trim().to_string()));
    }
    Ok(headers)
}

/// The content type and bytes of a request body, `None` for no body.
fn encode_body(body: &RequestBody) -> Result<Option<(String, Vec<u8>)>, TransportFailure> {
    let encoded = match body {
        RequestBody::Empty => return Ok(None),
        RequestBody::UrlEncoded(text) => (
            "application/x-www-form-urlencoded".to_string(),
            text.clone().into_bytes(),
        ),
        RequestBody::Json(text) => ("application/json".to_string(), text.clone().into_bytes()),
        RequestBody::Raw { content_type, data } => (
            content_type
                .clone()
                .unwrap_or_else(|| "application/x-www-form-urlencoded".to_string()),
            data.clone(),
        ),
        RequestBody::Multipart(form) => encode_multipart(form)?,
    };
    Ok(Some(encoded))
}

fn encode_multipart(form: &Form) -> Result<(String, Vec<u8>), TransportFailure> {
    let boundary = format!("------------------------{}", Uuid::new_v4().simple());
    let mut out = Vec::new();
    for (name, value) in form.iter() {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match value {
            FormValue::Value(value) => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                out.extend_from_slice(part_text(value).as_bytes());
            }
            FormValue::File(file) => {
                let data = std::fs::read(file.path()).map_err(|e| {
                    TransportFailure::new(
                        codes::READ_ERROR,
                        format!("Failed to read {}: {e}", file.path().display()),
                    )
                })?;
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        file.file_name(),
                        file.mime_type()
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&data);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok((format!("multipart/form-data; boundary={boundary}"), out))
}

fn part_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => (if *flag { "1" } else { "0" }).to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Request line plus headers as they go on the wire.
fn request_head(method: &Method, uri: &Uri, headers: &[(String, String)]) -> String {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut head = format!("{method} {target} HTTP/1.1\r\n");
    if find_header(headers, "host").is_none() {
        if let Some(host) = host_header(uri) {
            head.push_str(&format!("Host: {host}\r\n"));
        }
    }
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    head
}

/// The `Host` value sent for `uri`: the port is kept only when it differs
/// from the scheme's default.
fn host_header(uri: &Uri) -> Option<String> {
    let host = uri.host()?;
    let default_port = match uri.scheme_str() {
        Some("https") => 443,
        _ => 80,
    };
    Some(match uri.port_u16() {
        Some(port) if port != default_port => format!("{host}:{port}"),
        _ => host.to_string(),
    })
}

fn header_value(headers: &http::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Undo a `Content-Encoding`. Unknown encodings pass through untouched.
fn decode_content(encoding: Option<&str>, raw: Vec<u8>) -> Result<Vec<u8>, TransportFailure> {
    let Some(encoding) = encoding.map(str::to_ascii_lowercase) else {
        return Ok(raw);
    };
    if raw.is_empty() {
        return Ok(raw);
    }
    let mut decoded = Vec::new();
    let result = match encoding.as_str() {
        "gzip" | "x-gzip" => MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut decoded),
        // Servers disagree on whether deflate means zlib-wrapped or raw.
        "deflate" => ZlibDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .or_else(|_| {
                decoded.clear();
                DeflateDecoder::new(raw.as_slice()).read_to_end(&mut decoded)
            }),
        _ => return Ok(raw),
    };
    result.map_err(|e| {
        TransportFailure::new(
            codes::BAD_CONTENT_ENCODING,
            format!("Error while processing content unencoding: {e}"),
        )
    })?;
    Ok(decoded)
}

/// Status line, header lines and the terminating blank line, CRLF included.
fn response_head(parts: &http::response::Parts) -> Vec<String> {
    let reason = parts.status.canonical_reason().unwrap_or("");
    let status_line = format!("{:?} {} {}", parts.version, parts.status.as_u16(), reason);
    let mut lines = vec![format!("{}\r\n", status_line.trim_end())];
    for (name, value) in &parts.headers {
        lines.push(format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    lines.push("\r\n".to_string());
    lines
}

/// Map a ureq error onto a transport failure code.
fn map_ureq_error(err: ureq::Error) -> TransportFailure {
    let code = match &err {
        ureq::Error::Timeout(_) => codes::OPERATION_TIMEDOUT,
        ureq::Error::HostNotFound => codes::COULDNT_RESOLVE_HOST,
        ureq::Error::ConnectionFailed => codes::COULDNT_CONNECT,
        ureq::Error::BadUri(_) => codes::URL_MALFORMAT,
        ureq::Error::Tls(_) => codes::SSL_CONNECT_ERROR,
        ureq::Error::Io(e) => match e.kind() {
            io::ErrorKind::ConnectionRefused => codes::COULDNT_CONNECT,
            io::ErrorKind::TimedOut => codes::OPERATION_TIMEDOUT,
            _ => codes::RECV_ERROR,
        },
        _ => codes::RECV_ERROR,
    };
    TransportFailure::new(code, err.to_string())
}
