use std::collections::BTreeMap;
use std::io::Write;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Plain text served by the compressed routes.
pub const COMPRESSED_TEXT: &str = "hello";

/// Everything the server saw of a request, returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lower-cased names; repeated headers are joined with `, `.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/headers", get(custom_headers))
        .route("/gzip", get(gzip))
        .route("/deflate", get(deflate))
        .route("/redirect", any(redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    Json(Echo {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn custom_headers() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (HeaderName::from_static("x-custom"), "value"),
        ],
        "headers",
    )
}

async fn gzip() -> Result<impl IntoResponse, StatusCode> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(COMPRESSED_TEXT.as_bytes())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = encoder.finish().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(compressed("gzip", body))
}

/// zlib-wrapped, which is what `Content-Encoding: deflate` means on the wire.
async fn deflate() -> Result<impl IntoResponse, StatusCode> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(COMPRESSED_TEXT.as_bytes())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = encoder.finish().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(compressed("deflate", body))
}

fn compressed(encoding: &'static str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CONTENT_ENCODING, encoding),
        ],
        body,
    )
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")], "moved")
}
