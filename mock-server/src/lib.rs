//! Echo server used as the live peer in integration tests.
//!
//! Every route reflects what it received so tests can assert on the exact
//! method, path, query, headers and body a builder put on the wire.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri},
    routing::{any, get, post},
    Form, Json, Router,
};
use std::io::Write;

use flate2::{write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Upper bound for `/bytes/{n}`.
pub const MAX_GENERATED_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// First header value with this (lowercase) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Part {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/form", post(form))
        .route("/json", post(json).put(json).patch(json))
        .route("/multipart", post(multipart))
        .route("/bytes/{n}", get(bytes))
        .route("/gzip/{n}", get(gzip))
        .route("/status/{code}", any(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    tracing::debug!(%method, %uri, bytes = body.len(), "echo");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn form(Form(fields): Form<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(fields)
}

async fn json(Json(value): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(value)
}

async fn multipart(mut multipart: Multipart) -> Result<Json<Vec<Part>>, (StatusCode, String)> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        parts.push(Part {
            name,
            file_name,
            content_type,
            body: String::from_utf8_lossy(&data).into_owned(),
        });
    }
    Ok(Json(parts))
}

/// `n` bytes cycling through `a..=z`, with an explicit `Content-Length`.
async fn bytes(Path(n): Path<usize>) -> Result<([(HeaderName, String); 1], Vec<u8>), StatusCode> {
    if n > MAX_GENERATED_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    let body = (0..n).map(|i| b'a' + (i % 26) as u8).collect();
    Ok(([(header::CONTENT_LENGTH, n.to_string())], body))
}

/// `n` bytes of `a`, gzip-encoded, with the compressed `Content-Length`.
/// Used to check that clients see the body exactly as framed.
async fn gzip(
    Path(n): Path<usize>,
) -> Result<([(HeaderName, String); 2], Vec<u8>), StatusCode> {
    if n > MAX_GENERATED_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&vec![b'a'; n])
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let body = encoder
        .finish()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((
        [
            (header::CONTENT_ENCODING, "gzip".to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    ))
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}
