//! HTTP transport with bounded retry and cancellation.
//!
//! Blocking `ureq` calls run on the blocking pool; the async wrapper
//! races every attempt, and every backoff sleep, against the caller's
//! cancellation token. A response that loses the race is dropped, never
//! surfaced.

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Extra attempts after the first failure.
pub const MAX_RETRIES: u32 = 2;
/// Fixed delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A file to send in a multipart upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart { boundary: String, bytes: Vec<u8> },
}

#[derive(Clone)]
struct RequestSpec {
    method: &'static str,
    url: String,
    body: Body,
}

struct HttpResponse {
    body: Vec<u8>,
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    base_url: &str,
    path: &str,
    cancel: &CancellationToken,
) -> Result<T, ApiError> {
    let response = request(spec("GET", base_url, path, Body::Empty), cancel).await?;
    decode_json(&response.body)
}

pub(crate) async fn get_text(
    base_url: &str,
    path: &str,
    cancel: &CancellationToken,
) -> Result<String, ApiError> {
    let response = request(spec("GET", base_url, path, Body::Empty), cancel).await?;
    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

pub(crate) async fn get_bytes(
    base_url: &str,
    path: &str,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ApiError> {
    let response = request(spec("GET", base_url, path, Body::Empty), cancel).await?;
    Ok(response.body)
}

pub(crate) async fn post_json<T: DeserializeOwned>(
    base_url: &str,
    path: &str,
    body: &impl Serialize,
    cancel: &CancellationToken,
) -> Result<T, ApiError> {
    let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    let response = request(spec("POST", base_url, path, Body::Json(body)), cancel).await?;
    decode_json(&response.body)
}

/// POST whose response body is ignored; any 2xx settles it.
pub(crate) async fn post_unit(
    base_url: &str,
    path: &str,
    body: &impl Serialize,
    cancel: &CancellationToken,
) -> Result<(), ApiError> {
    let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    request(spec("POST", base_url, path, Body::Json(body)), cancel).await?;
    Ok(())
}

pub(crate) async fn upload<T: DeserializeOwned>(
    base_url: &str,
    path: &str,
    files: &[FileUpload],
    cancel: &CancellationToken,
) -> Result<T, ApiError> {
    let (boundary, bytes) = multipart_body(files);
    let body = Body::Multipart { boundary, bytes };
    let response = request(spec("POST", base_url, path, body), cancel).await?;
    decode_json(&response.body)
}

fn spec(method: &'static str, base_url: &str, path: &str, body: Body) -> RequestSpec {
    RequestSpec {
        method,
        url: format!("{}{}", base_url, path),
        body,
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Issues the request with the retry policy: up to [`MAX_RETRIES`]
/// extra attempts with a fixed delay, only for retryable failures
/// (5xx, transport). Cancellation wins over both attempts and delays.
async fn request(spec: RequestSpec, cancel: &CancellationToken) -> Result<HttpResponse, ApiError> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let blocking_spec = spec.clone();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            joined = tokio::task::spawn_blocking(move || send_blocking(blocking_spec)) => {
                joined.map_err(|e| ApiError::Network(e.to_string()))?
            }
        };

        match outcome {
            Ok(response) => return Ok(response),
            Err(err) if attempt < MAX_RETRIES && err.is_retryable() => {
                attempt += 1;
                warn!(
                    "{} {} failed ({}), retry {}/{}",
                    spec.method, spec.url, err, attempt, MAX_RETRIES
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn send_blocking(spec: RequestSpec) -> Result<HttpResponse, ApiError> {
    let request = match spec.method {
        "POST" => ureq::post(&spec.url),
        _ => ureq::get(&spec.url),
    };

    let result = match spec.body {
        Body::Empty => request.call(),
        Body::Json(value) => request
            .set("Content-Type", "application/json")
            .send_json(value),
        Body::Multipart { boundary, bytes } => request
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&bytes),
    };

    match result {
        Ok(response) => {
            let mut body = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut body)
                .map_err(|e| ApiError::Network(e.to_string()))?;
            Ok(HttpResponse { body })
        }
        Err(ureq::Error::Status(status, response)) => Err(ApiError::Http {
            status,
            message: format!("HTTP {}: {}", status, response.status_text()),
        }),
        Err(err) => Err(ApiError::Network(err.to_string())),
    }
}

/// Builds a multipart/form-data body with one `files` part per file.
fn multipart_body(files: &[FileUpload]) -> (String, Vec<u8>) {
    let boundary = format!("takeoff-{}", uuid::Uuid::new_v4().simple());
    let mut bytes = Vec::new();
    for file in files {
        bytes.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                file.name
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        bytes.extend_from_slice(&file.bytes);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    (boundary, bytes)
}
