//! HTTP client for the generation endpoint.
//!
//! Wire format (JSON both ways):
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {api key}
//! { "model": "...", "prompt": "...", "image": "<base64>",
//!   "mime_type": "image/jpeg", "aspect_ratio": "9:16" }
//!
//! 200 OK
//! { "image": "<base64>" }
//! ```

use super::{FailureKind, GenerationError, GenerationRequest, ImageGenerator};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    image: String,
    mime_type: &'a str,
    aspect_ratio: &'a str,
}

#[derive(Deserialize)]
struct ResponseBody {
    image: String,
}

/// Map a non-success HTTP status to a failure class.
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        401 | 403 => FailureKind::Auth,
        400 | 404 | 413 | 422 => FailureKind::MalformedRequest,
        429 => FailureKind::RateLimited,
        408 | 504 => FailureKind::Timeout,
        _ => FailureKind::Server,
    }
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Server
    };
    GenerationError::new(kind, format!("request failed: {err}"))
}

fn encode_request<'a>(model: &'a str, request: &'a GenerationRequest) -> RequestBody<'a> {
    RequestBody {
        model,
        prompt: &request.prompt,
        image: STANDARD.encode(&request.image),
        mime_type: request.mime_type,
        aspect_ratio: &request.aspect_ratio,
    }
}

fn decode_response(body: &[u8]) -> Result<Vec<u8>, GenerationError> {
    let parsed: ResponseBody = serde_json::from_slice(body).map_err(|e| {
        GenerationError::new(FailureKind::Server, format!("unreadable response: {e}"))
    })?;
    STANDARD.decode(parsed.image.trim()).map_err(|e| {
        GenerationError::new(FailureKind::Server, format!("response image is not base64: {e}"))
    })
}

/// Blocking generator bound to one endpoint.
///
/// The client timeout bounds every attempt's wall-clock duration.
#[derive(Clone)]
pub struct HttpGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("adcanvas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GenerationError::new(
                    FailureKind::MalformedRequest,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        })
    }
}

impl ImageGenerator for HttpGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::new(
                FailureKind::Auth,
                "no API key available for the generation endpoint",
            ));
        };

        debug!(
            endpoint = %self.endpoint,
            aspect_ratio = %request.aspect_ratio,
            image_bytes = request.image.len(),
            "posting generation request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&encode_request(&self.model, request))
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().map_err(transport_error)?;
        if !status.is_success() {
            let snippet: String = String::from_utf8_lossy(&body).chars().take(200).collect();
            return Err(GenerationError::new(
                classify_status(status.as_u16()),
                format!("HTTP {status}: {snippet}"),
            )
            .with_status(status.as_u16()));
        }
        decode_response(&body)
    }
}
