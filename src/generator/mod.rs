//! Client side of the generative image model.
//!
//! The model itself is a remote collaborator; this module only defines the
//! request/response contract, the failure taxonomy, and the retry policy
//! around it.
//!
//! | Failure | Retried | Typical cause |
//! |---|---|---|
//! | `auth` | no | missing or revoked API key |
//! | `malformed_request` | no | payload rejected by the model API |
//! | `rate_limited` | yes | 429 / quota exhausted |
//! | `timeout` | yes | attempt exceeded `timeout_secs` |
//! | `server` | yes | 5xx or connection failure |
//!
//! Production requests go through [`HttpGenerator`]; when no endpoint is
//! configured, [`UnavailableGenerator`] fails every request without retry.

pub mod http;
pub mod retry;

pub use http::HttpGenerator;
pub use retry::{RetryPolicy, backoff_delay, generate_with_retry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One recomposition request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Arc<[u8]>,
    pub mime_type: &'static str,
    /// Target aspect ratio as `"W:H"` in lowest terms.
    pub aspect_ratio: String,
}

/// Failure classes reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    MalformedRequest,
    RateLimited,
    Timeout,
    Server,
}

impl FailureKind {
    /// Auth and malformed-request failures cannot resolve themselves.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Auth | Self::MalformedRequest)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auth => "auth",
            Self::MalformedRequest => "malformed_request",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Server => "server",
        })
    }
}

/// Typed failure from one generation attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: FailureKind,
    pub message: String,
    pub http_status: Option<u16>,
}

impl GenerationError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// A remote model that recomposes an image to a new aspect ratio.
///
/// One call is one attempt; retrying is the caller's business
/// (see [`generate_with_retry`]).
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError>;
}

/// Stand-in used when no generation endpoint is configured.
#[derive(Debug, Default)]
pub struct UnavailableGenerator;

impl ImageGenerator for UnavailableGenerator {
    fn generate(&self, _request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        Err(GenerationError::new(
            FailureKind::Auth,
            "AI regeneration is not configured (set regenerate.endpoint)",
        ))
    }
}
