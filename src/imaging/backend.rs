//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the five operations every backend must
//! support: identify, validate, crop_fill, pad_fit, and conform. All of them work on
//! in-memory encoded bytes; nothing here touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate and statically linked into the binary.

use super::params::{CropParams, OutputEncoding, PadParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Encoded formats accepted as master images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Webp,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        })
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
}

/// Trait for image processing backends.
///
/// Every backend must implement all five operations so the executors stay
/// backend-agnostic. Implementations must be safe to call from several
/// format workers at once.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions and container format without a full decode.
    fn identify(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError>;

    /// Decode every pixel once. A header that reads fine can still front a
    /// truncated or corrupt body; this catches it.
    fn validate(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError>;

    /// Cover the target frame, cropping the overflow around the busiest region.
    fn crop_fill(&self, params: &CropParams) -> Result<Vec<u8>, BackendError>;

    /// Fit inside the target frame and fill the remainder with a solid colour.
    fn pad_fit(&self, params: &PadParams) -> Result<Vec<u8>, BackendError>;

    /// Bring externally produced bytes to exact dimensions and encoding.
    fn conform(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        encoding: OutputEncoding,
    ) -> Result<Vec<u8>, BackendError>;
}
