//! Shared test utilities for the adcanvas test suite.
//!
//! Synthetic master images (encoded in memory, no fixture files) and
//! lookups over format results that panic with a readable message.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let master = synthetic_jpeg(1920, 1080);
//! let out = RustBackend::new().conform(&master, 300, 250, OutputEncoding::Png).unwrap();
//! assert_eq!(dims_of(&out), (300, 250));
//! ```

use crate::imaging::{ImageBackend, RustBackend};
use crate::job::FormatResult;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

// =========================================================================
// Synthetic images
// =========================================================================

/// Encode a gradient as JPEG bytes.
pub fn synthetic_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Encode a flat colour as PNG bytes.
pub fn synthetic_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Encode a two-axis gradient as PNG bytes; it compresses poorly, so a
/// truncated copy loses pixel rows rather than just trailing chunks.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Dimensions of encoded image bytes, read through the production backend.
pub fn dims_of(bytes: &[u8]) -> (u32, u32) {
    let info = RustBackend::new().identify(bytes).unwrap();
    (info.width, info.height)
}

// =========================================================================
// Result lookups, panicking with a clear message on miss
// =========================================================================

/// Find a format result by format id. Panics if not found.
pub fn find_result<'a>(results: &'a [FormatResult], format_id: &str) -> &'a FormatResult {
    results
        .iter()
        .find(|r| r.format_id == format_id)
        .unwrap_or_else(|| {
            let ids: Vec<&str> = results.iter().map(|r| r.format_id.as_str()).collect();
            panic!("result '{format_id}' not found. Available: {ids:?}")
        })
}
