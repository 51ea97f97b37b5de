//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify (JPEG, PNG, WebP) | `image::guess_format` + `ImageReader::into_dimensions` |
//! | Decode, validate | `image::load_from_memory_with_format` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Saliency crop | luma gradient energy profile + [`best_window_offset`] |
//! | Letterbox | `imageops::overlay` onto a solid `RgbaImage` canvas |
//! | Encode → PNG / JPEG | `PngEncoder`, `JpegEncoder::new_with_quality` |

use super::backend::{BackendError, ImageBackend, ImageInfo, SourceFormat};
use super::calculations::{
    best_window_offset, calculate_fill_dimensions, centered_offset,
};
use super::params::{CropParams, OutputEncoding, PadParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn source_format(bytes: &[u8]) -> Result<(ImageFormat, SourceFormat), BackendError> {
    let format = image::guess_format(bytes)
        .map_err(|e| BackendError::UnsupportedFormat(format!("unrecognised container: {e}")))?;
    let source = match format {
        ImageFormat::Jpeg => SourceFormat::Jpeg,
        ImageFormat::Png => SourceFormat::Png,
        ImageFormat::WebP => SourceFormat::Webp,
        other => return Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
    };
    Ok((format, source))
}

/// Decode an image held in memory.
fn load_image(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let (format, _) = source_format(bytes)?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Encode to the requested container.
fn encode_image(img: &DynamicImage, encoding: OutputEncoding) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match encoding {
        OutputEncoding::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputEncoding::Jpeg(quality) => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(
                &mut buf,
                quality.value() as u8,
            ))
        }
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("Encode failed: {e}")))?;
    Ok(buf)
}

/// Which axis overflows the target after a fill-resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Per-column (horizontal) or per-row (vertical) gradient energy.
///
/// Each pixel contributes the absolute luma difference to its right and
/// lower neighbours; busy regions such as text, faces and product edges
/// score high, flat backgrounds score near zero.
fn energy_profile(luma: &GrayImage, axis: Axis) -> Vec<u64> {
    let (w, h) = luma.dimensions();
    let len = match axis {
        Axis::Horizontal => w,
        Axis::Vertical => h,
    } as usize;
    let mut profile = vec![0u64; len];

    for y in 0..h {
        for x in 0..w {
            let here = luma.get_pixel(x, y)[0] as i32;
            let mut energy = 0u64;
            if x + 1 < w {
                energy += (luma.get_pixel(x + 1, y)[0] as i32 - here).unsigned_abs() as u64;
            }
            if y + 1 < h {
                energy += (luma.get_pixel(x, y + 1)[0] as i32 - here).unsigned_abs() as u64;
            }
            let slot = match axis {
                Axis::Horizontal => x,
                Axis::Vertical => y,
            } as usize;
            profile[slot] += energy;
        }
    }

    profile
}

/// Resize to cover `(width, height)` and crop around the highest-energy window.
fn saliency_crop(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (fill_w, fill_h) = calculate_fill_dimensions((img.width(), img.height()), (width, height));
    let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);

    let (x, y) = if fill_w > width {
        let profile = energy_profile(&filled.to_luma8(), Axis::Horizontal);
        (best_window_offset(&profile, width as usize) as u32, 0)
    } else if fill_h > height {
        let profile = energy_profile(&filled.to_luma8(), Axis::Vertical);
        (0, best_window_offset(&profile, height as usize) as u32)
    } else {
        (0, 0)
    };

    filled.crop_imm(x, y, width, height)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError> {
        let (_, format) = source_format(bytes)?;
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(ImageInfo {
            width,
            height,
            format,
        })
    }

    fn validate(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError> {
        let (_, format) = source_format(bytes)?;
        let img = load_image(bytes)?;
        Ok(ImageInfo {
            width: img.width(),
            height: img.height(),
            format,
        })
    }

    fn crop_fill(&self, params: &CropParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let cropped = saliency_crop(&img, params.width, params.height);
        encode_image(&cropped, params.encoding)
    }

    fn pad_fit(&self, params: &PadParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let fitted = img
            .resize_exact(params.fit_width, params.fit_height, FilterType::Lanczos3)
            .to_rgba8();

        let [r, g, b] = params.background.rgb();
        let mut canvas = RgbaImage::from_pixel(params.width, params.height, Rgba([r, g, b, 255]));
        let x = centered_offset(params.width, params.fit_width);
        let y = centered_offset(params.height, params.fit_height);
        image::imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);

        encode_image(&DynamicImage::ImageRgba8(canvas), params.encoding)
    }

    fn conform(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        encoding: OutputEncoding,
    ) -> Result<Vec<u8>, BackendError> {
        let img = load_image(bytes)?;
        let sized = if img.width() == width && img.height() == height {
            img
        } else {
            img.resize_to_fill(width, height, FilterType::Lanczos3)
        };
        encode_image(&sized, encoding)
    }
}
