//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend, SourceFormat};
use super::calculations::calculate_fit_dimensions;
use super::params::{Background, CropParams, OutputEncoding, PadParams, Quality};
use std::sync::Arc;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Pick the output container for a master of the given format.
pub fn output_encoding(source: SourceFormat, quality: Quality) -> OutputEncoding {
    match source {
        SourceFormat::Png => OutputEncoding::Png,
        SourceFormat::Jpeg | SourceFormat::Webp => OutputEncoding::Jpeg(quality),
    }
}

/// Plan a fill-and-crop without executing it.
pub fn plan_crop(source: &Arc<[u8]>, target: (u32, u32), encoding: OutputEncoding) -> CropParams {
    CropParams {
        source: Arc::clone(source),
        width: target.0,
        height: target.1,
        encoding,
    }
}

/// Plan a fit-and-pad without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_padding(
    source: &Arc<[u8]>,
    source_dims: (u32, u32),
    target: (u32, u32),
    background: Background,
    encoding: OutputEncoding,
) -> PadParams {
    let (fit_width, fit_height) = calculate_fit_dimensions(source_dims, target);
    PadParams {
        source: Arc::clone(source),
        width: target.0,
        height: target.1,
        fit_width,
        fit_height,
        background,
        encoding,
    }
}

/// Produce a cropped rendition at exactly `target` pixels.
pub fn create_crop(
    backend: &(impl ImageBackend + ?Sized),
    source: &Arc<[u8]>,
    target: (u32, u32),
    encoding: OutputEncoding,
) -> Result<Vec<u8>> {
    backend.crop_fill(&plan_crop(source, target, encoding))
}

/// Produce a letterboxed rendition at exactly `target` pixels.
pub fn create_padded(
    backend: &(impl ImageBackend + ?Sized),
    source: &Arc<[u8]>,
    source_dims: (u32, u32),
    target: (u32, u32),
    background: Background,
    encoding: OutputEncoding,
) -> Result<Vec<u8>> {
    backend.pad_fit(&plan_padding(
        source,
        source_dims,
        target,
        background,
        encoding,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};

    fn source() -> Arc<[u8]> {
        b"master".to_vec().into()
    }

    #[test]
    fn png_masters_stay_png() {
        assert_eq!(
            output_encoding(SourceFormat::Png, Quality::default()),
            OutputEncoding::Png
        );
    }

    #[test]
    fn lossy_masters_become_jpeg() {
        let q = Quality::new(80);
        assert_eq!(output_encoding(SourceFormat::Jpeg, q), OutputEncoding::Jpeg(q));
        assert_eq!(output_encoding(SourceFormat::Webp, q), OutputEncoding::Jpeg(q));
    }

    #[test]
    fn plan_padding_calculates_fit() {
        // 1600x900 master into a 1200x1200 square → 1200x675 centred
        let params = plan_padding(
            &source(),
            (1600, 900),
            (1200, 1200),
            Background::white(),
            OutputEncoding::Png,
        );

        assert_eq!((params.width, params.height), (1200, 1200));
        assert_eq!((params.fit_width, params.fit_height), (1200, 675));
    }

    #[test]
    fn plan_crop_shares_source_bytes() {
        let src = source();
        let params = plan_crop(&src, (300, 250), OutputEncoding::Png);
        assert!(Arc::ptr_eq(&src, &params.source));
        assert_eq!((params.width, params.height), (300, 250));
    }

    #[test]
    fn create_padded_uses_backend() {
        let backend = MockBackend::with_dimensions(1600, 900);

        let out = create_padded(
            &backend,
            &source(),
            (1600, 900),
            (1200, 1200),
            Background([0, 0, 0]),
            OutputEncoding::Png,
        )
        .unwrap();

        assert_eq!(out, b"pad 1200x1200");
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::PadFit {
                width: 1200,
                height: 1200,
                fit_width: 1200,
                fit_height: 675,
                background: [0, 0, 0],
            }]
        );
    }

    #[test]
    fn create_crop_uses_backend() {
        let backend = MockBackend::with_dimensions(1000, 1000);
        let out = create_crop(&backend, &source(), (1080, 1080), OutputEncoding::Png).unwrap();
        assert_eq!(out, b"crop 1080x1080");
    }
}
