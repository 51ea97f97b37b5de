//! Deterministic image transforms in pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::guess_format` + header-only dimension read |
//! | **Crop** | Lanczos3 fill-resize + gradient-energy crop window |
//! | **Padding** | Lanczos3 fit-resize + overlay on a solid canvas |
//! | **Conform** | `resize_to_fill` of generative output to exact size |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageInfo, SourceFormat};
pub use calculations::{
    best_window_offset, calculate_fill_dimensions, calculate_fit_dimensions, describe_margins,
    reduce_ratio,
};
pub use operations::{create_crop, create_padded, output_encoding};
pub use params::{Background, OutputEncoding, Quality};
pub use rust_backend::RustBackend;
