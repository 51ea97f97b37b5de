//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what images to create) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Background`]: Solid RGB fill used behind padded (letterboxed) output.
//! - [`OutputEncoding`]: Container the finished artifact is written in.
//! - [`CropParams`]: Fill-resize + saliency crop to exact target dimensions.
//! - [`PadParams`]: Fit-resize + centre on a solid canvas.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Solid background colour for padded output, parsed from `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 3]);

impl Background {
    pub fn white() -> Self {
        Self([255, 255, 255])
    }

    pub fn rgb(self) -> [u8; 3] {
        self.0
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::white()
    }
}

impl FromStr for Background {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("colour '{s}' must start with '#'"))?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("colour '{s}' must be #rrggbb"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("colour '{s}' is not valid hex"))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Container an output artifact is encoded in.
///
/// PNG masters stay PNG (lossless, keeps transparency); everything else
/// becomes JPEG at the configured quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Png,
    Jpeg(Quality),
}

impl OutputEncoding {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg(_) => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg(_) => "image/jpeg",
        }
    }
}

/// Parameters for a fill-and-crop operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: Arc<[u8]>,
    /// Final output dimensions.
    pub width: u32,
    pub height: u32,
    pub encoding: OutputEncoding,
}

/// Parameters for a fit-and-pad operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PadParams {
    pub source: Arc<[u8]>,
    /// Final canvas dimensions.
    pub width: u32,
    pub height: u32,
    /// Dimensions the source is scaled to before centring on the canvas.
    pub fit_width: u32,
    pub fit_height: u32,
    pub background: Background,
    pub encoding: OutputEncoding,
}
