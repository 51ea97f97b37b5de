//! Choosing how each format is produced.
//!
//! The decision depends only on how far the target's aspect ratio is from
//! the master's:
//!
//! ```text
//! delta = |source_w / source_h − target_w / target_h|
//!
//!   0 ──────────── crop ────────────┬──── padding ────┬──── ai_regenerate ────►
//!                            crop_threshold    padding_threshold
//! ```
//!
//! A delta exactly on a threshold belongs to the method on its right.
//! Thresholds are policy, read from `[selection]` in the config.

use crate::presets::FormatPreset;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a format rendition is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Crop,
    Padding,
    AiRegenerate,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::Padding => "padding",
            Self::AiRegenerate => "ai_regenerate",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SelectionError {
    #[error("cannot compare aspect ratios of {source_w}x{source_h} and {target_w}x{target_h}")]
    DegenerateDimensions {
        source_w: u32,
        source_h: u32,
        target_w: u32,
        target_h: u32,
    },
}

/// Ordered aspect-ratio thresholds (`crop < padding`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub crop: f64,
    pub padding: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            crop: 0.2,
            padding: 0.5,
        }
    }
}

/// Pure method selection. Holds only the threshold policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodSelector {
    thresholds: Thresholds,
}

impl MethodSelector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Classify an aspect-ratio delta.
    pub fn classify(&self, delta: f64) -> Method {
        if delta < self.thresholds.crop {
            Method::Crop
        } else if delta < self.thresholds.padding {
            Method::Padding
        } else {
            Method::AiRegenerate
        }
    }

    /// Select the method for producing `target` from a `source_w`×`source_h` master.
    pub fn select(
        &self,
        source_w: u32,
        source_h: u32,
        target: &FormatPreset,
    ) -> Result<Method, SelectionError> {
        Ok(self.classify(ratio_delta(source_w, source_h, target)?))
    }
}

/// Absolute difference between the source and target aspect ratios.
pub fn ratio_delta(
    source_w: u32,
    source_h: u32,
    target: &FormatPreset,
) -> Result<f64, SelectionError> {
    if source_w == 0 || source_h == 0 || target.width == 0 || target.height == 0 {
        return Err(SelectionError::DegenerateDimensions {
            source_w,
            source_h,
            target_w: target.width,
            target_h: target.height,
        });
    }
    let source_ratio = source_w as f64 / source_h as f64;
    let target_ratio = target.width as f64 / target.height as f64;
    Ok((source_ratio - target_ratio).abs())
}
