//! Target format presets and the registry that resolves them.
//!
//! A preset is a named rendering target: the advertising platform it belongs
//! to, its exact pixel size, and the safe-zone margins inside which text and
//! logos must stay legible (story formats reserve strips at the top and
//! bottom for platform chrome).
//!
//! The [`FormatRegistry`] is built once at startup from the stock table
//! below, overlaid with any `[presets.<id>]` tables from the config file, and
//! then shared read-only. Nothing mutates it afterwards.
//!
//! ```text
//! stock presets  ──┐
//!                  ├──► FormatRegistry::load ──► Arc<FormatRegistry> ──► orchestrator, CLI
//! [presets.*]   ───┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PresetError {
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error("invalid preset '{id}': {reason}")]
    Invalid { id: String, reason: String },
}

/// Safe-zone margins in pixels, measured inward from each edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafeZone {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl SafeZone {
    pub const NONE: SafeZone = SafeZone {
        top: 0,
        bottom: 0,
        left: 0,
        right: 0,
    };

    const fn vertical(top: u32, bottom: u32) -> Self {
        Self {
            top,
            bottom,
            left: 0,
            right: 0,
        }
    }
}

/// Preset body as written in config (`[presets.<id>]`), without the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetSpec {
    pub platform: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub safe_zone: SafeZone,
}

/// An immutable registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPreset {
    pub id: String,
    pub platform: String,
    pub width: u32,
    pub height: u32,
    pub safe_zone: SafeZone,
}

impl FormatPreset {
    pub fn new(id: &str, spec: PresetSpec) -> Self {
        Self {
            id: id.to_string(),
            platform: spec.platform,
            width: spec.width,
            height: spec.height,
            safe_zone: spec.safe_zone,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn validate(&self) -> Result<(), PresetError> {
        let invalid = |reason: &str| PresetError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let id_ok = !self.id.is_empty()
            && self
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !id_ok {
            return Err(invalid("id must be lowercase letters, digits, '_' or '-'"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid("width and height must be non-zero"));
        }
        let sz = self.safe_zone;
        if sz.top.saturating_add(sz.bottom) >= self.height
            || sz.left.saturating_add(sz.right) >= self.width
        {
            return Err(invalid("safe zone leaves no usable area"));
        }
        Ok(())
    }
}

/// (id, platform, width, height, safe zone)
const STOCK_PRESETS: &[(&str, &str, u32, u32, SafeZone)] = &[
    ("instagram_square", "Instagram", 1080, 1080, SafeZone::NONE),
    ("instagram_portrait", "Instagram", 1080, 1350, SafeZone::NONE),
    ("instagram_story", "Instagram", 1080, 1920, SafeZone::vertical(250, 340)),
    ("facebook_feed", "Facebook", 1200, 628, SafeZone::NONE),
    ("facebook_story", "Facebook", 1080, 1920, SafeZone::vertical(250, 340)),
    ("twitter_post", "X", 1600, 900, SafeZone::NONE),
    ("linkedin_single", "LinkedIn", 1200, 627, SafeZone::NONE),
    ("pinterest_pin", "Pinterest", 1000, 1500, SafeZone::NONE),
    ("youtube_thumbnail", "YouTube", 1280, 720, SafeZone::NONE),
    (
        "tiktok_cover",
        "TikTok",
        1080,
        1920,
        SafeZone {
            top: 130,
            bottom: 370,
            left: 60,
            right: 140,
        },
    ),
    ("display_leaderboard", "Google Display", 728, 90, SafeZone::NONE),
    ("display_medium_rectangle", "Google Display", 300, 250, SafeZone::NONE),
    ("display_skyscraper", "Google Display", 160, 600, SafeZone::NONE),
];

/// The stock preset table as config-shaped specs.
pub fn stock_presets() -> BTreeMap<String, PresetSpec> {
    STOCK_PRESETS
        .iter()
        .map(|&(id, platform, width, height, safe_zone)| {
            (
                id.to_string(),
                PresetSpec {
                    platform: platform.to_string(),
                    width,
                    height,
                    safe_zone,
                },
            )
        })
        .collect()
}

/// Read-only lookup of format presets keyed by identifier.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    presets: BTreeMap<String, FormatPreset>,
}

impl FormatRegistry {
    /// Build the registry from the stock table plus config overrides.
    ///
    /// An override with a stock id replaces that preset wholesale.
    pub fn load(overrides: &BTreeMap<String, PresetSpec>) -> Result<Self, PresetError> {
        let mut specs = stock_presets();
        for (id, spec) in overrides {
            specs.insert(id.clone(), spec.clone());
        }
        Self::from_specs(specs)
    }

    /// Build a registry from exactly the given presets (no stock table).
    pub fn from_specs(specs: BTreeMap<String, PresetSpec>) -> Result<Self, PresetError> {
        let mut presets = BTreeMap::new();
        for (id, spec) in specs {
            let preset = FormatPreset::new(&id, spec);
            preset.validate()?;
            presets.insert(id, preset);
        }
        Ok(Self { presets })
    }

    pub fn get(&self, id: &str) -> Option<&FormatPreset> {
        self.presets.get(id)
    }

    /// Resolve requested identifiers to presets.
    ///
    /// Duplicates collapse to their first occurrence; order of first
    /// occurrence is kept. Any unknown id fails the whole resolution.
    pub fn resolve<I, S>(&self, ids: I) -> Result<Vec<FormatPreset>, PresetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id.to_string()) {
                continue;
            }
            let preset = self
                .get(id)
                .ok_or_else(|| PresetError::UnknownFormat(id.to_string()))?;
            resolved.push(preset.clone());
        }
        Ok(resolved)
    }

    /// All presets, sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &FormatPreset> {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}
