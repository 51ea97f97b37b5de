//! Orchestrator configuration.
//!
//! Handles loading, validating, and merging `adcanvas.toml`. Stock defaults
//! form the base layer; the user file is merged on top table by table, so a
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [selection]
//! crop_threshold = 0.2      # |Δratio| below this → crop
//! padding_threshold = 0.5   # |Δratio| below this → padding, else AI regenerate
//!
//! [processing]
//! max_concurrent = 3        # Formats in flight per job
//!
//! [output]
//! jpeg_quality = 90
//! background = "#ffffff"    # Padding canvas colour
//!
//! [regenerate]
//! endpoint = ""             # Empty disables the AI path
//! api_key_env = "ADCANVAS_API_KEY"
//! model = "image-recompose-1"
//! timeout_secs = 120
//! max_attempts = 3
//! base_delay_ms = 2000
//!
//! [storage]
//! root = "output"
//! public_base_url = "file://output"
//!
//! [store]
//! dir = "jobs"
//!
//! [presets.snap_ad]         # Add or override a format preset
//! platform = "Snapchat"
//! width = 1080
//! height = 1920
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Background, Quality};
use crate::presets::{FormatRegistry, PresetSpec};
use crate::selector::Thresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `adcanvas.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Aspect-ratio thresholds for method selection.
    pub selection: SelectionConfig,
    /// Per-job concurrency.
    pub processing: ProcessingConfig,
    /// Encoding and padding settings for rendered formats.
    pub output: OutputConfig,
    /// Generative endpoint and retry policy.
    pub regenerate: RegenerateConfig,
    /// Where artifacts are written.
    pub storage: StorageConfig,
    /// Where job status documents are written.
    pub store: StoreConfig,
    /// Extra or overriding format presets, keyed by id.
    pub presets: BTreeMap<String, PresetSpec>,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.selection;
        if !s.crop_threshold.is_finite() || s.crop_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "selection.crop_threshold must be a non-negative number".into(),
            ));
        }
        if !s.padding_threshold.is_finite() || s.crop_threshold >= s.padding_threshold {
            return Err(ConfigError::Validation(
                "selection.crop_threshold must be below selection.padding_threshold".into(),
            ));
        }
        if self.processing.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "processing.max_concurrent must be at least 1".into(),
            ));
        }
        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.output.background.parse::<Background>().is_err() {
            return Err(ConfigError::Validation(format!(
                "output.background must be \"#rrggbb\", got {:?}",
                self.output.background
            )));
        }
        if self.regenerate.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "regenerate.max_attempts must be at least 1".into(),
            ));
        }
        if self.regenerate.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "regenerate.timeout_secs must be at least 1".into(),
            ));
        }
        FormatRegistry::load(&self.presets)
            .map_err(|e| ConfigError::Validation(format!("presets: {e}")))?;
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            crop: self.selection.crop_threshold,
            padding: self.selection.padding_threshold,
        }
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.output.jpeg_quality)
    }

    /// Padding colour. Falls back to white if validation was skipped.
    pub fn background(&self) -> Background {
        self.output.background.parse().unwrap_or_default()
    }

    pub fn registry(&self) -> Result<FormatRegistry, ConfigError> {
        FormatRegistry::load(&self.presets)
            .map_err(|e| ConfigError::Validation(format!("presets: {e}")))
    }
}

/// Aspect-ratio thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    pub crop_threshold: f64,
    pub padding_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        Self {
            crop_threshold: t.crop,
            padding_threshold: t.padding,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum formats processed at once within a job. Not clamped to the
    /// core count: AI formats spend most of their time waiting on the network.
    pub max_concurrent: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { max_concurrent: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG quality for non-PNG masters (1-100).
    pub jpeg_quality: u32,
    /// Canvas colour behind padded formats.
    pub background: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            background: "#ffffff".to_string(),
        }
    }
}

/// Generative endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegenerateConfig {
    /// Endpoint URL. Empty disables AI regeneration; such formats fail.
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub model: String,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    /// Linear backoff unit: attempt `n` is followed by `n × base_delay_ms`.
    pub base_delay_ms: u64,
    /// Prompt template. Placeholders: `{width}`, `{height}`,
    /// `{aspect_ratio}`, `{platform}`, `{safe_zone}`.
    pub prompt: String,
}

pub const DEFAULT_PROMPT: &str = "Recompose this advertising image for a {platform} placement \
at {width}x{height} pixels (aspect ratio {aspect_ratio}). Extend or rearrange the scene so it \
fills the entire frame with no borders or letterbox bars. Keep every piece of text, logo and \
product exactly as it appears, legible and undistorted, and keep them within {safe_zone}.";

impl Default for RegenerateConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: "ADCANVAS_API_KEY".to_string(),
            model: "image-recompose-1".to_string(),
            timeout_secs: 120,
            max_attempts: 3,
            base_delay_ms: 2000,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl RegenerateConfig {
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory artifacts are written under.
    pub root: PathBuf,
    /// Prefix joined with the artifact path to form its public URL.
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            public_base_url: "file://output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding one `<job_id>.json` per job.
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("jobs"),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `adcanvas.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# adcanvas configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Method selection
# ---------------------------------------------------------------------------
# delta = |source_w/source_h - target_w/target_h|
#   delta <  crop_threshold                      -> crop
#   crop_threshold <= delta < padding_threshold  -> padding
#   delta >= padding_threshold                   -> ai_regenerate
[selection]
crop_threshold = 0.2
padding_threshold = 0.5

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Formats rendered at once within one job.
max_concurrent = 3

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# PNG masters produce PNG formats; all others produce JPEG at this quality.
jpeg_quality = 90

# Canvas colour behind padded formats.
background = "#ffffff"

# ---------------------------------------------------------------------------
# AI regeneration
# ---------------------------------------------------------------------------
[regenerate]
# Generation endpoint. Leave empty to disable; ai_regenerate formats then fail.
endpoint = ""

# Environment variable holding the bearer token.
api_key_env = "ADCANVAS_API_KEY"

model = "image-recompose-1"

# Per-attempt timeout in seconds.
timeout_secs = 120

# Total attempts including the first. Auth and malformed-request errors are
# never retried.
max_attempts = 3

# Linear backoff: after attempt n, wait n * base_delay_ms.
base_delay_ms = 2000

# Prompt template. Placeholders: {width} {height} {aspect_ratio} {platform} {safe_zone}
# prompt = "..."

# ---------------------------------------------------------------------------
# Artifact storage
# ---------------------------------------------------------------------------
[storage]
root = "output"
public_base_url = "file://output"

# ---------------------------------------------------------------------------
# Job status documents
# ---------------------------------------------------------------------------
[store]
dir = "jobs"

# ---------------------------------------------------------------------------
# Format presets
# ---------------------------------------------------------------------------
# Add a preset, or override a stock one by reusing its id:
#
# [presets.snap_ad]
# platform = "Snapchat"
# width = 1080
# height = 1920
# safe_zone = { top = 150, bottom = 300 }
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.selection.crop_threshold, 0.2);
        assert_eq!(config.selection.padding_threshold, 0.5);
        assert_eq!(config.processing.max_concurrent, 3);
        assert_eq!(config.output.jpeg_quality, 90);
        assert_eq!(config.output.background, "#ffffff");
        assert_eq!(config.regenerate.max_attempts, 3);
        assert_eq!(config.regenerate.base_delay_ms, 2000);
        assert!(!config.regenerate.is_enabled());
        assert!(config.presets.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[output]
background = "#000000"
"##;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.output.background, "#000000");
        assert_eq!(config.output.jpeg_quality, 90);
        assert_eq!(config.processing.max_concurrent, 3);
    }

    #[test]
    fn accessors_build_domain_types() {
        let mut config = AppConfig::default();
        config.selection.crop_threshold = 0.1;
        config.output.background = "#102030".to_string();
        assert_eq!(config.thresholds().crop, 0.1);
        assert_eq!(config.background(), Background([0x10, 0x20, 0x30]));
        assert_eq!(config.quality().value(), 90);
    }

    #[test]
    fn parse_presets_section() {
        let toml = r#"
[presets.snap_ad]
platform = "Snapchat"
width = 1080
height = 1920
safe_zone = { top = 150, bottom = 300 }
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let registry = config.registry().unwrap();
        let snap = registry.get("snap_ad").unwrap();
        assert_eq!(snap.safe_zone.bottom, 300);
        assert!(registry.get("instagram_square").is_some());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("adcanvas.toml")).unwrap();
        assert_eq!(config.processing.max_concurrent, 3);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("adcanvas.toml");
        fs::write(
            &path,
            r#"
[processing]
max_concurrent = 5

[regenerate]
endpoint = "https://gen.example.com/v1/recompose"
max_attempts = 4
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.processing.max_concurrent, 5);
        assert!(config.regenerate.is_enabled());
        assert_eq!(config.regenerate.max_attempts, 4);
        // Unspecified values keep defaults
        assert_eq!(config.regenerate.base_delay_ms, 2000);
        assert_eq!(config.regenerate.prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("adcanvas.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[regenerate]
max_attempts = 3
base_delay_ms = 2000
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[regenerate]
max_attempts = 5
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let regen = merged.get("regenerate").unwrap();
        assert_eq!(regen.get("max_attempts").unwrap().as_integer(), Some(5));
        assert_eq!(regen.get("base_delay_ms").unwrap().as_integer(), Some(2000));
    }

    #[test]
    fn merge_toml_adds_preset_tables() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[presets.banner]
platform = "Web"
width = 970
height = 250
"#,
        )
        .unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.presets["banner"].width, 970);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[processing]
max_concurent = 3
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[selektion]\ncrop_threshold = 0.1\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_preset_key_rejected() {
        let toml_str = r#"
[presets.x]
platform = "X"
width = 10
height = 10
depth = 3
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_threshold_order() {
        let mut config = AppConfig::default();
        config.selection.crop_threshold = 0.5;
        config.selection.padding_threshold = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("crop_threshold"));
    }

    #[test]
    fn validate_negative_threshold() {
        let mut config = AppConfig::default();
        config.selection.crop_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_concurrency() {
        let mut config = AppConfig::default();
        config.processing.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_quality_range() {
        let mut config = AppConfig::default();
        config.output.jpeg_quality = 100;
        assert!(config.validate().is_ok());
        config.output.jpeg_quality = 101;
        assert!(config.validate().is_err());
        config.output.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_background_colour() {
        let mut config = AppConfig::default();
        config.output.background = "white".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("background"));
    }

    #[test]
    fn validate_zero_attempts() {
        let mut config = AppConfig::default();
        config.regenerate.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_preset() {
        let mut config = AppConfig::default();
        config.presets.insert(
            "flat".to_string(),
            PresetSpec {
                platform: "X".to_string(),
                width: 100,
                height: 0,
                safe_zone: Default::default(),
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flat"));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("adcanvas.toml");
        fs::write(&path, "[output]\njpeg_quality = 200\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.selection.crop_threshold, 0.2);
        assert_eq!(config.selection.padding_threshold, 0.5);
        assert_eq!(config.processing.max_concurrent, 3);
        assert_eq!(config.output.background, "#ffffff");
        assert_eq!(config.regenerate.api_key_env, "ADCANVAS_API_KEY");
        assert_eq!(config.storage.root, PathBuf::from("output"));
        assert_eq!(config.store.dir, PathBuf::from("jobs"));
        config.validate().unwrap();
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[selection]",
            "[processing]",
            "[output]",
            "[regenerate]",
            "[storage]",
            "[store]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        for key in ["selection", "processing", "output", "regenerate", "storage", "store"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
