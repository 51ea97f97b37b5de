//! Transform executors: one strategy per [`Method`].
//!
//! | Method | Executor | Work |
//! |---|---|---|
//! | `crop` | [`CropExecutor`] | fill-resize, saliency crop (local CPU) |
//! | `padding` | [`PaddingExecutor`] | fit-resize onto a solid canvas (local CPU) |
//! | `ai_regenerate` | [`RegenerateExecutor`] | remote recomposition with retry, then conform |
//!
//! All three produce encoded bytes at exactly the preset's pixel size.
//! Only the regenerate path touches the network or is non-deterministic.

use crate::config::AppConfig;
use crate::generator::retry::RetryError;
use crate::generator::{GenerationRequest, ImageGenerator, RetryPolicy, generate_with_retry};
use crate::imaging::{
    Background, BackendError, ImageBackend, Quality, create_crop, create_padded, describe_margins,
    reduce_ratio,
};
use crate::job::MasterImage;
use crate::presets::FormatPreset;
use crate::selector::Method;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("image processing failed: {0}")]
    Image(#[from] BackendError),
    #[error("AI regeneration failed: {0}")]
    Generation(#[from] RetryError),
    #[error("AI output could not be conformed to {width}x{height}: {source}")]
    Conform {
        width: u32,
        height: u32,
        #[source]
        source: BackendError,
    },
}

/// Produces the bytes of one format from the master.
pub trait TransformExecutor: Send + Sync {
    fn method(&self) -> Method;

    fn execute(
        &self,
        master: &MasterImage,
        preset: &FormatPreset,
    ) -> Result<Vec<u8>, TransformError>;
}

/// Settings shared by the standard executors.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub quality: Quality,
    pub background: Background,
    pub retry: RetryPolicy,
    pub prompt_template: String,
}

impl ExecutorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            quality: config.quality(),
            background: config.background(),
            retry: RetryPolicy {
                max_attempts: config.regenerate.max_attempts,
                base_delay: config.regenerate.base_delay(),
            },
            prompt_template: config.regenerate.prompt.clone(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ============================================================================
// Crop
// ============================================================================

pub struct CropExecutor {
    backend: Arc<dyn ImageBackend>,
    quality: Quality,
}

impl CropExecutor {
    pub fn new(backend: Arc<dyn ImageBackend>, quality: Quality) -> Self {
        Self { backend, quality }
    }
}

impl TransformExecutor for CropExecutor {
    fn method(&self) -> Method {
        Method::Crop
    }

    fn execute(
        &self,
        master: &MasterImage,
        preset: &FormatPreset,
    ) -> Result<Vec<u8>, TransformError> {
        Ok(create_crop(
            &*self.backend,
            master.bytes(),
            preset.dimensions(),
            master.encoding(self.quality),
        )?)
    }
}

// ============================================================================
// Padding
// ============================================================================

pub struct PaddingExecutor {
    backend: Arc<dyn ImageBackend>,
    quality: Quality,
    background: Background,
}

impl PaddingExecutor {
    pub fn new(backend: Arc<dyn ImageBackend>, quality: Quality, background: Background) -> Self {
        Self {
            backend,
            quality,
            background,
        }
    }
}

impl TransformExecutor for PaddingExecutor {
    fn method(&self) -> Method {
        Method::Padding
    }

    fn execute(
        &self,
        master: &MasterImage,
        preset: &FormatPreset,
    ) -> Result<Vec<u8>, TransformError> {
        Ok(create_padded(
            &*self.backend,
            master.bytes(),
            master.dimensions(),
            preset.dimensions(),
            self.background,
            master.encoding(self.quality),
        )?)
    }
}

// ============================================================================
// AI regenerate
// ============================================================================

/// `"W:H"` in lowest terms.
pub fn aspect_label(width: u32, height: u32) -> String {
    let (w, h) = reduce_ratio(width, height);
    format!("{w}:{h}")
}

/// Fill the prompt template's placeholders for `preset`.
pub fn render_prompt(template: &str, preset: &FormatPreset) -> String {
    let sz = preset.safe_zone;
    template
        .replace("{width}", &preset.width.to_string())
        .replace("{height}", &preset.height.to_string())
        .replace("{aspect_ratio}", &aspect_label(preset.width, preset.height))
        .replace("{platform}", &preset.platform)
        .replace(
            "{safe_zone}",
            &describe_margins(sz.top, sz.bottom, sz.left, sz.right),
        )
}

pub struct RegenerateExecutor {
    backend: Arc<dyn ImageBackend>,
    generator: Arc<dyn ImageGenerator>,
    policy: RetryPolicy,
    prompt_template: String,
    quality: Quality,
}

impl RegenerateExecutor {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        generator: Arc<dyn ImageGenerator>,
        policy: RetryPolicy,
        prompt_template: String,
        quality: Quality,
    ) -> Self {
        Self {
            backend,
            generator,
            policy,
            prompt_template,
            quality,
        }
    }
}

impl TransformExecutor for RegenerateExecutor {
    fn method(&self) -> Method {
        Method::AiRegenerate
    }

    fn execute(
        &self,
        master: &MasterImage,
        preset: &FormatPreset,
    ) -> Result<Vec<u8>, TransformError> {
        let encoding = master.encoding(self.quality);
        let request = GenerationRequest {
            prompt: render_prompt(&self.prompt_template, preset),
            image: Arc::clone(master.bytes()),
            mime_type: master_mime(master),
            aspect_ratio: aspect_label(preset.width, preset.height),
        };
        let generated = generate_with_retry(&*self.generator, &request, &self.policy)?;

        // Models return roughly the requested ratio at their own resolution.
        self.backend
            .conform(&generated, preset.width, preset.height, encoding)
            .map_err(|source| TransformError::Conform {
                width: preset.width,
                height: preset.height,
                source,
            })
    }
}

fn master_mime(master: &MasterImage) -> &'static str {
    use crate::imaging::SourceFormat;
    match master.format() {
        SourceFormat::Jpeg => "image/jpeg",
        SourceFormat::Png => "image/png",
        SourceFormat::Webp => "image/webp",
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// One executor per method.
pub struct Executors {
    crop: Box<dyn TransformExecutor>,
    padding: Box<dyn TransformExecutor>,
    regenerate: Box<dyn TransformExecutor>,
}

impl Executors {
    pub fn new(
        crop: Box<dyn TransformExecutor>,
        padding: Box<dyn TransformExecutor>,
        regenerate: Box<dyn TransformExecutor>,
    ) -> Self {
        Self {
            crop,
            padding,
            regenerate,
        }
    }

    /// The production set: pixel work on `backend`, recomposition via `generator`.
    pub fn standard(
        backend: Arc<dyn ImageBackend>,
        generator: Arc<dyn ImageGenerator>,
        settings: ExecutorSettings,
    ) -> Self {
        Self::new(
            Box::new(CropExecutor::new(Arc::clone(&backend), settings.quality)),
            Box::new(PaddingExecutor::new(
                Arc::clone(&backend),
                settings.quality,
                settings.background,
            )),
            Box::new(RegenerateExecutor::new(
                backend,
                generator,
                settings.retry,
                settings.prompt_template,
                settings.quality,
            )),
        )
    }

    pub fn for_method(&self, method: Method) -> &dyn TransformExecutor {
        match method {
            Method::Crop => self.crop.as_ref(),
            Method::Padding => self.padding.as_ref(),
            Method::AiRegenerate => self.regenerate.as_ref(),
        }
    }
}
