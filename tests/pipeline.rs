//! End-to-end runs through the public API: real imaging backend, artifacts
//! on disk, job status in JSON files. Only the generative image service is
//! replaced by an in-process stand-in.
//!
//! Run with: cargo test --test pipeline

use adcanvas::config::{self, AppConfig};
use adcanvas::executor::{ExecutorSettings, Executors};
use adcanvas::generator::{
    FailureKind, GenerationError, GenerationRequest, ImageGenerator,
};
use adcanvas::imaging::{ImageBackend, RustBackend};
use adcanvas::job::{FormatStatus, JobStatus, JobSubmission};
use adcanvas::orchestrator::{BatchOrchestrator, OrchestratorParts};
use adcanvas::selector::{Method, MethodSelector};
use adcanvas::storage::FsStorage;
use adcanvas::store::{JsonFileStore, StatusStore};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;

const OVERLAY: &str = r##"
[processing]
max_concurrent = 2

[regenerate]
max_attempts = 2
base_delay_ms = 0

[storage]
public_base_url = "https://cdn.example.test/ads"

[presets.wide]
platform = "Test"
width = 320
height = 180

[presets.rect]
platform = "Test"
width = 300
height = 200

[presets.banner]
platform = "Test"
width = 728
height = 90
"##;

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn dims_on_disk(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

/// Stand-in for the image service: answers from a fixed outcome and keeps
/// every request it saw.
struct LocalGenerator {
    outcome: Result<Vec<u8>, GenerationError>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl LocalGenerator {
    fn returning(bytes: Vec<u8>) -> Self {
        Self {
            outcome: Ok(bytes),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(kind: FailureKind) -> Self {
        Self {
            outcome: Err(GenerationError::new(kind, "service said no")),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ImageGenerator for LocalGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

struct Setup {
    _tmp: TempDir,
    config: AppConfig,
    orchestrator: BatchOrchestrator,
    store: Arc<JsonFileStore>,
    generator: Arc<LocalGenerator>,
}

fn setup(generator: LocalGenerator) -> Setup {
    let tmp = TempDir::new().unwrap();
    let overlay: toml::Value = toml::from_str(OVERLAY).unwrap();
    let mut config =
        config::resolve_config(config::stock_defaults_value().unwrap(), Some(overlay)).unwrap();
    config.storage.root = tmp.path().join("artifacts");
    config.store.dir = tmp.path().join("jobs");

    let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());
    let generator = Arc::new(generator);
    let generator_dyn: Arc<dyn ImageGenerator> = generator.clone();
    let store = Arc::new(JsonFileStore::open(&config.store.dir).unwrap());
    let orchestrator = BatchOrchestrator::new(OrchestratorParts {
        registry: Arc::new(config.registry().unwrap()),
        selector: MethodSelector::new(config.thresholds()),
        executors: Executors::standard(
            Arc::clone(&backend),
            generator_dyn,
            ExecutorSettings::from_config(&config),
        ),
        backend,
        storage: Arc::new(FsStorage::new(
            &config.storage.root,
            config.storage.public_base_url.as_str(),
        )),
        store: store.clone(),
        quality: config.quality(),
        max_concurrent: config.processing.max_concurrent,
    })
    .unwrap();

    Setup {
        _tmp: tmp,
        config,
        orchestrator,
        store,
        generator,
    }
}

fn submission(job_id: &str) -> JobSubmission {
    JobSubmission {
        job_id: Some(job_id.to_string()),
        owner: Some("campaign-7".to_string()),
        image: jpeg(640, 360),
        formats: vec!["wide".into(), "rect".into(), "banner".into()],
    }
}

#[test]
fn every_format_lands_on_disk_at_exact_size() {
    let s = setup(LocalGenerator::returning(jpeg(512, 64)));
    let mut job = s.orchestrator.submit(submission("spring-sale")).unwrap();

    let status = s.orchestrator.process_job(&mut job, None).unwrap();
    assert_eq!(status, JobStatus::Completed);

    let root = &s.config.storage.root;
    assert_eq!(dims_on_disk(&root.join("jobs/spring-sale/wide.jpg")), (320, 180));
    assert_eq!(dims_on_disk(&root.join("jobs/spring-sale/rect.jpg")), (300, 200));
    assert_eq!(dims_on_disk(&root.join("jobs/spring-sale/banner.jpg")), (728, 90));

    let snapshot = s.store.snapshot("spring-sale").unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert!(snapshot.completed_at.is_some());
    let methods: Vec<_> = snapshot
        .format_results
        .iter()
        .map(|r| (r.format_id.as_str(), r.method))
        .collect();
    assert_eq!(
        methods,
        vec![
            ("banner", Some(Method::AiRegenerate)),
            ("rect", Some(Method::Padding)),
            ("wide", Some(Method::Crop)),
        ]
    );
    assert_eq!(
        snapshot.format_results[2].result_url.as_deref(),
        Some("https://cdn.example.test/ads/jobs/spring-sale/wide.jpg")
    );

    let requests = s.generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].aspect_ratio, "364:45");
    assert_eq!(requests[0].mime_type, "image/jpeg");
}

#[test]
fn failed_regeneration_keeps_sibling_artifacts() {
    let s = setup(LocalGenerator::failing(FailureKind::Server));
    let mut job = s.orchestrator.submit(submission("partial")).unwrap();

    let status = s.orchestrator.process_job(&mut job, None).unwrap();
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(s.generator.calls(), 2);

    let root = &s.config.storage.root;
    assert!(root.join("jobs/partial/wide.jpg").exists());
    assert!(root.join("jobs/partial/rect.jpg").exists());
    assert!(!root.join("jobs/partial/banner.jpg").exists());

    let snapshot = s.store.snapshot("partial").unwrap();
    assert_eq!(snapshot.count(FormatStatus::Completed), 2);
    assert_eq!(snapshot.count(FormatStatus::Failed), 1);
    let banner = &snapshot.format_results[0];
    assert_eq!(banner.format_id, "banner");
    let message = banner.error_message.as_deref().unwrap();
    assert!(message.contains("after 2 attempts"), "{message}");
}

#[test]
fn auth_failure_is_not_retried() {
    let s = setup(LocalGenerator::failing(FailureKind::Auth));
    let mut job = s.orchestrator.submit(submission("no-key")).unwrap();

    s.orchestrator.process_job(&mut job, None).unwrap();
    assert_eq!(s.generator.calls(), 1);
}

#[test]
fn rerun_overwrites_instead_of_duplicating() {
    let s = setup(LocalGenerator::returning(jpeg(512, 64)));
    let mut first = s.orchestrator.submit(submission("again")).unwrap();
    s.orchestrator.process_job(&mut first, None).unwrap();
    let mut second = s.orchestrator.submit(submission("again")).unwrap();
    s.orchestrator.process_job(&mut second, None).unwrap();

    assert_eq!(s.store.results("again").unwrap().len(), 3);
    let job_dir = s.config.storage.root.join("jobs/again");
    let mut files: Vec<String> = std::fs::read_dir(&job_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["banner.jpg", "rect.jpg", "wide.jpg"]);
}

#[test]
fn snapshot_json_is_camel_case() {
    let s = setup(LocalGenerator::returning(jpeg(512, 64)));
    let mut job = s.orchestrator.submit(submission("json-view")).unwrap();
    s.orchestrator.process_job(&mut job, None).unwrap();

    let json = serde_json::to_value(s.store.snapshot("json-view").unwrap()).unwrap();
    assert_eq!(json["jobId"], "json-view");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["formatResults"].as_array().unwrap().len(), 3);
    assert_eq!(json["formatResults"][2]["method"], "crop");
    assert!(json["formatResults"][2]["resultUrl"].is_string());
}
