use adcanvas::config::{self, AppConfig};
use adcanvas::executor::{ExecutorSettings, Executors};
use adcanvas::generator::{HttpGenerator, ImageGenerator, UnavailableGenerator};
use adcanvas::imaging::{ImageBackend, RustBackend};
use adcanvas::job::{JobStatus, JobSubmission};
use adcanvas::orchestrator::{BatchOrchestrator, OrchestratorParts};
use adcanvas::selector::MethodSelector;
use adcanvas::storage::FsStorage;
use adcanvas::store::{JsonFileStore, MemoryStore, StatusStore};
use adcanvas::{logging, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Master image and target formats shared by `plan` and `run`.
#[derive(clap::Args, Clone)]
struct JobArgs {
    /// Master image (JPEG, PNG or WebP)
    #[arg(long)]
    image: PathBuf,

    /// Format id to produce; repeat or comma-separate for several
    #[arg(long = "format", short = 'f', required = true, value_delimiter = ',')]
    formats: Vec<String>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "adcanvas")]
#[command(about = "Resize one master image into many ad formats")]
#[command(long_about = "\
Resize one master image into many ad formats

Each requested format is produced by the cheapest method that fits the
aspect-ratio change from the master:

  delta < crop threshold (0.2)       crop       fill-resize, keep the busiest window
  delta < padding threshold (0.5)    padding    fit-resize onto a solid background
  otherwise                          ai_regenerate  recompose with the image service

Formats run in parallel (processing.max_concurrent, default 3). One failing
format never stops the others; the job is `completed` only if every format
completed.

Artifacts land under <storage.root>/jobs/<job-id>/<format>.<ext> and job
status is kept as JSON under <store.dir>.

Run 'adcanvas gen-config' to generate a documented adcanvas.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults are used when it does not exist)
    #[arg(long, default_value = "adcanvas.toml", global = true)]
    config: PathBuf,

    /// Log debug detail to stderr (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured format presets
    Formats,
    /// Show which method each format would use, without producing anything
    Plan(JobArgs),
    /// Produce every requested format and record the job
    Run {
        #[command(flatten)]
        job: JobArgs,
        /// Job id (letters, digits, '-' and '_'); generated when omitted
        #[arg(long)]
        job_id: Option<String>,
        /// Owner recorded on the job
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show the recorded state of a job
    Status {
        job_id: String,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock adcanvas.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Command::Formats => {
            let config = config::load_config(&cli.config)?;
            output::print_formats(&config.registry()?);
        }
        Command::Plan(args) => {
            let config = config::load_config(&cli.config)?;
            // Planning never persists the job.
            let orchestrator = build_orchestrator(&config, Arc::new(MemoryStore::new()))?;
            let job = orchestrator.submit(submission(&args, None, None)?)?;
            output::print_plan(&job, &orchestrator.plan(&job)?);
        }
        Command::Run { job, job_id, owner } => {
            let config = config::load_config(&cli.config)?;
            let store = Arc::new(JsonFileStore::open(&config.store.dir)?);
            let orchestrator = build_orchestrator(&config, store)?;
            let mut resize_job = orchestrator.submit(submission(&job, job_id, owner)?)?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_progress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let status = orchestrator.process_job(&mut resize_job, Some(tx));
            if printer.join().is_err() {
                warn!("progress printer panicked");
            }
            let status = status?;

            println!();
            output::print_snapshot(&orchestrator.store().snapshot(&resize_job.id)?);
            if status == JobStatus::Failed {
                std::process::exit(1);
            }
        }
        Command::Status { job_id, json } => {
            let config = config::load_config(&cli.config)?;
            let store = JsonFileStore::open(&config.store.dir)?;
            let snapshot = store.snapshot(&job_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                output::print_snapshot(&snapshot);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn submission(
    args: &JobArgs,
    job_id: Option<String>,
    owner: Option<String>,
) -> Result<JobSubmission, std::io::Error> {
    Ok(JobSubmission {
        job_id,
        owner,
        image: read_image(&args.image)?,
        formats: args.formats.clone(),
    })
}

fn read_image(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    std::fs::read(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("cannot read {}: {}", path.display(), e))
    })
}

/// Wire the production collaborators described by `config`.
fn build_orchestrator(
    config: &AppConfig,
    store: Arc<dyn StatusStore>,
) -> Result<BatchOrchestrator, Box<dyn std::error::Error>> {
    let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());
    let generator = build_generator(config)?;
    let executors = Executors::standard(
        Arc::clone(&backend),
        generator,
        ExecutorSettings::from_config(config),
    );

    let orchestrator = BatchOrchestrator::new(OrchestratorParts {
        registry: Arc::new(config.registry()?),
        selector: MethodSelector::new(config.thresholds()),
        executors,
        backend,
        storage: Arc::new(FsStorage::new(
            &config.storage.root,
            config.storage.public_base_url.as_str(),
        )),
        store,
        quality: config.quality(),
        max_concurrent: config.processing.max_concurrent,
    })?;
    Ok(orchestrator)
}

fn build_generator(
    config: &AppConfig,
) -> Result<Arc<dyn ImageGenerator>, Box<dyn std::error::Error>> {
    let regenerate = &config.regenerate;
    if !regenerate.is_enabled() {
        return Ok(Arc::new(UnavailableGenerator));
    }
    let api_key = regenerate.api_key();
    if api_key.is_none() {
        warn!(
            env = %regenerate.api_key_env,
            "no API key in environment; AI regeneration will fail"
        );
    }
    let generator = HttpGenerator::new(
        regenerate.endpoint.as_str(),
        api_key,
        regenerate.model.as_str(),
        regenerate.timeout(),
    )?;
    Ok(Arc::new(generator))
}
