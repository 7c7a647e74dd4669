use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use adcraft::model::config::ENV_LOG_LEVEL;

#[derive(Parser, Debug)]
#[command(name = "adcraft", version)]
struct Cli {
    /// Log at debug level regardless of configuration.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce every product x ratio variant of a campaign brief.
    Run(RunArgs),
    /// Crop and overlay one local image into every configured ratio.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Campaign brief JSON.
    #[arg(long)]
    brief: PathBuf,

    /// Pipeline configuration JSON. Defaults plus environment overrides when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (defaults to one per core).
    #[arg(long)]
    workers: Option<usize>,

    /// Override `storage.input_dir`.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Override `storage.output_dir`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Source image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory; files are named `{WxH}_{stem}.png`.
    #[arg(long)]
    out: PathBuf,

    /// Overlay text.
    #[arg(long)]
    text: String,

    /// Pipeline configuration JSON (ratios and text overlay settings).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = match &cli.cmd {
        Command::Run(a) => a.config.as_deref(),
        Command::Compose(a) => a.config.as_deref(),
    };
    init_tracing(cli.verbose, config_path);

    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

/// `--verbose`, then `RUST_LOG`, then `PIPELINE_LOG_LEVEL`, then `logging.level` from the
/// config file, then `info`.
fn init_tracing(verbose: bool, config_path: Option<&Path>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if let Ok(f) = EnvFilter::try_from_default_env() {
        f
    } else {
        let level = std::env::var(ENV_LOG_LEVEL)
            .ok()
            .or_else(|| config_path.and_then(peek_log_level))
            .unwrap_or_else(|| "info".to_owned());
        EnvFilter::try_new(level.to_ascii_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn peek_log_level(path: &Path) -> Option<String> {
    let s = std::fs::read_to_string(path).ok()?;
    let v: serde_json::Value = serde_json::from_str(&s).ok()?;
    v.pointer("/logging/level")?.as_str().map(str::to_owned)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<adcraft::PipelineConfig> {
    let cfg = match path {
        Some(p) => adcraft::PipelineConfig::load(p)
            .with_context(|| format!("load config '{}'", p.display()))?,
        None => adcraft::PipelineConfig::from_env()?,
    };
    Ok(cfg)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if args.workers.is_some() {
        config.concurrency.workers = args.workers;
    }
    if let Some(dir) = args.input_dir {
        config.storage.input_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.storage.output_dir = dir;
    }

    let brief = adcraft::CampaignBrief::load(&args.brief)
        .with_context(|| format!("load brief '{}'", args.brief.display()))?;
    let pipeline = adcraft::Pipeline::new(config)?;
    let report = pipeline.run(&brief)?;

    println!("{}", report.format_summary());
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let source = adcraft::decode_image(&bytes)
        .with_context(|| format!("decode image '{}'", args.in_path.display()))?;
    let stem = args
        .in_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_owned();

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let pipeline = adcraft::Pipeline::without_generation(config)?;
    let mut failed = 0usize;
    for spec in &pipeline.config().aspect_ratios {
        let variant = pipeline
            .render_variant(&source, spec, &args.text)
            .and_then(|img| adcraft::encode_png(&img));
        match variant {
            Ok(png) => {
                let path = args
                    .out
                    .join(format!("{}_{stem}.png", spec.ratio.file_label()));
                std::fs::write(&path, png)
                    .with_context(|| format!("write '{}'", path.display()))?;
                println!("{} -> {}", spec.ratio, path.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", spec.ratio);
            }
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
