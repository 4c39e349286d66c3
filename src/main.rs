/*!
 * Furrow CLI
 *
 * Extracts field boundaries from AGF containers, archives of containers, or
 * directory trees of either, writing one shapefile per container.
 */

use clap::{Parser, ValueEnum};
use furrow::{
    batch::{collect_containers, run_batch, BatchSummary},
    config::{ExtractConfig, LogLevel},
    error::{FurrowError, Result},
    logging,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "furrow")]
#[command(version, about = "Extract field boundaries from AGF containers to shapefiles", long_about = None)]
struct Cli {
    /// Containers (.agf), archives of containers (.zip), or directories
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// TOML configuration file; command-line flags override it
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write datasets here instead of next to each container
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Suffix appended to the container name for the dataset
    #[arg(long = "suffix", value_name = "SUFFIX")]
    suffix: Option<String>,

    /// Unpack outer archives under this directory
    #[arg(long = "extract-dir", value_name = "DIR")]
    extract_dir: Option<PathBuf>,

    /// Worker threads (0 = CPU count)
    #[arg(short = 'j', long = "workers", value_name = "N")]
    workers: Option<usize>,

    /// Skip containers whose dataset already exists
    #[arg(long)]
    skip_existing: bool,

    /// Log level
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Log to file (JSON lines) instead of stdout
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose output (debug level)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

impl Cli {
    /// Layer command-line flags over the loaded configuration
    fn apply(&self, config: &mut ExtractConfig) {
        if let Some(ref dir) = self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(ref suffix) = self.suffix {
            config.output_suffix = suffix.clone();
        }
        if let Some(ref dir) = self.extract_dir {
            config.extract_dir = Some(dir.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(level) = self.log_level {
            config.log_level = level.into();
        }
        if let Some(ref log) = self.log {
            config.log_file = Some(log.clone());
        }
        config.skip_existing |= self.skip_existing;
        config.verbose |= self.verbose;
        config.show_progress |= self.progress;
    }
}

fn run() -> Result<BatchSummary> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => ExtractConfig::from_file(path)?,
        None => ExtractConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let containers = collect_containers(&cli.inputs, &config)?;
    if containers.is_empty() {
        return Err(FurrowError::Config(
            "no .agf containers found in the given inputs".to_string(),
        ));
    }
    info!("Processing {} containers", containers.len());

    let summary = run_batch(&containers, &config)?;
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &BatchSummary) {
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(report) if report.skipped_existing => {
                println!("[skip] {}: dataset exists", outcome.path.display());
            }
            Ok(report) => {
                let target = report
                    .dataset
                    .as_ref()
                    .map(|d| d.shp.display().to_string())
                    .unwrap_or_else(|| "no dataset written".to_string());
                let mut line = format!(
                    "[ok]   {}: {} polygons -> {}",
                    outcome.path.display(),
                    report.polygons,
                    target
                );
                if !report.blob_failures.is_empty() {
                    line.push_str(&format!(" ({} blobs failed)", report.blob_failures.len()));
                }
                if report.empty_rings > 0 {
                    line.push_str(&format!(" ({} empty rings)", report.empty_rings));
                }
                if report.geometry_missing {
                    line.push_str(" (no geometry elements)");
                }
                println!("{}", line);
            }
            Err(e) => {
                println!("[fail] {}: {} error: {}", outcome.path.display(), e.category(), e);
            }
        }
    }

    println!(
        "\n{} succeeded, {} failed, {} skipped; {} polygons total",
        summary.succeeded, summary.failed, summary.skipped, summary.total_polygons
    );
}
