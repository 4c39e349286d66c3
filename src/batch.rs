/*!
 * Batch driver
 *
 * Turns command-line inputs into a list of containers and runs them on a
 * worker pool. Inputs may be `.agf` containers, `.zip` archives holding
 * containers (unpacked first), or directories searched recursively for both.
 * A failing container is reported and never stops the rest.
 */

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::ExtractConfig;
use crate::error::{FurrowError, Result, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::output::DatasetPaths;
use crate::pipeline::{process_container, ContainerReport};

pub const CONTAINER_EXTENSION: &str = "agf";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Result of one container in a batch, with the container identity attached
#[derive(Debug)]
pub struct ContainerOutcome {
    pub path: PathBuf,
    pub result: Result<ContainerReport>,
}

/// Totals over a batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ContainerOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_polygons: usize,
}

impl BatchSummary {
    fn from_outcomes(outcomes: Vec<ContainerOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(report) if report.skipped_existing => summary.skipped += 1,
                Ok(report) => {
                    summary.succeeded += 1;
                    summary.total_polygons += report.polygons;
                }
                Err(_) => summary.failed += 1,
            }
        }
        summary.outcomes = outcomes;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Process exit code: success when nothing failed, fatal when every
    /// container failed, partial otherwise
    pub fn exit_code(&self) -> i32 {
        if !self.has_failures() {
            EXIT_SUCCESS
        } else if self.succeeded == 0 && self.skipped == 0 {
            EXIT_FATAL
        } else {
            EXIT_PARTIAL
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

pub fn is_container(path: &Path) -> bool {
    has_extension(path, CONTAINER_EXTENSION)
}

pub fn is_archive(path: &Path) -> bool {
    has_extension(path, ARCHIVE_EXTENSION)
}

/// Expand inputs into container paths, unpacking archives along the way.
///
/// Order follows the inputs; directory contents are sorted by name. Archives
/// that fail to unpack are logged and skipped.
pub fn collect_containers(inputs: &[PathBuf], config: &ExtractConfig) -> Result<Vec<PathBuf>> {
    let mut containers = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if is_container(path) {
                    containers.push(path.to_path_buf());
                } else if is_archive(path) {
                    containers.extend(containers_from_archive(path, config));
                }
            }
        } else if is_container(input) {
            containers.push(input.clone());
        } else if is_archive(input) {
            containers.extend(containers_from_archive(input, config));
        } else if input.exists() {
            return Err(FurrowError::UnsupportedInput(input.clone()));
        } else {
            return Err(FurrowError::InputNotFound(input.clone()));
        }
    }

    Ok(containers)
}

fn containers_from_archive(archive: &Path, config: &ExtractConfig) -> Vec<PathBuf> {
    match extract_archive(archive, config) {
        Ok(dir) => {
            let found: Vec<PathBuf> = WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_container(e.path()))
                .map(|e| e.into_path())
                .collect();
            info!(
                "Found {} containers in {}",
                found.len(),
                archive.display()
            );
            found
        }
        Err(e) => {
            error!("Failed to extract {}: {}", archive.display(), e);
            Vec::new()
        }
    }
}

/// Directory an outer archive is unpacked into
pub fn extraction_dir(archive: &Path, config: &ExtractConfig) -> PathBuf {
    let name = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = config
        .extract_dir
        .clone()
        .or_else(|| archive.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    parent.join(format!("extracted_{}", name))
}

/// Unpack an outer archive; an existing extraction directory is reused
pub fn extract_archive(archive: &Path, config: &ExtractConfig) -> Result<PathBuf> {
    let dir = extraction_dir(archive, config);
    std::fs::create_dir_all(&dir)?;
    info!("Extracting {} to {}", archive.display(), dir.display());

    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    zip.extract(&dir)?;
    Ok(dir)
}

/// Map each container to the dataset it would write.
///
/// The first container to reach a dataset path owns it. Later containers
/// with the same path get [`FurrowError::DuplicateOutput`] instead of a slot,
/// so two workers never write the same files.
fn claim_outputs(containers: &[PathBuf], config: &ExtractConfig) -> Vec<Option<FurrowError>> {
    let mut owners: HashMap<PathBuf, &PathBuf> = HashMap::new();
    containers
        .iter()
        .map(|path| {
            let dataset = DatasetPaths::for_container(path, config).shp;
            match owners.get(&dataset) {
                Some(owner) => {
                    warn!(
                        "{} and {} both map to {}",
                        owner.display(),
                        path.display(),
                        dataset.display()
                    );
                    Some(FurrowError::DuplicateOutput {
                        dataset,
                        claimed_by: (*owner).clone(),
                    })
                }
                None => {
                    owners.insert(dataset, path);
                    None
                }
            }
        })
        .collect()
}

/// Process containers on a pool of `config.workers` threads.
///
/// Outcomes come back in the order of `containers`.
pub fn run_batch(containers: &[PathBuf], config: &ExtractConfig) -> Result<BatchSummary> {
    let mut conflicts = claim_outputs(containers, config);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_workers())
        .build()
        .map_err(|e| FurrowError::Parallel(e.to_string()))?;

    let progress = if config.show_progress {
        let pb = ProgressBar::new(containers.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} containers ({eta})")
                .map_err(|e| FurrowError::Config(e.to_string()))?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let outcomes: Vec<ContainerOutcome> = pool.install(|| {
        containers
            .par_iter()
            .zip(conflicts.par_iter_mut())
            .map(|(path, conflict)| {
                let result = match conflict.take() {
                    Some(e) => Err(e),
                    None => process_container(path, config),
                };
                if let Err(ref e) = result {
                    warn!("{} failed ({}): {}", path.display(), e.category(), e);
                }
                if let Some(ref pb) = progress {
                    pb.inc(1);
                }
                ContainerOutcome {
                    path: path.clone(),
                    result,
                }
            })
            .collect()
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    Ok(BatchSummary::from_outcomes(outcomes))
}
