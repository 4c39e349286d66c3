/*!
 * Configuration types for furrow
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FurrowError, Result};

/// Main configuration for extraction runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Directory for boundary datasets (None = next to each container)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Appended to the container stem to name the dataset
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Leave containers alone whose dataset already exists
    #[serde(default)]
    pub skip_existing: bool,

    /// Where outer ZIP archives are unpacked (None = `extracted_<name>` next to the archive)
    #[serde(default)]
    pub extract_dir: Option<PathBuf>,

    /// Number of worker threads for batch runs (0 = CPU count)
    #[serde(default)]
    pub workers: usize,

    /// Show progress bar during batch runs
    #[serde(default)]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            output_suffix: default_output_suffix(),
            skip_existing: false,
            extract_dir: None,
            workers: 0,
            show_progress: false,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_output_suffix() -> String {
    "_boundary".to_string()
}

impl ExtractConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FurrowError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| FurrowError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| FurrowError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Worker count with `0` resolved to the number of available cores
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            get_cpu_count()
        }
    }
}

/// Get the number of available CPU cores
fn get_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
