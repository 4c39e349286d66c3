/*!
 * Error types for furrow
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FurrowError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Container- and batch-level failures.
///
/// Everything here aborts the container it occurred in. Per-blob geometry
/// problems and missing geometry are reported through
/// [`crate::geometry::GeometryDecodeError`] and
/// [`crate::extent::NoGeometryFound`] instead and never reach this type.
#[derive(Error, Debug)]
pub enum FurrowError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container is not a readable ZIP archive
    #[error("Archive error: {0}")]
    Archive(String),

    /// A required archive entry is absent
    #[error("No archive entry matching '{0}'")]
    MissingEntry(String),

    /// Manifest lacks uuid/iv/entry or carries an unusable IV
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// UUID does not hex-decode to 16 bytes
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Ciphertext cannot be decrypted
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Decrypted bytes are not a gzip stream
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Decompressed payload is not well-formed XML
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Writing the boundary dataset failed
    #[error("Output error: {0}")]
    Output(String),

    /// Another container earlier in the batch already maps to this dataset
    #[error("Dataset {} is already claimed by {}", .dataset.display(), .claimed_by.display())]
    DuplicateOutput { dataset: PathBuf, claimed_by: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool could not be built
    #[error("Parallel processing error: {0}")]
    Parallel(String),

    /// Input path is neither a container, an archive of containers, nor a directory
    #[error("Unsupported input: {}", .0.display())]
    UnsupportedInput(PathBuf),

    /// Input path given on the command line does not exist
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),
}

impl FurrowError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FurrowError::Config(_)
            | FurrowError::Parallel(_)
            | FurrowError::UnsupportedInput(_)
            | FurrowError::InputNotFound(_) => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            FurrowError::Io(_) => ErrorCategory::IoError,
            FurrowError::Archive(_) | FurrowError::MissingEntry(_) => ErrorCategory::Container,
            FurrowError::MalformedManifest(_) => ErrorCategory::Manifest,
            FurrowError::InvalidKeyMaterial(_) | FurrowError::Decryption(_) => {
                ErrorCategory::Crypto
            }
            FurrowError::Decompression(_) | FurrowError::MalformedDocument(_) => {
                ErrorCategory::Codec
            }
            FurrowError::Output(_) | FurrowError::DuplicateOutput { .. } => ErrorCategory::Output,
            FurrowError::Config(_)
            | FurrowError::UnsupportedInput(_)
            | FurrowError::InputNotFound(_) => ErrorCategory::Configuration,
            FurrowError::Parallel(_) => ErrorCategory::Concurrency,
        }
    }
}

impl From<zip::result::ZipError> for FurrowError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => FurrowError::Io(e),
            other => FurrowError::Archive(other.to_string()),
        }
    }
}

impl From<shapefile::Error> for FurrowError {
    fn from(err: shapefile::Error) -> Self {
        FurrowError::Output(err.to_string())
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// I/O operation errors
    IoError,
    /// Archive structure errors
    Container,
    /// Manifest content errors
    Manifest,
    /// Key derivation and decryption errors
    Crypto,
    /// Decompression and document parsing errors
    Codec,
    /// Dataset writing errors
    Output,
    /// Configuration and input selection errors
    Configuration,
    /// Worker pool errors
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Container => write!(f, "container"),
            ErrorCategory::Manifest => write!(f, "manifest"),
            ErrorCategory::Crypto => write!(f, "crypto"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::Output => write!(f, "output"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
        }
    }
}
