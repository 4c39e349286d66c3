/*!
 * Furrow - field boundary extraction from AGF containers
 *
 * Recovers field boundary polygons from encrypted farm-management exports:
 * - ZIP container with an XML manifest (uuid, iv, entry)
 * - AES-128-CBC payload keyed by the manifest UUID
 * - Gzip-compressed XML carrying base64 binary geometry
 * - ECEF to WGS84 conversion and polygon shapefile output
 * - Parallel batch runs over files, directories, and outer ZIP archives
 *
 * Version: 0.1.0
 */

pub mod batch;
pub mod compression;
pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod projection;

// Re-export commonly used types
pub use batch::{collect_containers, run_batch, BatchSummary, ContainerOutcome};
pub use config::{ExtractConfig, LogLevel};
pub use error::{FurrowError, Result};
pub use geometry::{decode_blob, decode_geometry, Geometry, GeometryDecodeError};
pub use pipeline::{decode_container, process_container, BlobFailure, ContainerReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
