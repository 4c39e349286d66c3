/*!
 * AGF container access
 *
 * An AGF file is a ZIP archive holding a `manifest.xml` (usually inside a
 * folder) and an encrypted data entry whose name the manifest records.
 */

pub mod manifest;

pub use manifest::Manifest;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{FurrowError, Result};

/// Suffix identifying the manifest entry
pub const MANIFEST_SUFFIX: &str = "manifest.xml";

/// An opened container archive
pub struct Container<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl Container<BufReader<File>> {
    /// Open a container file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> Container<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        Ok(Self { archive })
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Locate and parse the manifest
    pub fn manifest(&mut self) -> Result<Manifest> {
        let name = self
            .find_entry(|name| name.ends_with(MANIFEST_SUFFIX))
            .ok_or_else(|| FurrowError::MissingEntry(MANIFEST_SUFFIX.to_string()))?;
        debug!("Manifest entry: {}", name);

        let bytes = self.read_entry(&name)?;
        Manifest::from_xml(&bytes)
    }

    /// Read the first file entry whose path contains `fragment`.
    ///
    /// Manifests do not always record the full archive path, so a
    /// containment match is used rather than equality.
    pub fn read_entry_containing(&mut self, fragment: &str) -> Result<Vec<u8>> {
        let name = self
            .find_entry(|name| !name.ends_with('/') && name.contains(fragment))
            .ok_or_else(|| FurrowError::MissingEntry(fragment.to_string()))?;
        debug!("Payload entry: {}", name);

        self.read_entry(&name)
    }

    fn find_entry(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        // file_names() is unordered; keep archive order so the first match is stable
        (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i))
            .find(|name| predicate(name))
            .map(str::to_string)
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(name)?;
        // The declared size comes from the archive and is not trusted for allocation
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
