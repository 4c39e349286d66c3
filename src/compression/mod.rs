/*!
 * Gzip decompression of decrypted container payloads
 */

use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

use crate::error::{FurrowError, Result};

/// Gzip member magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompress the first gzip member of `data`.
///
/// Anything after that member's trailer, such as CBC padding left by the
/// decryptor, is ignored rather than treated as corruption.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Err(FurrowError::Decompression(
            "payload does not start with a gzip header".to_string(),
        ));
    }

    // GzDecoder stops at the end of the first member
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| FurrowError::Decompression(format!("Gzip decompression failed: {}", e)))?;

    debug!(
        "Decompressed {} bytes -> {} bytes",
        data.len(),
        decompressed.len()
    );
    Ok(decompressed)
}
