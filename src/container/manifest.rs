//! Container manifest: which entry is encrypted, with what IV, under which UUID

use crate::crypto::BLOCK_SIZE;
use crate::error::{FurrowError, Result};

/// Parsed `manifest.xml` of one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Container UUID as written, validated later by key derivation
    pub uuid: String,
    /// CBC initialisation vector
    pub iv: [u8; BLOCK_SIZE],
    /// Name (or name fragment) of the encrypted archive entry
    pub entry_name: String,
}

impl Manifest {
    /// Parse manifest XML. `uuid`, `iv` and `entry` are looked up at any depth.
    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FurrowError::MalformedManifest(format!("not UTF-8: {}", e)))?;
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| FurrowError::MalformedManifest(e.to_string()))?;

        let uuid = required_text(&doc, "uuid")?;
        let iv_hex = required_text(&doc, "iv")?;
        let entry_name = required_text(&doc, "entry")?;

        Ok(Self {
            uuid,
            iv: parse_iv(&iv_hex)?,
            entry_name,
        })
    }
}

fn required_text(doc: &roxmltree::Document<'_>, name: &str) -> Result<String> {
    let node = doc
        .descendants()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| FurrowError::MalformedManifest(format!("missing <{}> element", name)))?;

    match node.text().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(FurrowError::MalformedManifest(format!(
            "<{}> element is empty",
            name
        ))),
    }
}

fn parse_iv(iv_hex: &str) -> Result<[u8; BLOCK_SIZE]> {
    let bytes = hex::decode(iv_hex)
        .map_err(|e| FurrowError::MalformedManifest(format!("iv '{}': {}", iv_hex, e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        FurrowError::MalformedManifest(format!(
            "iv decodes to {} bytes, expected {}",
            bytes.len(),
            BLOCK_SIZE
        ))
    })
}
