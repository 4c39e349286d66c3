/*!
 * Geometry-bearing elements in a decrypted document
 *
 * Older documents keep the boundary in `<field_extent>` elements; newer ones
 * use `<geometry>` (typically under `<boundary>`). The first name that
 * appears anywhere in the document wins.
 */

use thiserror::Error;
use tracing::debug;

/// Element names searched, in priority order
pub const EXTENT_TAGS: [&str; 2] = ["field_extent", "geometry"];

/// Neither `field_extent` nor `geometry` is present. The container is still
/// processed to completion, with zero features.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no <field_extent> or <geometry> element in document")]
pub struct NoGeometryFound;

/// Base64 text of one geometry element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    /// Element name it was found under
    pub tag: &'static str,
    /// Position among the elements with that name, in document order
    pub index: usize,
    pub text: String,
}

/// Collect geometry elements from `doc` in document order.
///
/// Elements with missing or whitespace-only text are skipped one by one.
pub fn locate_extents(doc: &roxmltree::Document<'_>) -> Result<Vec<Extent>, NoGeometryFound> {
    for tag in EXTENT_TAGS {
        let elements: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name(tag))
            .collect();
        if elements.is_empty() {
            continue;
        }

        let extents = elements
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node.text().map(str::trim) {
                Some(text) if !text.is_empty() => Some(Extent {
                    tag,
                    index,
                    text: text.to_string(),
                }),
                _ => {
                    debug!("Skipping empty <{}> #{}", tag, index);
                    None
                }
            })
            .collect();
        return Ok(extents);
    }

    Err(NoGeometryFound)
}
