/*!
 * Per-container decode pipeline
 *
 * manifest -> key -> encrypted entry -> AES-CBC -> gunzip -> XML ->
 * geometry elements -> blobs -> rings -> WGS84 -> dataset
 *
 * Everything up to the XML parse is fatal for the container. Missing
 * geometry and undecodable blobs are recorded in the report and the
 * remaining blobs are still emitted.
 */

use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

use crate::compression::gunzip;
use crate::config::ExtractConfig;
use crate::container::Container;
use crate::crypto::{decrypt_payload, derive_key};
use crate::error::{FurrowError, Result};
use crate::extent::{locate_extents, Extent};
use crate::geometry::{decode_blob, GeometryDecodeError};
use crate::output::{remove_dataset, DatasetPaths, Feature, FeatureSink, ShapefileSink};
use crate::projection::ring_to_geodetic;

/// A blob that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct BlobFailure {
    /// Element name the blob came from
    pub tag: &'static str,
    /// Position among elements of that name
    pub index: usize,
    pub error: GeometryDecodeError,
}

/// Everything recovered from one container before output
#[derive(Debug, Clone, Default)]
pub struct DecodedContainer {
    pub features: Vec<Feature>,
    pub blob_failures: Vec<BlobFailure>,
    /// Neither `field_extent` nor `geometry` elements were present
    pub geometry_missing: bool,
    /// Geometry elements with non-empty text
    pub blobs: usize,
    /// Decoded rings without points; these get no id and are not written
    pub empty_rings: usize,
}

/// Outcome of processing one container
#[derive(Debug, Clone)]
pub struct ContainerReport {
    pub container: PathBuf,
    /// Polygons emitted (ids `0..polygons`)
    pub polygons: usize,
    /// Dataset location when one was written
    pub dataset: Option<DatasetPaths>,
    pub blob_failures: Vec<BlobFailure>,
    pub geometry_missing: bool,
    pub empty_rings: usize,
    /// The dataset already existed and `skip_existing` was set
    pub skipped_existing: bool,
    pub duration: Duration,
}

/// Decrypt and decode a container without writing anything
pub fn decode_container(path: &Path) -> Result<DecodedContainer> {
    let mut container = Container::open(path)?;

    let manifest = container.manifest()?;
    debug!("UUID: {}", manifest.uuid);
    debug!("IV: {}", hex::encode(manifest.iv));

    let key = derive_key(&manifest.uuid)?;
    debug!("Derived key: {}", key.to_hex());

    let ciphertext = container.read_entry_containing(&manifest.entry_name)?;
    let compressed = decrypt_payload(&ciphertext, &key, &manifest.iv)?;
    let xml = gunzip(&compressed)?;

    let text = document_text(&xml)?;
    let doc = roxmltree::Document::parse(&text)
        .map_err(|e| FurrowError::MalformedDocument(e.to_string()))?;

    let extents = match locate_extents(&doc) {
        Ok(extents) => extents,
        Err(e) => {
            warn!("{}", e);
            return Ok(DecodedContainer {
                geometry_missing: true,
                ..Default::default()
            });
        }
    };

    Ok(decode_extents(&extents))
}

/// Encoding label from the XML declaration, if there is one
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(&bytes[..end]);
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}

/// Decoded document text.
///
/// A byte-order mark wins; otherwise the encoding declared in the XML
/// declaration is used, and UTF-8 when there is none.
pub fn document_text(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => {
            let declared = match declared_encoding(bytes) {
                Some(label) => Some(Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                    FurrowError::MalformedDocument(format!("unknown encoding '{}'", label))
                })?),
                None => None,
            };
            // A declaration readable as ASCII rules out UTF-16 without a BOM
            let encoding = declared
                .filter(|e| e.is_ascii_compatible())
                .unwrap_or(UTF_8);
            (encoding, bytes)
        }
    };

    if encoding != UTF_8 {
        debug!("Decoding {} document", encoding.name());
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| FurrowError::MalformedDocument(format!("not valid {}", encoding.name())))
}

/// Decode every extent, numbering the resulting rings from 0 across all of them
pub fn decode_extents(extents: &[Extent]) -> DecodedContainer {
    let mut decoded = DecodedContainer {
        blobs: extents.len(),
        ..Default::default()
    };

    for extent in extents {
        match decode_blob(&extent.text) {
            Ok(blob) => {
                for polygon in blob.geometry.into_polygons() {
                    for ring in polygon.rings {
                        if ring.points.is_empty() {
                            warn!("<{}> #{} holds a ring without points", extent.tag, extent.index);
                            decoded.empty_rings += 1;
                            continue;
                        }
                        let id = decoded.features.len() as u32;
                        decoded.features.push(Feature {
                            id,
                            ring: ring_to_geodetic(&ring.points),
                        });
                    }
                }
            }
            Err(error) => {
                warn!("Skipping <{}> #{}: {}", extent.tag, extent.index, error);
                decoded.blob_failures.push(BlobFailure {
                    tag: extent.tag,
                    index: extent.index,
                    error,
                });
            }
        }
    }

    decoded
}

/// Hand features to a sink in id order
pub fn emit(features: &[Feature], sink: &mut dyn FeatureSink) -> Result<usize> {
    for feature in features {
        sink.write_feature(feature)?;
    }
    sink.finish()
}

/// Decode one container and write its boundary dataset
pub fn process_container(path: &Path, config: &ExtractConfig) -> Result<ContainerReport> {
    let span = info_span!("container", path = %path.display());
    let _enter = span.enter();
    let start = Instant::now();

    let paths = DatasetPaths::for_container(path, config);
    let mut report = ContainerReport {
        container: path.to_path_buf(),
        polygons: 0,
        dataset: None,
        blob_failures: Vec::new(),
        geometry_missing: false,
        empty_rings: 0,
        skipped_existing: false,
        duration: Duration::ZERO,
    };

    if config.skip_existing && paths.exists() {
        info!("Dataset {} exists, skipping", paths.shp.display());
        report.skipped_existing = true;
        report.duration = start.elapsed();
        return Ok(report);
    }

    info!("Processing {}", path.display());
    let decoded = decode_container(path)?;
    report.blob_failures = decoded.blob_failures;
    report.geometry_missing = decoded.geometry_missing;
    report.empty_rings = decoded.empty_rings;

    if decoded.features.is_empty() {
        info!("No polygons decoded, no dataset written");
        report.duration = start.elapsed();
        return Ok(report);
    }

    let mut sink = match ShapefileSink::create(paths.clone(), config.skip_existing) {
        Ok(sink) => sink,
        Err(FurrowError::Io(e))
            if config.skip_existing && e.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            info!("Dataset {} created concurrently, skipping", paths.shp.display());
            report.polygons = 0;
            report.skipped_existing = true;
            report.duration = start.elapsed();
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    report.polygons = match emit(&decoded.features, &mut sink) {
        Ok(written) => written,
        Err(e) => {
            drop(sink);
            remove_dataset(&paths);
            return Err(e);
        }
    };

    info!(
        "Exported {} polygons to {} (and .prj)",
        report.polygons,
        paths.shp.display()
    );
    report.dataset = Some(paths);
    report.duration = start.elapsed();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::encode::encode_blob;
    use crate::geometry::{EcefPoint, Geometry, MultiPart, Polygon, Ring};
    use crate::logging::init_test_logging;

    fn extent(index: usize, text: String) -> Extent {
        Extent {
            tag: "field_extent",
            index,
            text,
        }
    }

    fn ring(n: usize) -> Ring {
        Ring::new(
            (0..n)
                .map(|i| EcefPoint::new(6378137.0 - i as f64, i as f64 * 100.0, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_ids_run_across_blobs() {
        init_test_logging();
        let extents = vec![
            extent(0, encode_blob(&Geometry::Polygon(Polygon::from_ring(ring(3))))),
            extent(
                1,
                encode_blob(&Geometry::MultiPolygon(vec![
                    MultiPart {
                        nested_tag: true,
                        polygon: Polygon::from_ring(ring(4)),
                    },
                    MultiPart {
                        nested_tag: false,
                        polygon: Polygon::from_ring(ring(5)),
                    },
                ])),
            ),
            extent(2, encode_blob(&Geometry::Ring(ring(6)))),
        ];

        let decoded = decode_extents(&extents);
        assert_eq!(decoded.blobs, 3);
        assert!(decoded.blob_failures.is_empty());

        let ids: Vec<u32> = decoded.features.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        let sizes: Vec<usize> = decoded.features.iter().map(|f| f.ring.len()).collect();
        assert_eq!(sizes, vec![3, 4, 5, 6]);

        let first = decoded.features[0].ring[0];
        assert!(first.lon.abs() < 1e-9 && first.lat.abs() < 1e-9);
    }

    #[test]
    fn test_bad_blob_isolated() {
        init_test_logging();
        let extents = vec![
            extent(0, encode_blob(&Geometry::Ring(ring(2)))),
            extent(1, "AugDAAA=".to_string()), // ring claiming 1000 points, none present
            extent(2, "%%%".to_string()),
            extent(3, encode_blob(&Geometry::Ring(ring(1)))),
        ];

        let decoded = decode_extents(&extents);
        assert_eq!(decoded.features.len(), 2);
        assert_eq!(decoded.features[1].id, 1);
        assert_eq!(decoded.blob_failures.len(), 2);
        assert_eq!(decoded.blob_failures[0].index, 1);
        assert!(matches!(
            decoded.blob_failures[0].error,
            GeometryDecodeError::Truncated { .. }
        ));
        assert!(matches!(
            decoded.blob_failures[1].error,
            GeometryDecodeError::Base64(_)
        ));
    }

    #[test]
    fn test_empty_rings_get_no_id() {
        init_test_logging();
        let extents = vec![
            extent(0, "AgAAAAA=".to_string()), // ring with zero points
            extent(
                1,
                encode_blob(&Geometry::MultiPolygon(vec![
                    MultiPart {
                        nested_tag: true,
                        polygon: Polygon::from_ring(Ring::default()),
                    },
                    MultiPart {
                        nested_tag: true,
                        polygon: Polygon::from_ring(ring(3)),
                    },
                ])),
            ),
        ];

        let decoded = decode_extents(&extents);
        assert!(decoded.blob_failures.is_empty());
        assert_eq!(decoded.empty_rings, 2);
        assert_eq!(decoded.features.len(), 1);
        assert_eq!(decoded.features[0].id, 0);
        assert_eq!(decoded.features[0].ring.len(), 3);
    }

    #[test]
    fn test_document_text_encodings() {
        let plain = document_text(b"<farm>Wiese</farm>").unwrap();
        assert!(matches!(plain, Cow::Borrowed("<farm>Wiese</farm>")));

        let bom = document_text(b"\xEF\xBB\xBF<farm/>").unwrap();
        assert_eq!(bom, "<farm/>");

        let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><name>M\xFChlenfeld</name>";
        assert_eq!(
            document_text(latin1).unwrap(),
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><name>M\u{fc}hlenfeld</name>"
        );

        let text = "<?xml version='1.0' encoding='UTF-16'?><name>Ch\u{e2}teau</name>";
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(document_text(&le).unwrap(), text);
        assert_eq!(document_text(&be).unwrap(), text);

        let sjis = b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><a>\x93\xfa</a>";
        assert_eq!(
            document_text(sjis).unwrap(),
            "<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><a>\u{65e5}</a>"
        );

        assert!(matches!(
            document_text(b"<?xml version=\"1.0\" encoding=\"x-martian\"?><a/>"),
            Err(FurrowError::MalformedDocument(_))
        ));
        assert!(matches!(
            document_text(b"<name>M\xFChle</name>"),
            Err(FurrowError::MalformedDocument(_))
        ));
        assert!(document_text(&le[..le.len() - 1]).is_err());
    }

    struct CollectingSink {
        features: Vec<Feature>,
        finished: bool,
    }

    impl FeatureSink for CollectingSink {
        fn write_feature(&mut self, feature: &Feature) -> Result<()> {
            self.features.push(feature.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<usize> {
            self.finished = true;
            Ok(self.features.len())
        }
    }

    #[test]
    fn test_emit_in_order() {
        let decoded = decode_extents(&[extent(
            0,
            encode_blob(&Geometry::MultiPolygon(vec![
                MultiPart {
                    nested_tag: false,
                    polygon: Polygon::from_ring(ring(1)),
                },
                MultiPart {
                    nested_tag: false,
                    polygon: Polygon::from_ring(ring(2)),
                },
            ])),
        )]);

        let mut sink = CollectingSink {
            features: Vec::new(),
            finished: false,
        };
        assert_eq!(emit(&decoded.features, &mut sink).unwrap(), 2);
        assert!(sink.finished);
        assert_eq!(sink.features, decoded.features);
    }
}
