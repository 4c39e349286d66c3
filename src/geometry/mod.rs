/*!
 * Field geometry carried inside decrypted AGF documents
 *
 * Each geometry element holds base64 text that decodes to a small binary
 * structure: a one-byte type tag followed by little-endian counts and ECEF
 * points (three f64 each). See [`decode`] for the grammar.
 */

pub mod cursor;
pub mod decode;
#[cfg(test)]
pub mod encode;

pub use cursor::Cursor;
pub use decode::{decode_blob, decode_geometry, Decoded};

use thiserror::Error;

/// Type tags found at offset 0 of a blob
pub mod tag {
    pub const POINT: u8 = 0;
    pub const LINE: u8 = 1;
    pub const RING: u8 = 2;
    pub const POLYGON: u8 = 3;
    pub const MULTI_POLYGON: u8 = 4;
}

/// Earth-centred, earth-fixed coordinate in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EcefPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Ordered points of one boundary loop
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ring {
    pub points: Vec<EcefPoint>,
}

impl Ring {
    pub fn new(points: Vec<EcefPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A polygon as a list of rings. Decoded polygons always hold exactly one
/// ring; outer/inner relationships are not modelled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub rings: Vec<Ring>,
}

impl Polygon {
    pub fn from_ring(ring: Ring) -> Self {
        Self { rings: vec![ring] }
    }
}

/// One entry of a multipolygon blob
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPart {
    /// Whether the entry started with the optional `0x03` sub-type byte
    pub nested_tag: bool,
    pub polygon: Polygon,
}

/// A decoded blob
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Tag 0 (point) or 1 (line). Neither encloses an area, so no body is
    /// read and no rings come out.
    NoRings { tag: u8 },
    /// Tag 2
    Ring(Ring),
    /// Tag 3
    Polygon(Polygon),
    /// Tag 4
    MultiPolygon(Vec<MultiPart>),
}

impl Geometry {
    /// The type tag this geometry is encoded with
    pub fn type_tag(&self) -> u8 {
        match self {
            Geometry::NoRings { tag } => *tag,
            Geometry::Ring(_) => tag::RING,
            Geometry::Polygon(_) => tag::POLYGON,
            Geometry::MultiPolygon(_) => tag::MULTI_POLYGON,
        }
    }

    /// Flatten into single-ring polygons, one per decoded ring.
    ///
    /// Points and lines yield nothing.
    pub fn into_polygons(self) -> Vec<Polygon> {
        match self {
            Geometry::NoRings { .. } => Vec::new(),
            Geometry::Ring(ring) => vec![Polygon::from_ring(ring)],
            Geometry::Polygon(polygon) => split_rings(polygon),
            Geometry::MultiPolygon(parts) => parts
                .into_iter()
                .flat_map(|part| split_rings(part.polygon))
                .collect(),
        }
    }
}

fn split_rings(polygon: Polygon) -> Vec<Polygon> {
    polygon.rings.into_iter().map(Polygon::from_ring).collect()
}

/// Failure to decode one blob. Only that blob is lost; the container
/// carries on with its other geometry elements.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryDecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("blob is empty")]
    Empty,

    #[error("unsupported geometry type {0}")]
    UnsupportedType(u8),

    #[error("truncated {what} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A multipolygon entry began with `0x03`, which was taken as a nested
    /// type tag, and the entry then ran past the end of the blob. Real data
    /// may have had a point count starting with that byte instead.
    #[error("multipolygon part {part} overran the blob after a nested type tag at offset {tag_offset}: {source}")]
    NestedTagOverrun {
        part: usize,
        tag_offset: usize,
        source: Box<GeometryDecodeError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Ring {
        Ring::new(
            (0..n)
                .map(|i| EcefPoint::new(i as f64, 0.0, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_into_polygons_single_ring_each() {
        assert!(Geometry::NoRings { tag: tag::POINT }
            .into_polygons()
            .is_empty());
        assert!(Geometry::NoRings { tag: tag::LINE }
            .into_polygons()
            .is_empty());

        let polygons = Geometry::Ring(ring(3)).into_polygons();
        assert_eq!(polygons, vec![Polygon::from_ring(ring(3))]);

        let multi = Geometry::MultiPolygon(vec![
            MultiPart {
                nested_tag: true,
                polygon: Polygon::from_ring(ring(1)),
            },
            MultiPart {
                nested_tag: false,
                polygon: Polygon {
                    rings: vec![ring(2), ring(4)],
                },
            },
        ]);
        let polygons = multi.into_polygons();
        assert_eq!(polygons.len(), 3);
        assert!(polygons.iter().all(|p| p.rings.len() == 1));
        assert_eq!(polygons[2].rings[0].len(), 4);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(Geometry::NoRings { tag: 1 }.type_tag(), 1);
        assert_eq!(Geometry::Ring(Ring::default()).type_tag(), 2);
        assert_eq!(Geometry::Polygon(Polygon::default()).type_tag(), 3);
        assert_eq!(Geometry::MultiPolygon(Vec::new()).type_tag(), 4);
    }
}
