//! Binary geometry decoding
//!
//! ```text
//! blob          := type_byte body
//! body(0|1)     := (nothing read)
//! body(2|3)     := point_count:i32 point{point_count}
//! body(4)       := poly_count:i32 polygon_entry{poly_count}
//! polygon_entry := [0x03]? point_count:i32 point{point_count}
//! point         := x:f64 y:f64 z:f64
//! ```
//!
//! All integers and floats are little-endian.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use super::cursor::{Cursor, POINT_SIZE};
use super::{tag, EcefPoint, Geometry, GeometryDecodeError, MultiPart, Polygon, Ring};

/// Result of decoding one blob
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub geometry: Geometry,
    /// Bytes consumed from the start of the blob
    pub consumed: usize,
}

/// Decode base64 element text into a geometry.
///
/// ASCII whitespace inside the text (line wrapping, indentation) is dropped
/// before decoding.
pub fn decode_blob(text: &str) -> Result<Decoded, GeometryDecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    decode_geometry(&bytes)
}

/// Decode raw blob bytes into a geometry
pub fn decode_geometry(data: &[u8]) -> Result<Decoded, GeometryDecodeError> {
    let mut cursor = Cursor::new(data);
    let type_tag = cursor
        .read_u8("type tag")
        .map_err(|_| GeometryDecodeError::Empty)?;

    let geometry = match type_tag {
        tag::POINT | tag::LINE => {
            debug!("Type {} geometry has no rings", type_tag);
            Geometry::NoRings { tag: type_tag }
        }
        tag::RING => Geometry::Ring(read_ring(&mut cursor)?),
        tag::POLYGON => Geometry::Polygon(Polygon::from_ring(read_ring(&mut cursor)?)),
        tag::MULTI_POLYGON => Geometry::MultiPolygon(read_multi_polygon(&mut cursor)?),
        other => return Err(GeometryDecodeError::UnsupportedType(other)),
    };

    if cursor.remaining() > 0 {
        debug!(
            "Ignoring {} trailing bytes after type {} geometry",
            cursor.remaining(),
            type_tag
        );
    }

    Ok(Decoded {
        geometry,
        consumed: cursor.offset(),
    })
}

/// Read a signed count; negative values mean "nothing follows"
fn read_count(cursor: &mut Cursor<'_>, what: &'static str) -> Result<usize, GeometryDecodeError> {
    let offset = cursor.offset();
    let count = cursor.read_i32(what)?;
    if count < 0 {
        warn!("Negative {} {} at offset {}, reading none", what, count, offset);
        return Ok(0);
    }
    Ok(count as usize)
}

fn read_ring(cursor: &mut Cursor<'_>) -> Result<Ring, GeometryDecodeError> {
    let count = read_count(cursor, "point count")?;
    cursor.ensure(count.saturating_mul(POINT_SIZE), "ring points")?;

    let points = (0..count)
        .map(|_| cursor.read_point())
        .collect::<Result<Vec<EcefPoint>, _>>()?;
    Ok(Ring::new(points))
}

fn read_multi_polygon(cursor: &mut Cursor<'_>) -> Result<Vec<MultiPart>, GeometryDecodeError> {
    let count = read_count(cursor, "polygon count")?;
    let mut parts = Vec::new();

    for part in 0..count {
        let tag_offset = cursor.offset();
        if cursor.peek_u8().is_none() {
            return Err(GeometryDecodeError::Truncated {
                what: "polygon entry",
                offset: tag_offset,
                needed: 1,
                available: 0,
            });
        }

        let nested_tag = cursor.advance_if(tag::POLYGON);
        let ring = read_ring(cursor).map_err(|source| {
            if nested_tag {
                GeometryDecodeError::NestedTagOverrun {
                    part,
                    tag_offset,
                    source: Box::new(source),
                }
            } else {
                source
            }
        })?;

        parts.push(MultiPart {
            nested_tag,
            polygon: Polygon::from_ring(ring),
        });
    }

    Ok(parts)
}
