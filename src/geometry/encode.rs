//! Test-only encoder producing the byte layout [`super::decode`] reads

use super::{EcefPoint, Geometry, MultiPart, Ring};

pub fn encode_geometry(geometry: &Geometry) -> Vec<u8> {
    let mut out = vec![geometry.type_tag()];
    match geometry {
        Geometry::NoRings { .. } => {}
        Geometry::Ring(ring) => write_ring(&mut out, ring),
        Geometry::Polygon(polygon) => {
            for ring in &polygon.rings {
                write_ring(&mut out, ring);
            }
        }
        Geometry::MultiPolygon(parts) => {
            out.extend_from_slice(&(parts.len() as i32).to_le_bytes());
            for MultiPart {
                nested_tag,
                polygon,
            } in parts
            {
                if *nested_tag {
                    out.push(super::tag::POLYGON);
                }
                for ring in &polygon.rings {
                    write_ring(&mut out, ring);
                }
            }
        }
    }
    out
}

pub fn encode_blob(geometry: &Geometry) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(encode_geometry(geometry))
}

fn write_ring(out: &mut Vec<u8>, ring: &Ring) {
    out.extend_from_slice(&(ring.points.len() as i32).to_le_bytes());
    for point in &ring.points {
        write_point(out, point);
    }
}

fn write_point(out: &mut Vec<u8>, point: &EcefPoint) {
    for value in [point.x, point.y, point.z] {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{decode_blob, decode_geometry, Polygon};

    fn field_ring(offset: f64, n: usize) -> Ring {
        Ring::new(
            (0..n)
                .map(|i| {
                    let t = i as f64;
                    EcefPoint::new(4_200_000.0 + offset + t, 170_000.0 - t * 2.0, 4_780_000.0 + t * 0.5)
                })
                .collect(),
        )
    }

    #[test]
    fn test_reencode_reproduces_bytes() {
        let samples = vec![
            Geometry::NoRings { tag: 0 },
            Geometry::NoRings { tag: 1 },
            Geometry::Ring(field_ring(0.0, 5)),
            Geometry::Polygon(Polygon::from_ring(field_ring(10.0, 0))),
            Geometry::MultiPolygon(vec![
                MultiPart {
                    nested_tag: true,
                    polygon: Polygon::from_ring(field_ring(1.0, 4)),
                },
                MultiPart {
                    nested_tag: false,
                    polygon: Polygon::from_ring(field_ring(2.0, 7)),
                },
                MultiPart {
                    nested_tag: true,
                    polygon: Polygon::from_ring(Ring::default()),
                },
            ]),
        ];

        for geometry in samples {
            let bytes = encode_geometry(&geometry);
            let decoded = decode_geometry(&bytes).unwrap();
            assert_eq!(decoded.consumed, bytes.len());
            assert_eq!(encode_geometry(&decoded.geometry), bytes);
        }
    }

    #[test]
    fn test_blob_text_roundtrip() {
        let geometry = Geometry::Polygon(Polygon::from_ring(field_ring(0.0, 3)));
        let decoded = decode_blob(&encode_blob(&geometry)).unwrap();
        assert_eq!(decoded.geometry, geometry);
    }
}
