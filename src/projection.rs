/*!
 * ECEF (EPSG:4978) to WGS84 geodetic (EPSG:4326) conversion
 *
 * Closed-form solution after Heikkinen (1982). Output is lon/lat order in
 * degrees; ellipsoidal height is dropped.
 */

use crate::geometry::EcefPoint;

/// WGS84 semi-major axis in metres
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 inverse flattening
pub const WGS84_INV_F: f64 = 298.257_223_563;

/// Longitude/latitude in degrees on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPoint {
    pub lon: f64,
    pub lat: f64,
}

pub fn ecef_to_geodetic(point: EcefPoint) -> GeodeticPoint {
    let EcefPoint { x, y, z } = point;

    let a = WGS84_A;
    let f = 1.0 / WGS84_INV_F;
    let b = a * (1.0 - f);
    let e2 = f * (2.0 - f);
    let ep2 = (a * a - b * b) / (b * b);

    let p = x.hypot(y);
    let lon = y.atan2(x);

    let big_f = 54.0 * b * b * z * z;
    let g = p * p + (1.0 - e2) * z * z - e2 * (a * a - b * b);
    let c = e2 * e2 * big_f * p * p / (g * g * g);
    let s = (1.0 + c + (c * c + 2.0 * c).sqrt()).cbrt();
    let k = s + 1.0 + 1.0 / s;
    let big_p = big_f / (3.0 * k * k * g * g);
    let q = (1.0 + 2.0 * e2 * e2 * big_p).sqrt();
    let r0 = -(big_p * e2 * p) / (1.0 + q)
        + (0.5 * a * a * (1.0 + 1.0 / q)
            - big_p * (1.0 - e2) * z * z / (q * (1.0 + q))
            - 0.5 * big_p * p * p)
            .sqrt();
    let v = ((p - e2 * r0).powi(2) + (1.0 - e2) * z * z).sqrt();
    let z0 = b * b * z / (a * v);
    let lat = (z + ep2 * z0).atan2(p);

    GeodeticPoint {
        lon: lon.to_degrees(),
        lat: lat.to_degrees(),
    }
}

/// Convert a whole ring
pub fn ring_to_geodetic(points: &[EcefPoint]) -> Vec<GeodeticPoint> {
    points.iter().copied().map(ecef_to_geodetic).collect()
}
