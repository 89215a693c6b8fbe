//! Degrees/minutes/seconds rationals ⇄ signed decimal degrees.

use exif::Rational;

/// Seconds are stored with this denominator (1/100 second precision).
pub const SECONDS_DENOM: u32 = 100;

/// `d + m/60 + s/3600`.
pub fn to_decimal_degrees(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Convert a coordinate to the DMS triple stored in GPS tags.
///
/// Only the magnitude is encoded; the hemisphere goes into the matching
/// `*Ref` tag (see [`latitude_ref`] / [`longitude_ref`]).
pub fn to_dms(value: f64) -> Vec<Rational> {
    let value = value.abs();
    let d = value.trunc();
    let m = ((value - d) * 60.0).trunc();
    let s = (value - d - m / 60.0) * 3600.0;
    vec![
        Rational { num: d as u32, denom: 1 },
        Rational { num: m as u32, denom: 1 },
        Rational { num: (s * SECONDS_DENOM as f64).round() as u32, denom: SECONDS_DENOM },
    ]
}

/// Decimal degrees from a stored `(numerator, denominator)` DMS triple.
/// `None` on a zero denominator or a triple of the wrong length.
pub fn dms_to_degrees(dms: &[(i64, i64)]) -> Option<f64> {
    match dms {
        [(dn, dd), (mn, md), (sn, sd)] if *dd != 0 && *md != 0 && *sd != 0 => {
            Some(to_decimal_degrees(
                *dn as f64 / *dd as f64,
                *mn as f64 / *md as f64,
                *sn as f64 / *sd as f64,
            ))
        }
        _ => None,
    }
}

pub fn latitude_ref(lat: f64) -> &'static str {
    if lat < 0.0 { "S" } else { "N" }
}

pub fn longitude_ref(lon: f64) -> &'static str {
    if lon < 0.0 { "W" } else { "E" }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND: f64 = 1.0 / 360_000.0;

    fn round_trip(v: f64) -> f64 {
        let pairs: Vec<(i64, i64)> =
            to_dms(v).iter().map(|r| (r.num as i64, r.denom as i64)).collect();
        dms_to_degrees(&pairs).unwrap()
    }

    #[test]
    fn dms_of_sydney_latitude() {
        let dms = to_dms(-33.86);
        assert_eq!((dms[0].num, dms[0].denom), (33, 1));
        assert_eq!((dms[1].num, dms[1].denom), (51, 1));
        assert_eq!((dms[2].num, dms[2].denom), (3600, 100));
    }

    #[test]
    fn round_trip_within_hundredth_second() {
        let mut v = -179.99;
        while v < 180.0 {
            let back = round_trip(v);
            assert!(
                (back - v.abs()).abs() <= BOUND,
                "{v}: got {back}, diff {}",
                (back - v.abs()).abs()
            );
            v += 0.731;
        }
    }

    #[test]
    fn round_trip_known_coordinates() {
        for v in [0.0, 151.21, 33.86, 0.000_01, 89.999_999, 179.5] {
            assert!((round_trip(v) - v).abs() <= BOUND, "{v}");
        }
    }

    #[test]
    fn hemisphere_refs() {
        assert_eq!(latitude_ref(-0.1), "S");
        assert_eq!(latitude_ref(0.0), "N");
        assert_eq!(longitude_ref(-120.0), "W");
        assert_eq!(longitude_ref(151.21), "E");
    }

    #[test]
    fn bad_triples_rejected() {
        assert_eq!(dms_to_degrees(&[(1, 1)]), None);
        assert_eq!(dms_to_degrees(&[(1, 1), (1, 0), (0, 1)]), None);
    }

    #[test]
    fn decimal_from_parts() {
        assert!((to_decimal_degrees(10.0, 30.0, 36.0) - 10.51).abs() < 1e-12);
    }
}
