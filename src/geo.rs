//! Spherical distance and geohash encoding.

/// Mean Earth radius used for great-circle distances (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geohash base-32 alphabet.
pub const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used for neighborhood color variation.
pub const NEIGHBORHOOD_GEOHASH_PRECISION: usize = 6;

/// Haversine great-circle distance between two points in degrees (meters).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin() * (d_phi / 2.0).sin()
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin() * (d_lambda / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Encode a coordinate as a geohash of `precision` characters.
///
/// Bisection alternates longitude/latitude starting with longitude; a value
/// on or above the midpoint sets the bit.
pub fn geohash(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut out = String::with_capacity(precision);
    let mut even = true;
    let mut bit = 0;
    let mut ch = 0usize;

    while out.len() < precision {
        let (range, value) = if even {
            (&mut lon_range, lon)
        } else {
            (&mut lat_range, lat)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            ch |= 1 << (4 - bit);
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;

        if bit < 4 {
            bit += 1;
        } else {
            out.push(GEOHASH_ALPHABET[ch] as char);
            bit = 0;
            ch = 0;
        }
    }

    out
}
