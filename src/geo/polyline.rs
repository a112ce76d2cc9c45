//! Encoded polyline format (precision 5), as used by most routing services.

use crate::models::coordinate::Coordinate;

const PRECISION: f64 = 1e5;

pub fn encode(points: &[Coordinate]) -> String {
    let mut out = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for point in points {
        let lat = (point.lat * PRECISION).round() as i64;
        let lng = (point.lng * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };

    while value >= 0x20 {
        let chunk = ((value & 0x1f) | 0x20) as u8 + 63;
        out.push(chunk as char);
        value >>= 5;
    }
    out.push((value as u8 + 63) as char);
}
