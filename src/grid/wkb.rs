//! Little-endian WKB encoding for the GeoParquet geometry column.

use geo::{LineString, Polygon};

const BYTE_ORDER_LE: u8 = 1;
const WKB_POLYGON: u32 = 3;

/// Encode a polygon as ISO WKB (2D, little endian)
pub fn polygon_to_wkb(polygon: &Polygon<f64>) -> Vec<u8> {
    let ring_count = 1 + polygon.interiors().len();
    let coord_count: usize = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|r| r.0.len())
        .sum();

    let mut buf = Vec::with_capacity(9 + ring_count * 4 + coord_count * 16);
    buf.push(BYTE_ORDER_LE);
    buf.extend_from_slice(&WKB_POLYGON.to_le_bytes());
    buf.extend_from_slice(&(ring_count as u32).to_le_bytes());

    write_ring(&mut buf, polygon.exterior());
    for ring in polygon.interiors() {
        write_ring(&mut buf, ring);
    }
    buf
}

fn write_ring(buf: &mut Vec<u8>, ring: &LineString<f64>) {
    buf.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
    for coord in &ring.0 {
        buf.extend_from_slice(&coord.x.to_le_bytes());
        buf.extend_from_slice(&coord.y.to_le_bytes());
    }
}
