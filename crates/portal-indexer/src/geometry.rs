//! Geometry preparation for the engine.
//!
//! The spatial field rejects oversized values, so geometries are
//! simplified with a growing tolerance until they fit, falling back to
//! the bounding box when simplification is not enough.

use geo::{BoundingRect, CoordsIter, Geometry, Simplify};
use tracing::trace;
use wkt::ToWkt;

/// Upper bound for a WKT value, just under the engine's 2 MiB field limit.
const MAX_WKT_BYTES: usize = 2 * 1024 * 1024 - 100 * 1024;
/// Coordinate count above which a geometry is simplified.
const MAX_COORDINATES: usize = 600;
/// Tolerance ceiling; past this the bounding box takes over.
const MAX_TOLERANCE: f64 = 9999.0;

/// WKT for a geometry, simplified until it fits the engine's limits.
///
/// Tolerance starts at 1.0 in source units and grows tenfold per round.
/// Geometries that cannot be simplified (points, collections) or remain
/// oversized at the tolerance ceiling collapse to their bounding box.
pub fn simplified_wkt(geometry: &Geometry<f64>) -> String {
    let mut current = geometry.clone();
    let mut wkt = current.wkt_string();
    let mut tolerance = 1.0;

    while oversized(&wkt, &current) && tolerance < MAX_TOLERANCE {
        match simplify(&current, tolerance) {
            Some(simpler) => current = simpler,
            None => break,
        }
        wkt = current.wkt_string();
        trace!(tolerance, size = wkt.len(), "simplified geometry");
        tolerance *= 10.0;
    }

    if oversized(&wkt, &current) {
        if let Some(rect) = current.bounding_rect() {
            wkt = Geometry::Polygon(rect.to_polygon()).wkt_string();
        }
    }
    wkt
}

fn oversized(wkt: &str, geometry: &Geometry<f64>) -> bool {
    wkt.len() > MAX_WKT_BYTES || geometry.coords_count() > MAX_COORDINATES
}

fn simplify(geometry: &Geometry<f64>, tolerance: f64) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::LineString(g) => Some(Geometry::LineString(g.simplify(&tolerance))),
        Geometry::MultiLineString(g) => Some(Geometry::MultiLineString(g.simplify(&tolerance))),
        Geometry::Polygon(g) => Some(Geometry::Polygon(g.simplify(&tolerance))),
        Geometry::MultiPolygon(g) => Some(Geometry::MultiPolygon(g.simplify(&tolerance))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, LineString};

    fn jagged_line(points: usize) -> LineString<f64> {
        // zig-zag with sub-tolerance jitter, so simplification collapses it
        (0..points)
            .map(|i| {
                let x = i as f64 * 0.001;
                let y = if i % 2 == 0 { 0.0 } else { 0.0001 };
                (x, y)
            })
            .collect()
    }

    #[test]
    fn test_small_geometry_passes_through() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)];
        let wkt = simplified_wkt(&Geometry::LineString(line.clone()));
        assert_eq!(wkt, Geometry::LineString(line).wkt_string());
    }

    #[test]
    fn test_oversized_line_is_simplified() {
        let line = Geometry::LineString(jagged_line(5000));
        let wkt = simplified_wkt(&line);
        assert!(wkt.len() < line.wkt_string().len());
    }

    #[test]
    fn test_point_is_never_simplified() {
        let point = Geometry::Point(point! { x: 1.5, y: 2.5 });
        let wkt = simplified_wkt(&point);
        assert_eq!(wkt, point.wkt_string());
    }

    #[test]
    fn test_unsimplifiable_geometry_falls_back_to_bounding_box() {
        // a multipoint cannot be simplified, so an oversized one collapses
        let points: Vec<geo::Point<f64>> = (0..1000)
            .map(|i| point! { x: i as f64, y: i as f64 })
            .collect();
        let multi = Geometry::MultiPoint(points.into());

        let wkt = simplified_wkt(&multi);
        assert!(wkt.starts_with("POLYGON"), "expected bounding box: {wkt}");
    }
}
