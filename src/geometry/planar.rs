//! Planar backend: lon/lat treated as Euclidean x/y, built on the `geo` crate

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BooleanOps, Centroid, Coord, Intersects, Line};

use super::{GeometryBackend, GeometryType, LinePosition, Point};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarBackend;

impl GeometryBackend for PlanarBackend {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::Planar
    }

    fn requires_closed_rings(&self) -> bool {
        true
    }

    fn is_valid_ring(&self, ring: &[Point]) -> bool {
        let coords: Vec<Coord<f64>> = ring.iter().map(to_coord).collect();
        is_simple_ring(&coords)
    }

    fn ring_contains(&self, ring: &[Point], point: &Point) -> bool {
        to_geo_polygon(ring.iter().map(to_coord).collect()).intersects(&to_coord(point))
    }

    fn intersect_rings(&self, a: &[Point], b: &[Point]) -> Vec<Vec<Point>> {
        let first = to_geo_polygon(a.iter().map(to_coord).collect());
        let second = to_geo_polygon(b.iter().map(to_coord).collect());
        let result = BooleanOps::intersection(&first, &second);

        open_rings(&result)
            .into_iter()
            .map(|ring| ring.iter().map(|c| Point::new(c.x, c.y)).collect())
            .collect()
    }

    fn ring_centroid(&self, ring: &[Point]) -> Option<Point> {
        to_geo_polygon(ring.iter().map(to_coord).collect())
            .centroid()
            .map(|c| Point::new(c.x(), c.y()))
    }

    fn locate_on_line(&self, line: &[Point], point: &Point) -> Option<LinePosition> {
        match line.len() {
            0 => None,
            1 => Some(LinePosition {
                segment: 0,
                fraction: 0.0,
                distance: distance(&line[0], point),
            }),
            _ => {
                let mut best: Option<LinePosition> = None;
                for (segment, pair) in line.windows(2).enumerate() {
                    let candidate = project_on_segment(&pair[0], &pair[1], point, segment);
                    if best.map_or(true, |b| candidate.distance < b.distance) {
                        best = Some(candidate);
                    }
                }
                best
            }
        }
    }
}

fn to_coord(point: &Point) -> Coord<f64> {
    Coord {
        x: point.lon,
        y: point.lat,
    }
}

fn distance(a: &Point, b: &Point) -> f64 {
    (a.lon - b.lon).hypot(a.lat - b.lat)
}

fn project_on_segment(a: &Point, b: &Point, point: &Point, segment: usize) -> LinePosition {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let length_sq = dx * dx + dy * dy;
    let fraction = if length_sq > 0.0 {
        (((point.lon - a.lon) * dx + (point.lat - a.lat) * dy) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let projected = Point::new(a.lon + fraction * dx, a.lat + fraction * dy);
    LinePosition {
        segment,
        fraction,
        distance: distance(&projected, point),
    }
}

/// Builds a hole-free `geo` polygon; the exterior ring is closed by `geo`.
pub(crate) fn to_geo_polygon(exterior: Vec<Coord<f64>>) -> geo::Polygon<f64> {
    geo::Polygon::new(geo::LineString::new(exterior), vec![])
}

/// Exterior rings of a boolean-op result, without closing coordinates
pub(crate) fn open_rings(result: &geo::MultiPolygon<f64>) -> Vec<Vec<Coord<f64>>> {
    result
        .0
        .iter()
        .filter_map(|polygon| {
            let mut ring: Vec<Coord<f64>> = polygon.exterior().0.clone();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            (ring.len() >= 3).then_some(ring)
        })
        .collect()
}

/// Checks that an open ring is simple: at least three vertices, no
/// zero-length edge, and no contact between edges other than shared
/// endpoints of neighbours.
pub(crate) fn is_simple_ring(ring: &[Coord<f64>]) -> bool {
    let n = ring.len();
    if n < 3 || ring.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return false;
    }
    if (0..n).any(|i| ring[i] == ring[(i + 1) % n]) {
        return false;
    }

    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(ring[i], ring[(i + 1) % n]))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { is_proper, .. }) if adjacent && !is_proper => {}
                Some(_) => return false,
            }
        }
    }
    true
}
