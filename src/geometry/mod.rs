//! Geometry primitives and the planar/spherical backends behind them
//!
//! Every geometry value carries the backend it was created with, so callers
//! never branch on the backend themselves.

pub mod factory;
pub mod planar;
pub mod spherical;
pub mod time_axis;
pub mod wkt;

use std::fmt;

use crate::types::{MatchError, MatchResult};

pub use factory::GeometryFactory;
pub use planar::PlanarBackend;
pub use spherical::{spherical_distance_km, SphericalBackend};
pub use time_axis::TimeAxis;

/// Available geometry backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// Euclidean lon/lat plane, anti-meridian naive
    Planar,
    /// Great-circle geometry on the unit sphere
    Spherical,
}

impl std::str::FromStr for GeometryType {
    type Err = MatchError;

    fn from_str(name: &str) -> MatchResult<Self> {
        match name.trim().to_uppercase().as_str() {
            "JTS" | "PLANAR" => Ok(GeometryType::Planar),
            "S2" | "SPHERICAL" => Ok(GeometryType::Spherical),
            other => Err(MatchError::Config(format!(
                "Unknown geometry library: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Planar => write!(f, "JTS"),
            GeometryType::Spherical => write!(f, "S2"),
        }
    }
}

/// Position of a projected point along a line string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePosition {
    /// Index of the segment starting vertex
    pub segment: usize,
    /// Fraction along the segment, clamped to [0, 1]
    pub fraction: f64,
    /// Distance from the point to the line (degrees or radians, backend units)
    pub distance: f64,
}

/// Primitive operations a geometry backend provides.
///
/// Rings are passed as open vertex sequences (no duplicated closing vertex).
pub trait GeometryBackend: fmt::Debug + Send + Sync {
    fn geometry_type(&self) -> GeometryType;

    /// Whether polygons keep the closing vertex explicitly
    fn requires_closed_rings(&self) -> bool;

    fn is_valid_ring(&self, ring: &[Point]) -> bool;

    /// Point-in-polygon test, boundary inclusive
    fn ring_contains(&self, ring: &[Point], point: &Point) -> bool;

    /// Intersection of two rings as zero or more open rings
    fn intersect_rings(&self, a: &[Point], b: &[Point]) -> Vec<Vec<Point>>;

    fn ring_centroid(&self, ring: &[Point]) -> Option<Point>;

    /// Nearest position on a line string, `None` for an empty line
    fn locate_on_line(&self, line: &[Point], point: &Point) -> Option<LinePosition>;
}

pub(crate) fn backend_for(geometry_type: GeometryType) -> &'static dyn GeometryBackend {
    match geometry_type {
        GeometryType::Planar => &PlanarBackend,
        GeometryType::Spherical => &SphericalBackend,
    }
}

/// Geographic point, longitude and latitude in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 360.0
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.lon, self.lat)
    }
}

/// Ordered point sequence
#[derive(Debug, Clone)]
pub struct LineString {
    points: Vec<Point>,
    backend: &'static dyn GeometryBackend,
}

impl LineString {
    pub(crate) fn new(points: Vec<Point>, backend: &'static dyn GeometryBackend) -> Self {
        Self { points, backend }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn backend(&self) -> &'static dyn GeometryBackend {
        self.backend
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2 && self.points.iter().all(Point::is_valid)
    }

    pub fn locate(&self, point: &Point) -> Option<LinePosition> {
        self.backend.locate_on_line(&self.points, point)
    }
}

impl PartialEq for LineString {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

/// Single-ring polygon.
///
/// Planar rings are stored closed (first == last), spherical loops are stored
/// open; `coordinates` always reports a closed ring.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<Point>,
    backend: &'static dyn GeometryBackend,
}

impl Polygon {
    pub(crate) fn new(points: &[Point], backend: &'static dyn GeometryBackend) -> Self {
        let mut vertices = points.to_vec();
        if backend.requires_closed_rings() {
            if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
                if vertices.len() > 1 && first != last {
                    vertices.push(first);
                }
            }
        } else {
            while vertices.len() > 1 && vertices.first() == vertices.last() {
                vertices.pop();
            }
        }
        Self { vertices, backend }
    }

    pub fn empty(backend: &'static dyn GeometryBackend) -> Self {
        Self {
            vertices: Vec::new(),
            backend,
        }
    }

    pub fn backend(&self) -> &'static dyn GeometryBackend {
        self.backend
    }

    /// Ring vertices without the closing duplicate
    pub fn ring(&self) -> &[Point] {
        let n = self.vertices.len();
        if n > 1 && self.vertices[0] == self.vertices[n - 1] {
            &self.vertices[..n - 1]
        } else {
            &self.vertices
        }
    }

    /// Closed ring coordinates (first == last)
    pub fn coordinates(&self) -> Vec<Point> {
        let mut coordinates = self.ring().to_vec();
        if let Some(first) = coordinates.first().copied() {
            coordinates.push(first);
        }
        coordinates
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_empty()
            && self.ring().iter().all(Point::is_valid)
            && self.backend.is_valid_ring(self.ring())
    }

    pub fn contains(&self, point: &Point) -> bool {
        !self.is_empty() && self.backend.ring_contains(self.ring(), point)
    }

    pub fn centroid(&self) -> Option<Point> {
        if self.is_empty() {
            return None;
        }
        self.backend.ring_centroid(self.ring())
    }

    /// Moves every vertex by `delta` degrees of longitude, without wrapping
    pub fn shift_lon(&self, delta: f64) -> Polygon {
        Polygon {
            vertices: self
                .vertices
                .iter()
                .map(|p| Point::new(p.lon + delta, p.lat))
                .collect(),
            backend: self.backend,
        }
    }

    pub fn intersection(&self, other: &Polygon) -> Geometry {
        if self.is_empty() || other.is_empty() {
            return Geometry::Polygon(Polygon::empty(self.backend));
        }
        if self.same_ring(other) {
            return Geometry::Polygon(self.clone());
        }

        let mut pieces: Vec<Polygon> = self
            .backend
            .intersect_rings(self.ring(), other.ring())
            .iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| Polygon::new(ring, self.backend))
            .collect();

        match pieces.len() {
            0 => Geometry::Polygon(Polygon::empty(self.backend)),
            1 => Geometry::Polygon(pieces.remove(0)),
            _ => Geometry::MultiPolygon(MultiPolygon::new(pieces)),
        }
    }

    fn same_ring(&self, other: &Polygon) -> bool {
        let (a, b) = (self.ring(), other.ring());
        if a.len() != b.len() || a.is_empty() {
            return false;
        }
        let n = a.len();
        let Some(offset) = b.iter().position(|p| *p == a[0]) else {
            return false;
        };
        let forward = (0..n).all(|i| a[i] == b[(offset + i) % n]);
        let backward = (0..n).all(|i| a[i] == b[(offset + n - i) % n]);
        forward || backward
    }
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.ring() == other.ring()
    }
}

/// Disjoint polygons, produced when an intersection falls apart into pieces
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiPolygon {
    polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }
}

/// Ordered geometries, one per along-track segment of a split swath
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryCollection {
    geometries: Vec<Geometry>,
}

impl GeometryCollection {
    pub fn new(geometries: Vec<Geometry>) -> Self {
        Self { geometries }
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.iter().all(Geometry::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(LineString),
    Polygon(Polygon),
    MultiPolygon(MultiPolygon),
    Collection(GeometryCollection),
}

impl Geometry {
    /// The empty result of a disjoint intersection
    pub fn empty() -> Self {
        Geometry::Collection(GeometryCollection::default())
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Geometry::Point(point) => point.is_valid(),
            Geometry::LineString(line) => line.is_valid(),
            Geometry::Polygon(polygon) => polygon.is_valid(),
            Geometry::MultiPolygon(multi) => {
                !multi.polygons.is_empty() && multi.polygons.iter().all(Polygon::is_valid)
            }
            Geometry::Collection(collection) => {
                !collection.geometries.is_empty()
                    && collection.geometries.iter().all(Geometry::is_valid)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(line) => line.is_empty(),
            Geometry::Polygon(polygon) => polygon.is_empty(),
            Geometry::MultiPolygon(multi) => multi.polygons.iter().all(Polygon::is_empty),
            Geometry::Collection(collection) => collection.is_empty(),
        }
    }

    pub fn coordinates(&self) -> Vec<Point> {
        match self {
            Geometry::Point(point) => vec![*point],
            Geometry::LineString(line) => line.points.clone(),
            Geometry::Polygon(polygon) => polygon.coordinates(),
            Geometry::MultiPolygon(multi) => multi
                .polygons
                .iter()
                .flat_map(Polygon::coordinates)
                .collect(),
            Geometry::Collection(collection) => collection
                .geometries
                .iter()
                .flat_map(Geometry::coordinates)
                .collect(),
        }
    }

    /// Along-track segments: the members of a collection, or the geometry itself
    pub fn segments(&self) -> Vec<&Geometry> {
        match self {
            Geometry::Collection(collection) => collection.geometries.iter().collect(),
            other => vec![other],
        }
    }

    pub fn is_segmented(&self) -> bool {
        matches!(self, Geometry::Collection(_))
    }

    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Geometry::Polygon(polygon) => Some(polygon),
            _ => None,
        }
    }

    /// Whether the point lies inside or on any areal part of this geometry
    pub fn contains(&self, point: &Point) -> bool {
        match self {
            Geometry::Point(p) => p == point,
            Geometry::LineString(_) => false,
            Geometry::Polygon(polygon) => polygon.contains(point),
            Geometry::MultiPolygon(multi) => multi.polygons.iter().any(|p| p.contains(point)),
            Geometry::Collection(collection) => {
                collection.geometries.iter().any(|g| g.contains(point))
            }
        }
    }

    /// Geometric intersection. Disjoint inputs give an empty geometry;
    /// only unsupported type combinations are errors.
    pub fn intersection(&self, other: &Geometry) -> MatchResult<Geometry> {
        match (self, other) {
            (Geometry::LineString(_), _) | (_, Geometry::LineString(_)) => Err(
                MatchError::Geometry("Intersection with line strings is not supported".to_string()),
            ),
            (Geometry::Collection(collection), other) | (other, Geometry::Collection(collection)) => {
                let mut parts = Vec::new();
                for member in &collection.geometries {
                    let part = member.intersection(other)?;
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                Ok(match parts.len() {
                    0 => Geometry::empty(),
                    1 => parts.remove(0),
                    _ => Geometry::Collection(GeometryCollection::new(parts)),
                })
            }
            (Geometry::Point(a), Geometry::Point(b)) => Ok(if a == b {
                Geometry::Point(*a)
            } else {
                Geometry::empty()
            }),
            (Geometry::Point(point), areal) | (areal, Geometry::Point(point)) => {
                Ok(if areal.contains(point) {
                    Geometry::Point(*point)
                } else {
                    Geometry::empty()
                })
            }
            (Geometry::Polygon(a), Geometry::Polygon(b)) => Ok(a.intersection(b)),
            (Geometry::Polygon(polygon), Geometry::MultiPolygon(multi))
            | (Geometry::MultiPolygon(multi), Geometry::Polygon(polygon)) => {
                Ok(merge_pieces(multi.polygons.iter().map(|p| polygon.intersection(p))))
            }
            (Geometry::MultiPolygon(a), Geometry::MultiPolygon(b)) => Ok(merge_pieces(
                a.polygons
                    .iter()
                    .flat_map(|pa| b.polygons.iter().map(move |pb| pa.intersection(pb))),
            )),
        }
    }
}

fn merge_pieces(results: impl Iterator<Item = Geometry>) -> Geometry {
    let mut pieces = Vec::new();
    for result in results {
        match result {
            Geometry::Polygon(polygon) if !polygon.is_empty() => pieces.push(polygon),
            Geometry::MultiPolygon(multi) => pieces.extend(multi.polygons),
            _ => {}
        }
    }
    match pieces.len() {
        0 => Geometry::empty(),
        1 => Geometry::Polygon(pieces.remove(0)),
        _ => Geometry::MultiPolygon(MultiPolygon::new(pieces)),
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", wkt::format(self))
    }
}
