use chrono::{DateTime, Utc};

use super::{
    backend_for, wkt, Geometry, GeometryBackend, GeometryCollection, GeometryType, LineString,
    Point, Polygon, TimeAxis,
};
use crate::types::MatchResult;

/// Creates geometries bound to one backend, chosen once at construction
#[derive(Debug, Clone, Copy)]
pub struct GeometryFactory {
    geometry_type: GeometryType,
    backend: &'static dyn GeometryBackend,
}

impl GeometryFactory {
    pub fn new(geometry_type: GeometryType) -> Self {
        Self {
            geometry_type,
            backend: backend_for(geometry_type),
        }
    }

    /// Factory from a library name such as "S2" or "JTS"
    pub fn from_name(name: &str) -> MatchResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn backend(&self) -> &'static dyn GeometryBackend {
        self.backend
    }

    pub fn requires_closed_rings(&self) -> bool {
        self.backend.requires_closed_rings()
    }

    pub fn create_point(&self, lon: f64, lat: f64) -> Point {
        Point::new(lon, lat)
    }

    /// Polygon from a ring; closed and open input rings are both accepted
    pub fn create_polygon(&self, points: &[Point]) -> Polygon {
        Polygon::new(points, self.backend)
    }

    pub fn create_line_string(&self, points: &[Point]) -> LineString {
        LineString::new(points.to_vec(), self.backend)
    }

    pub fn create_collection(&self, geometries: Vec<Geometry>) -> Geometry {
        Geometry::Collection(GeometryCollection::new(geometries))
    }

    pub fn create_time_axis(
        &self,
        line: LineString,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MatchResult<TimeAxis> {
        TimeAxis::new(line, start, end)
    }

    pub fn parse(&self, wkt: &str) -> MatchResult<Geometry> {
        wkt::parse(wkt, self.backend)
    }

    pub fn format(&self, geometry: &Geometry) -> String {
        wkt::format(geometry)
    }
}

impl Default for GeometryFactory {
    fn default() -> Self {
        Self::new(GeometryType::Spherical)
    }
}
