//! Spherical backend: polygon edges are great-circle arcs on the unit sphere.
//!
//! A loop is valid when all its vertices lie inside an open hemisphere around
//! the vertex centroid; the loop region is the side inside that hemisphere.
//! Gnomonic projection maps great circles to straight lines, so all
//! boolean work is done in a tangent plane with the `geo` crate and mapped back.

use geo::{BooleanOps, Coord, Intersects};

use super::planar::{is_simple_ring, open_rings, to_geo_polygon};
use super::{GeometryBackend, GeometryType, LinePosition, Point};

pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0;

/// Minimum cosine between any loop vertex and the loop centre
const HEMISPHERE_MIN_DOT: f64 = 0.01;
/// Vectors closer to the projection horizon than this are not projected
const PROJECTION_MIN_DOT: f64 = 1e-9;
const ANGLE_EPS: f64 = 1e-12;

type Vec3 = [f64; 3];

#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalBackend;

impl GeometryBackend for SphericalBackend {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::Spherical
    }

    fn requires_closed_rings(&self) -> bool {
        false
    }

    fn is_valid_ring(&self, ring: &[Point]) -> bool {
        let Some(spherical_loop) = SphericalLoop::new(ring) else {
            return false;
        };
        if !spherical_loop.fits_hemisphere() {
            return false;
        }
        let gnomonic = Gnomonic::new(spherical_loop.center);
        match gnomonic.project_all(&spherical_loop.vertices, PROJECTION_MIN_DOT) {
            Some(coords) => is_simple_ring(&coords),
            None => false,
        }
    }

    fn ring_contains(&self, ring: &[Point], point: &Point) -> bool {
        SphericalLoop::new(ring).map_or(false, |l| l.contains(&to_xyz(point)))
    }

    fn intersect_rings(&self, a: &[Point], b: &[Point]) -> Vec<Vec<Point>> {
        let (Some(first), Some(second)) = (SphericalLoop::new(a), SphericalLoop::new(b)) else {
            return Vec::new();
        };
        if !first.fits_hemisphere() || !second.fits_hemisphere() {
            log::debug!("Skipping intersection of loops that do not fit a hemisphere");
            return Vec::new();
        }
        if angle(&first.center, &second.center) > first.radius + second.radius + ANGLE_EPS {
            return Vec::new();
        }
        let Some(center) = normalize(&add(&first.center, &second.center)) else {
            return Vec::new();
        };

        let gnomonic = Gnomonic::new(center);
        let direct = gnomonic
            .project_all(&first.vertices, HEMISPHERE_MIN_DOT)
            .zip(gnomonic.project_all(&second.vertices, HEMISPHERE_MIN_DOT));

        let result = match direct {
            Some((pa, pb)) => BooleanOps::intersection(&to_geo_polygon(pa), &to_geo_polygon(pb)),
            None => {
                // Both loops are cut down to the lune shared by their hemispheres,
                // which always projects around the mid-centre.
                let pieces_a = first.clip_to_hemisphere(&second.center);
                let pieces_b = second.clip_to_hemisphere(&first.center);
                match (
                    project_pieces(&gnomonic, &pieces_a),
                    project_pieces(&gnomonic, &pieces_b),
                ) {
                    (Some(ma), Some(mb)) => BooleanOps::intersection(&ma, &mb),
                    _ => return Vec::new(),
                }
            }
        };

        open_rings(&result)
            .iter()
            .map(|ring| {
                ring.iter()
                    .filter_map(|c| gnomonic.unproject(c))
                    .map(|v| to_point(&v))
                    .collect()
            })
            .collect()
    }

    fn ring_centroid(&self, ring: &[Point]) -> Option<Point> {
        SphericalLoop::new(ring).map(|l| to_point(&l.center))
    }

    fn locate_on_line(&self, line: &[Point], point: &Point) -> Option<LinePosition> {
        let p = to_xyz(point);
        match line.len() {
            0 => None,
            1 => Some(LinePosition {
                segment: 0,
                fraction: 0.0,
                distance: angle(&p, &to_xyz(&line[0])),
            }),
            _ => {
                let vertices: Vec<Vec3> = line.iter().map(to_xyz).collect();
                let mut best: Option<LinePosition> = None;
                for (segment, pair) in vertices.windows(2).enumerate() {
                    let candidate = locate_on_arc(&pair[0], &pair[1], &p, segment);
                    if best.map_or(true, |b| candidate.distance < b.distance) {
                        best = Some(candidate);
                    }
                }
                best
            }
        }
    }
}

/// Great-circle distance between two points in kilometres
pub fn spherical_distance_km(a: &Point, b: &Point) -> f64 {
    angle(&to_xyz(a), &to_xyz(b)) * MEAN_EARTH_RADIUS_KM
}

struct SphericalLoop {
    vertices: Vec<Vec3>,
    center: Vec3,
    /// Largest angle between the centre and a vertex, radians
    radius: f64,
    min_dot: f64,
}

impl SphericalLoop {
    fn new(ring: &[Point]) -> Option<Self> {
        if ring.len() < 3 {
            return None;
        }
        let vertices: Vec<Vec3> = ring.iter().map(to_xyz).collect();
        let sum = vertices.iter().fold([0.0; 3], |acc, v| add(&acc, v));
        let center = normalize(&sum)?;

        let mut radius: f64 = 0.0;
        let mut min_dot = f64::INFINITY;
        for v in &vertices {
            radius = radius.max(angle(&center, v));
            min_dot = min_dot.min(dot(&center, v));
        }

        Some(Self {
            vertices,
            center,
            radius,
            min_dot,
        })
    }

    fn fits_hemisphere(&self) -> bool {
        self.min_dot > HEMISPHERE_MIN_DOT
    }

    fn contains(&self, v: &Vec3) -> bool {
        if !self.fits_hemisphere() {
            return false;
        }
        let gnomonic = Gnomonic::new(self.center);
        let (Some(coords), Some(projected)) = (
            gnomonic.project_all(&self.vertices, PROJECTION_MIN_DOT),
            gnomonic.project(v, PROJECTION_MIN_DOT),
        ) else {
            return false;
        };
        to_geo_polygon(coords).intersects(&projected)
    }

    /// Parts of the loop region on the non-negative side of the plane with
    /// the given normal
    fn clip_to_hemisphere(&self, normal: &Vec3) -> Vec<Vec<Vec3>> {
        let gnomonic = Gnomonic::new(self.center);
        let Some(coords) = gnomonic.project_all(&self.vertices, PROJECTION_MIN_DOT) else {
            return Vec::new();
        };

        // Tangent-plane point (x, y) represents center + x*east + y*north.
        let alpha = dot(normal, &gnomonic.center);
        let beta = dot(normal, &gnomonic.east);
        let gamma = dot(normal, &gnomonic.north);

        let (mut min_x, mut max_x, mut min_y, mut max_y) =
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for c in &coords {
            min_x = min_x.min(c.x);
            max_x = max_x.max(c.x);
            min_y = min_y.min(c.y);
            max_y = max_y.max(c.y);
        }
        let margin = 1.0 + (max_x - min_x).max(max_y - min_y);
        let frame = [
            Coord { x: min_x - margin, y: min_y - margin },
            Coord { x: max_x + margin, y: min_y - margin },
            Coord { x: max_x + margin, y: max_y + margin },
            Coord { x: min_x - margin, y: max_y + margin },
        ];

        let half_plane = clip_convex(&frame, |c| alpha + beta * c.x + gamma * c.y);
        if half_plane.len() < 3 {
            return Vec::new();
        }

        let clipped = BooleanOps::intersection(&to_geo_polygon(coords), &to_geo_polygon(half_plane));
        open_rings(&clipped)
            .iter()
            .map(|ring| ring.iter().filter_map(|c| gnomonic.unproject(c)).collect())
            .collect()
    }
}

/// Tangent-plane projection centred on a unit vector
struct Gnomonic {
    center: Vec3,
    east: Vec3,
    north: Vec3,
}

impl Gnomonic {
    fn new(center: Vec3) -> Self {
        let reference = if center[2].abs() < 0.9 {
            [0.0, 0.0, 1.0]
        } else {
            [1.0, 0.0, 0.0]
        };
        let east = normalize(&cross(&reference, &center)).unwrap_or([0.0, 1.0, 0.0]);
        let north = cross(&center, &east);
        Self {
            center,
            east,
            north,
        }
    }

    fn project(&self, v: &Vec3, min_dot: f64) -> Option<Coord<f64>> {
        let d = dot(&self.center, v);
        if d <= min_dot {
            return None;
        }
        Some(Coord {
            x: dot(&self.east, v) / d,
            y: dot(&self.north, v) / d,
        })
    }

    fn project_all(&self, vertices: &[Vec3], min_dot: f64) -> Option<Vec<Coord<f64>>> {
        vertices.iter().map(|v| self.project(v, min_dot)).collect()
    }

    fn unproject(&self, c: &Coord<f64>) -> Option<Vec3> {
        let v = add(
            &self.center,
            &add(&scale(&self.east, c.x), &scale(&self.north, c.y)),
        );
        normalize(&v)
    }
}

fn project_pieces(gnomonic: &Gnomonic, pieces: &[Vec<Vec3>]) -> Option<geo::MultiPolygon<f64>> {
    let polygons = pieces
        .iter()
        .filter(|piece| piece.len() >= 3)
        .map(|piece| {
            gnomonic
                .project_all(piece, PROJECTION_MIN_DOT)
                .map(to_geo_polygon)
        })
        .collect::<Option<Vec<_>>>()?;
    Some(geo::MultiPolygon::new(polygons))
}

/// Sutherland-Hodgman step of a convex polygon against `side(c) >= 0`
fn clip_convex(polygon: &[Coord<f64>], side: impl Fn(&Coord<f64>) -> f64) -> Vec<Coord<f64>> {
    let n = polygon.len();
    let mut clipped = Vec::with_capacity(n + 1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        let (da, db) = (side(&a), side(&b));
        if da >= 0.0 {
            clipped.push(a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            let t = da / (da - db);
            clipped.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
        }
    }
    clipped
}

fn locate_on_arc(a: &Vec3, b: &Vec3, p: &Vec3, segment: usize) -> LinePosition {
    let to_a = angle(p, a);
    let to_b = angle(p, b);
    let nearest_end = if to_b < to_a {
        LinePosition { segment, fraction: 1.0, distance: to_b }
    } else {
        LinePosition { segment, fraction: 0.0, distance: to_a }
    };

    let length = angle(a, b);
    if length < ANGLE_EPS {
        return LinePosition { segment, fraction: 0.0, distance: to_a };
    }
    let Some(normal) = normalize(&cross(a, b)) else {
        return nearest_end;
    };
    let Some(foot) = normalize(&add(p, &scale(&normal, -dot(p, &normal)))) else {
        return nearest_end;
    };

    let (from_a, to_end) = (angle(a, &foot), angle(&foot, b));
    if (from_a + to_end - length).abs() < 1e-9 {
        LinePosition {
            segment,
            fraction: (from_a / length).clamp(0.0, 1.0),
            distance: angle(p, &foot),
        }
    } else {
        nearest_end
    }
}

fn to_xyz(point: &Point) -> Vec3 {
    let (lon, lat) = (point.lon.to_radians(), point.lat.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn to_point(v: &Vec3) -> Point {
    Point::new(
        v[1].atan2(v[0]).to_degrees(),
        v[2].atan2(v[0].hypot(v[1])).to_degrees(),
    )
}

fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: &Vec3, factor: f64) -> Vec3 {
    [a[0] * factor, a[1] * factor, a[2] * factor]
}

fn normalize(v: &Vec3) -> Option<Vec3> {
    let length = dot(v, v).sqrt();
    (length > 1e-300).then(|| scale(v, 1.0 / length))
}

/// Angle between two unit vectors, stable for small and near-antipodal pairs
fn angle(a: &Vec3, b: &Vec3) -> f64 {
    let c = cross(a, b);
    dot(&c, &c).sqrt().atan2(dot(a, b))
}
