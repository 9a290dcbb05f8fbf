use chrono::{DateTime, Utc};
use ndarray::ArrayView2;

use crate::geometry::{wkt, Geometry, GeometryFactory, LineString, Point, Polygon, TimeAxis};
use crate::types::{AcquisitionInfo, Interval, MatchError, MatchResult, NodeType, TimeInterval};

/// Largest number of along-track bands tried before giving up
pub const MAX_SPLIT_DEPTH: usize = 4;

/// Boundary of a swath walked in node-dependent order
#[derive(Debug, Clone)]
pub struct PixelCodedBoundary {
    pub points: Vec<Point>,
    /// Index of the first boundary point on the along-track edge
    pub time_axis_start: usize,
    /// One past the last boundary point on the along-track edge
    pub time_axis_end: usize,
}

/// Derives bounding polygons and time axes from lat/lon pixel grids.
///
/// Grids are indexed `[row, column]` with rows being scan lines. The
/// boundary walk goes down the left column, along the bottom row, up the
/// right column and back along the top row, sampling every `interval`
/// pixels.
pub struct BoundingPolygonCreator {
    interval: Interval,
    factory: GeometryFactory,
}

impl BoundingPolygonCreator {
    pub fn new(interval: Interval, factory: GeometryFactory) -> Self {
        Self { interval, factory }
    }

    /// Creator from raw strides; fails for non-positive values
    pub fn with_strides(x: i32, y: i32, factory: GeometryFactory) -> MatchResult<Self> {
        Ok(Self::new(Interval::new(x, y)?, factory))
    }

    /// Appends the first point when there is more than one point
    pub fn close_polygon(points: &mut Vec<Point>) {
        if points.len() > 1 {
            let first = points[0];
            points.push(first);
        }
    }

    pub fn plot_multi_polygon(polygons: &[Polygon]) -> String {
        wkt::format_multi_polygon(polygons)
    }

    pub fn create_bounding_geometry(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
    ) -> MatchResult<Geometry> {
        let (height, _) = check_grids(&lons, &lats)?;
        Ok(Geometry::Polygon(self.band_polygon(&lons, &lats, 0, height - 1, false)))
    }

    pub fn create_bounding_geometry_clockwise(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
    ) -> MatchResult<Geometry> {
        let (height, _) = check_grids(&lons, &lats)?;
        Ok(Geometry::Polygon(self.band_polygon(&lons, &lats, 0, height - 1, true)))
    }

    /// One polygon per along-track band, collected in band order
    pub fn create_bounding_geometry_split(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
        num_splits: usize,
        clockwise: bool,
    ) -> MatchResult<Geometry> {
        let (height, _) = check_grids(&lons, &lats)?;
        let polygons = band_ranges(height, num_splits)?
            .into_iter()
            .map(|(y_min, y_max)| {
                Geometry::Polygon(self.band_polygon(&lons, &lats, y_min, y_max, clockwise))
            })
            .collect();
        Ok(self.factory.create_collection(polygons))
    }

    pub fn create_time_axis_geometry(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
    ) -> MatchResult<LineString> {
        let (height, _) = check_grids(&lons, &lats)?;
        Ok(self.centerline(&lons, &lats, 0, height - 1))
    }

    pub fn create_time_axis_geometry_split(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
        num_splits: usize,
    ) -> MatchResult<Geometry> {
        let (height, _) = check_grids(&lons, &lats)?;
        let lines = band_ranges(height, num_splits)?
            .into_iter()
            .map(|(y_min, y_max)| Geometry::LineString(self.centerline(&lons, &lats, y_min, y_max)))
            .collect();
        Ok(self.factory.create_collection(lines))
    }

    /// Bounding geometry plus time axes for one file.
    ///
    /// A single polygon is used when valid; otherwise the swath is split into
    /// 2..=`MAX_SPLIT_DEPTH` bands, each band receiving an even share of the
    /// sensing time.
    pub fn create_acquisition_info(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
        sensing_start: DateTime<Utc>,
        sensing_stop: DateTime<Utc>,
        node_type: NodeType,
    ) -> MatchResult<AcquisitionInfo> {
        let (height, _) = check_grids(&lons, &lats)?;
        let sensing = TimeInterval::new(sensing_start, sensing_stop)?;
        let boundary = self.create_pixel_coded_boundary(lons, lats, node_type)?;

        for depth in 1..=MAX_SPLIT_DEPTH {
            let bands = match band_ranges(height, depth) {
                Ok(bands) => bands,
                Err(e) => {
                    log::debug!("Stopping split search at depth {}: {}", depth, e);
                    break;
                }
            };

            let polygons: Vec<Polygon> = bands
                .iter()
                .map(|&(y_min, y_max)| self.band_polygon(&lons, &lats, y_min, y_max, false))
                .collect();
            if polygons.is_empty() {
                return Err(MatchError::Geometry(
                    "Boundary walk produced no polygons".to_string(),
                ));
            }
            if !polygons.iter().all(Polygon::is_valid) {
                log::debug!("Bounding geometry with {} segment(s) is invalid", depth);
                continue;
            }

            let mut time_axes = Vec::with_capacity(bands.len());
            for (&(y_min, y_max), interval) in bands.iter().zip(sensing.split(depth)?) {
                let line = self.centerline(&lons, &lats, y_min, y_max);
                time_axes.push(TimeAxis::new(line, interval.start, interval.stop)?);
            }

            let bounding_geometry = if depth == 1 {
                polygons.into_iter().map(Geometry::Polygon).next().ok_or_else(|| {
                    MatchError::Geometry("Boundary walk produced no polygons".to_string())
                })?
            } else {
                log::info!("Swath bounding geometry split into {} segments", depth);
                self.factory
                    .create_collection(polygons.into_iter().map(Geometry::Polygon).collect())
            };

            return Ok(AcquisitionInfo {
                sensing_start,
                sensing_stop,
                node_type,
                bounding_geometry,
                time_axes,
                time_axis_start_index: boundary.time_axis_start,
                time_axis_end_index: boundary.time_axis_end,
            });
        }

        Err(MatchError::Geometry(format!(
            "No valid bounding geometry found with up to {} segments",
            MAX_SPLIT_DEPTH
        )))
    }

    /// Node-dependent walk: ascending passes start with the top row, all
    /// others with the right column. The right column is the along-track
    /// edge; its points occupy `time_axis_start..time_axis_end`.
    pub fn create_pixel_coded_boundary(
        &self,
        lons: ArrayView2<f64>,
        lats: ArrayView2<f64>,
        node_type: NodeType,
    ) -> MatchResult<PixelCodedBoundary> {
        let (height, width) = check_grids(&lons, &lats)?;
        let (x_max, y_max) = (width - 1, height - 1);
        let (ix, iy) = self.strides();
        let at = |x: usize, y: usize| point_at(&lons, &lats, x, y);

        let mut points = Vec::new();
        let right_column = |points: &mut Vec<Point>| {
            let first = points.len();
            let mut y = 0;
            while y < y_max {
                points.push(at(x_max, y));
                y += iy;
            }
            (first, points.len())
        };

        let (time_axis_start, time_axis_end) = if node_type == NodeType::Ascending {
            let mut x = 0;
            while x < x_max {
                points.push(at(x, 0));
                x += ix;
            }
            let range = right_column(&mut points);
            walk_bottom_and_left(&mut points, &at, x_max, y_max, ix, iy);
            range
        } else {
            let range = right_column(&mut points);
            walk_bottom_and_left(&mut points, &at, x_max, y_max, ix, iy);
            let mut x = 0;
            while x < x_max {
                points.push(at(x, 0));
                x += ix;
            }
            range
        };

        if self.factory.requires_closed_rings() {
            Self::close_polygon(&mut points);
        }

        Ok(PixelCodedBoundary {
            points,
            time_axis_start,
            time_axis_end,
        })
    }

    fn strides(&self) -> (usize, usize) {
        (self.interval.x() as usize, self.interval.y() as usize)
    }

    fn band_polygon(
        &self,
        lons: &ArrayView2<f64>,
        lats: &ArrayView2<f64>,
        y_min: usize,
        y_max: usize,
        clockwise: bool,
    ) -> Polygon {
        let mut points = self.boundary_walk(lons, lats, y_min, y_max);
        if clockwise && points.len() > 1 {
            points[1..].reverse();
        }
        if self.factory.requires_closed_rings() {
            Self::close_polygon(&mut points);
        }
        self.factory.create_polygon(&points)
    }

    /// Counter-clockwise border walk of rows `y_min..=y_max`, without closing point
    fn boundary_walk(
        &self,
        lons: &ArrayView2<f64>,
        lats: &ArrayView2<f64>,
        y_min: usize,
        y_max: usize,
    ) -> Vec<Point> {
        let (ix, iy) = self.strides();
        let x_max = lons.ncols() - 1;
        let mut points = Vec::new();

        let mut y = y_min;
        while y < y_max {
            points.push(point_at(lons, lats, 0, y));
            y += iy;
        }

        let mut x = 0;
        while x < x_max {
            points.push(point_at(lons, lats, x, y_max));
            x += ix;
        }

        let mut y = y_max;
        while y > y_min {
            points.push(point_at(lons, lats, x_max, y));
            y = y.saturating_sub(iy);
        }

        let mut x = x_max;
        while x > 0 {
            points.push(point_at(lons, lats, x, y_min));
            x = x.saturating_sub(ix);
        }

        points
    }

    /// Centre-column line of rows `y_min..=y_max`, always ending on `y_max`
    fn centerline(
        &self,
        lons: &ArrayView2<f64>,
        lats: &ArrayView2<f64>,
        y_min: usize,
        y_max: usize,
    ) -> LineString {
        let (_, iy) = self.strides();
        let column = lons.ncols() / 2;
        let mut points = Vec::new();

        let mut y = y_min;
        while y < y_max {
            points.push(point_at(lons, lats, column, y));
            y += iy;
        }
        points.push(point_at(lons, lats, column, y_max));

        self.factory.create_line_string(&points)
    }
}

fn walk_bottom_and_left(
    points: &mut Vec<Point>,
    at: &impl Fn(usize, usize) -> Point,
    x_max: usize,
    y_max: usize,
    ix: usize,
    iy: usize,
) {
    let mut x = x_max;
    while x > 0 {
        points.push(at(x, y_max));
        x = x.saturating_sub(ix);
    }
    let mut y = y_max;
    while y > 0 {
        points.push(at(0, y));
        y = y.saturating_sub(iy);
    }
}

fn point_at(lons: &ArrayView2<f64>, lats: &ArrayView2<f64>, x: usize, y: usize) -> Point {
    Point::new(lons[[y, x]], lats[[y, x]])
}

/// Validates grid shapes and returns (rows, columns)
fn check_grids(lons: &ArrayView2<f64>, lats: &ArrayView2<f64>) -> MatchResult<(usize, usize)> {
    if lons.dim() != lats.dim() {
        return Err(MatchError::MissingData(format!(
            "Longitude grid {:?} and latitude grid {:?} differ in shape",
            lons.dim(),
            lats.dim()
        )));
    }
    let (height, width) = lons.dim();
    if height < 2 || width < 2 {
        return Err(MatchError::MissingData(format!(
            "Grid of {} x {} pixels is too small for a bounding polygon",
            height, width
        )));
    }
    Ok((height, width))
}

/// Row ranges of `num_splits` contiguous bands. Adjacent bands share their
/// boundary row and the last band ends on the last row.
fn band_ranges(height: usize, num_splits: usize) -> MatchResult<Vec<(usize, usize)>> {
    if num_splits == 0 {
        return Err(MatchError::Config(
            "Number of splits must be greater than zero".to_string(),
        ));
    }
    let last_row = height - 1;
    let band_rows = last_row / num_splits;
    if band_rows == 0 {
        return Err(MatchError::Geometry(format!(
            "Cannot split {} rows into {} bands",
            height, num_splits
        )));
    }

    Ok((0..num_splits)
        .map(|i| {
            let y_min = i * band_rows;
            let y_max = if i + 1 == num_splits {
                last_row
            } else {
                (i + 1) * band_rows
            };
            (y_min, y_max)
        })
        .collect())
}
