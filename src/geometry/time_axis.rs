use chrono::{DateTime, Duration, Utc};

use super::{Geometry, LineString, Point};
use crate::types::{MatchError, MatchResult, TimeInterval};

/// Ground-track centerline annotated with its acquisition time range.
///
/// Vertex times are spread evenly over [start, end]. A query point is
/// projected onto the nearest segment (the first one on ties) and its time
/// interpolated between the two bracketing vertices. Projections are clamped
/// to the segment ends, so points beyond the line map to start or end.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    line: LineString,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeAxis {
    pub fn new(line: LineString, start: DateTime<Utc>, end: DateTime<Utc>) -> MatchResult<Self> {
        if end < start {
            return Err(MatchError::Geometry(format!(
                "Time axis end {} is before start {}",
                end, start
            )));
        }
        if line.is_empty() {
            return Err(MatchError::Geometry(
                "Time axis requires at least one vertex".to_string(),
            ));
        }
        Ok(Self { line, start, end })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn geometry(&self) -> &LineString {
        &self.line
    }

    fn vertex_offset_ms(&self, index: usize) -> i64 {
        let count = self.line.points().len();
        if count < 2 {
            return 0;
        }
        let total = (self.end - self.start).num_milliseconds();
        if index + 1 >= count {
            total
        } else {
            total * index as i64 / (count - 1) as i64
        }
    }

    pub fn get_time(&self, point: &Point) -> DateTime<Utc> {
        let points = self.line.points();
        if let Some(index) = points.iter().position(|p| p == point) {
            return self.start + Duration::milliseconds(self.vertex_offset_ms(index));
        }

        let Some(position) = self.line.locate(point) else {
            return self.start;
        };
        if points.len() < 2 {
            return self.start;
        }

        let from = self.vertex_offset_ms(position.segment);
        let to = self.vertex_offset_ms(position.segment + 1);
        let offset = from + ((to - from) as f64 * position.fraction).round() as i64;
        self.start + Duration::milliseconds(offset)
    }

    /// Sensing time range covered by the coordinates of `geometry`,
    /// `None` for an empty geometry
    pub fn intersection_time(&self, geometry: &Geometry) -> Option<TimeInterval> {
        let times: Vec<DateTime<Utc>> = geometry
            .coordinates()
            .iter()
            .map(|p| self.get_time(p))
            .collect();
        let start = times.iter().min()?;
        let stop = times.iter().max()?;
        Some(TimeInterval {
            start: *start,
            stop: *stop,
        })
    }
}
