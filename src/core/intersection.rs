use chrono::Duration;

use crate::geometry::Geometry;
use crate::types::{MatchResult, SatelliteObservation, TimeInterval};

/// Temporal relation of two segment time windows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInfo {
    /// Smallest absolute time difference between the windows, zero when they overlap
    pub min_time_delta: Duration,
    pub overlap: Option<TimeInterval>,
}

/// One intersecting primary/secondary segment pair
#[derive(Debug, Clone)]
pub struct Intersection {
    pub geometry: Geometry,
    pub primary_segment: usize,
    pub secondary_segment: usize,
    pub primary_geometry: Geometry,
    pub secondary_geometry: Geometry,
    /// Sensing time covered by the intersection on each side, when a time axis exists
    pub primary_sensing: Option<TimeInterval>,
    pub secondary_sensing: Option<TimeInterval>,
    pub time_info: TimeInfo,
}

pub fn calculate_time_info(first: &TimeInterval, second: &TimeInterval) -> TimeInfo {
    let start = first.start.max(second.start);
    let stop = first.stop.min(second.stop);
    if start <= stop {
        return TimeInfo {
            min_time_delta: Duration::zero(),
            overlap: Some(TimeInterval { start, stop }),
        };
    }
    TimeInfo {
        min_time_delta: start - stop,
        overlap: None,
    }
}

/// Pairs the bounding segments of two observations in space and time
pub struct IntersectionEngine {
    max_time_delta: Duration,
}

impl IntersectionEngine {
    pub fn new(max_time_delta: Duration) -> Self {
        Self { max_time_delta }
    }

    /// All segment pairs whose geometries overlap and whose time windows are
    /// closer than the configured maximum delta
    pub fn get_intersecting_intervals(
        &self,
        primary: &SatelliteObservation,
        secondary: &SatelliteObservation,
    ) -> MatchResult<Vec<Intersection>> {
        let mut intersections = Vec::new();

        for (i, primary_segment) in primary.geo_bounds.segments().into_iter().enumerate() {
            let primary_window = primary.segment_time_window(i);

            for (j, secondary_segment) in secondary.geo_bounds.segments().into_iter().enumerate() {
                let secondary_window = secondary.segment_time_window(j);
                let time_info = calculate_time_info(&primary_window, &secondary_window);
                if time_info.min_time_delta >= self.max_time_delta {
                    continue;
                }

                let geometry = primary_segment.intersection(secondary_segment)?;
                if geometry.is_empty() {
                    continue;
                }

                log::debug!(
                    "Segments {}/{} of {} and {} intersect, time delta {} s",
                    i,
                    j,
                    primary.data_file_path.display(),
                    secondary.data_file_path.display(),
                    time_info.min_time_delta.num_seconds()
                );

                intersections.push(Intersection {
                    primary_sensing: primary
                        .time_axes
                        .get(i)
                        .and_then(|axis| axis.intersection_time(&geometry)),
                    secondary_sensing: secondary
                        .time_axes
                        .get(j)
                        .and_then(|axis| axis.intersection_time(&geometry)),
                    geometry,
                    primary_segment: i,
                    secondary_segment: j,
                    primary_geometry: primary_segment.clone(),
                    secondary_geometry: secondary_segment.clone(),
                    time_info,
                });
            }
        }

        Ok(intersections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(start: i64, stop: i64) -> TimeInterval {
        TimeInterval::new(
            Utc.timestamp_opt(start, 0).unwrap(),
            Utc.timestamp_opt(stop, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_overlapping_windows() {
        let info = calculate_time_info(&window(0, 100), &window(50, 200));
        assert_eq!(info.min_time_delta, Duration::zero());
        assert_eq!(info.overlap, Some(window(50, 100)));
    }

    #[test]
    fn test_disjoint_windows() {
        let info = calculate_time_info(&window(0, 100), &window(400, 500));
        assert_eq!(info.min_time_delta, Duration::seconds(300));
        assert!(info.overlap.is_none());

        let reversed = calculate_time_info(&window(400, 500), &window(0, 100));
        assert_eq!(reversed.min_time_delta, Duration::seconds(300));
    }

    #[test]
    fn test_touching_windows() {
        let info = calculate_time_info(&window(0, 100), &window(100, 200));
        assert_eq!(info.min_time_delta, Duration::zero());
        assert_eq!(info.overlap, Some(window(100, 100)));
    }
}
