use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geometry::{Geometry, TimeAxis};

/// Epoch milliseconds, the time unit carried by samples and seed points
pub type EpochMillis = i64;

/// Direction of satellite travel relative to the equator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Ascending,
    Descending,
    Undefined,
}

impl NodeType {
    /// Numeric id used by the metadata store
    pub fn id(&self) -> u8 {
        match self {
            NodeType::Ascending => 0,
            NodeType::Descending => 1,
            NodeType::Undefined => 2,
        }
    }

    pub fn from_id(id: u8) -> MatchResult<Self> {
        match id {
            0 => Ok(NodeType::Ascending),
            1 => Ok(NodeType::Descending),
            2 => Ok(NodeType::Undefined),
            _ => Err(MatchError::MissingData(format!("Invalid node type id: {}", id))),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Ascending => write!(f, "ASCENDING"),
            NodeType::Descending => write!(f, "DESCENDING"),
            NodeType::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// Positive (x, y) pixel stride, also used as a window size for raw reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    x: i32,
    y: i32,
}

impl Interval {
    pub fn new(x: i32, y: i32) -> MatchResult<Self> {
        if x <= 0 || y <= 0 {
            return Err(MatchError::Config(format!(
                "Interval strides must be greater than zero, got ({}, {})",
                x, y
            )));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }
}

/// Named 2-D extent: product sizes and extraction window sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub nx: usize,
    pub ny: usize,
}

impl Dimension {
    pub fn new(name: &str, nx: usize, ny: usize) -> Self {
        Self {
            name: name.to_string(),
            nx,
            ny,
        }
    }
}

/// Closed time range [start, stop]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> MatchResult<Self> {
        if stop < start {
            return Err(MatchError::MissingData(format!(
                "Time interval stop {} is before start {}",
                stop, start
            )));
        }
        Ok(Self { start, stop })
    }

    pub fn duration(&self) -> Duration {
        self.stop - self.start
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.stop
    }

    /// Splits into `count` contiguous sub-intervals of equal wall-clock length.
    /// The last sub-interval always ends exactly at `stop`.
    pub fn split(&self, count: usize) -> MatchResult<Vec<TimeInterval>> {
        if count == 0 {
            return Err(MatchError::Config(
                "Cannot split a time interval into zero parts".to_string(),
            ));
        }

        let start_ms = self.start.timestamp_millis();
        let total_ms = self.stop.timestamp_millis() - start_ms;

        let mut boundaries = Vec::with_capacity(count + 1);
        for i in 0..=count as i64 {
            let offset = if i == count as i64 {
                total_ms
            } else {
                total_ms * i / count as i64
            };
            boundaries.push(from_epoch_millis(start_ms + offset)?);
        }

        Ok(boundaries
            .windows(2)
            .map(|pair| TimeInterval {
                start: pair[0],
                stop: pair[1],
            })
            .collect())
    }
}

pub fn from_epoch_millis(millis: EpochMillis) -> MatchResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MatchError::MissingData(format!("Time out of range: {} ms", millis)))
}

/// Quasi-random seed point (lon, lat, time)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPoint {
    pub lon: f64,
    pub lat: f64,
    pub time: EpochMillis,
}

impl SamplingPoint {
    pub fn new(lon: f64, lat: f64, time: EpochMillis) -> Self {
        Self { lon, lat, time }
    }
}

/// Sensor identity as stored with an observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sensor {
    pub name: String,
    pub data_version: Option<String>,
}

impl Sensor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_version: None,
        }
    }
}

/// Metadata extracted from one opened file
#[derive(Debug, Clone)]
pub struct AcquisitionInfo {
    pub sensing_start: DateTime<Utc>,
    pub sensing_stop: DateTime<Utc>,
    pub node_type: NodeType,
    /// Polygon, or a collection of polygons when the swath had to be split
    pub bounding_geometry: Geometry,
    /// One axis per bounding segment, in along-track order
    pub time_axes: Vec<TimeAxis>,
    /// Along-track edge of the node-dependent pixel boundary, as the
    /// half-open range `time_axis_start_index..time_axis_end_index`
    pub time_axis_start_index: usize,
    pub time_axis_end_index: usize,
}

/// Persisted record of one satellite data file
#[derive(Debug, Clone)]
pub struct SatelliteObservation {
    pub sensor: Sensor,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub node_type: NodeType,
    pub geo_bounds: Geometry,
    pub data_file_path: PathBuf,
    pub version: String,
    pub time_axis_start_index: usize,
    pub time_axis_end_index: usize,
    pub time_axes: Vec<TimeAxis>,
}

impl SatelliteObservation {
    pub fn from_acquisition_info(
        info: AcquisitionInfo,
        sensor: Sensor,
        data_file_path: PathBuf,
        version: &str,
    ) -> Self {
        Self {
            sensor,
            start_time: info.sensing_start,
            stop_time: info.sensing_stop,
            node_type: info.node_type,
            geo_bounds: info.bounding_geometry,
            data_file_path,
            version: version.to_string(),
            time_axis_start_index: info.time_axis_start_index,
            time_axis_end_index: info.time_axis_end_index,
            time_axes: info.time_axes,
        }
    }

    pub fn sensing_interval(&self) -> TimeInterval {
        TimeInterval {
            start: self.start_time,
            stop: self.stop_time,
        }
    }

    pub fn is_segmented(&self) -> bool {
        self.geo_bounds.is_segmented()
    }

    /// Time window of one bounding segment: the bounds of its time axis,
    /// or the whole sensing interval when no axis was recorded
    pub fn segment_time_window(&self, segment: usize) -> TimeInterval {
        match self.time_axes.get(segment) {
            Some(axis) => TimeInterval {
                start: axis.start_time(),
                stop: axis.end_time(),
            },
            None => self.sensing_interval(),
        }
    }
}

/// Error types for match-up processing
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Missing or malformed data: {0}")]
    MissingData(String),

    #[error("WKT parsing error: {0}")]
    WktParse(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Metadata store error: {0}")]
    Store(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Processing cancelled")]
    Cancelled,
}

impl MatchError {
    /// Errors that must abort a whole run rather than a single file or pair
    pub fn is_fatal(&self) -> bool {
        matches!(self, MatchError::Config(_) | MatchError::Cancelled)
    }
}

/// Result type for match-up operations
pub type MatchResult<T> = Result<T, MatchError>;
