//! swathmatch: spatio-temporal match-ups of satellite swath observations
//!
//! The library derives bounding polygons and time axes from per-pixel
//! geo-location grids, intersects the bounds of observation pairs in space
//! and time, and builds pixel-level match-ups from quasi-random seed points.

pub mod types;
pub mod geometry;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionInfo, Dimension, EpochMillis, Interval, MatchError, MatchResult, NodeType,
    SamplingPoint, SatelliteObservation, Sensor, TimeInterval,
};

pub use geometry::{Geometry, GeometryFactory, GeometryType, Point, Polygon, TimeAxis};
pub use io::{MemoryStore, ObservationStore, Reader, ReaderFactory, UseCaseConfig};
pub use crate::core::{
    BoundingPolygonCreator, IntersectionEngine, MatchupCollection, MatchupContext,
    SeedPointMatchupStrategy,
};
