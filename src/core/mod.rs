//! Bounding geometry derivation, intersection and match-up construction

pub mod bounding_polygon;
pub mod conditions;
pub mod ingestion;
pub mod intersection;
pub mod matchup;
pub mod sampling;
pub mod seed_point;

pub use bounding_polygon::{BoundingPolygonCreator, PixelCodedBoundary};
pub use conditions::{ConditionEngine, Screening, ScreeningEngine};
pub use ingestion::{find_input_files, ingest_file, ingest_files, IngestionReport};
pub use intersection::{calculate_time_info, Intersection, IntersectionEngine, TimeInfo};
pub use matchup::{MatchupCollection, MatchupSet, Sample, SampleSet};
pub use sampling::{create_random_points, get_num_random_points, SobolSamplingPointGenerator};
pub use seed_point::{
    filter_seed_points, CancellationToken, MatchupContext, SampleCollector, SeedPointMatchupStrategy,
};
