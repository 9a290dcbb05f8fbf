use chrono::{DateTime, Utc};

use crate::types::{MatchError, MatchResult, SatelliteObservation};

/// Filter for observation queries; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameter {
    pub sensor_name: Option<String>,
    pub version: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
}

impl QueryParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensor(mut self, sensor_name: &str) -> Self {
        self.sensor_name = Some(sensor_name.to_string());
        self
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.map(str::to_string);
        self
    }

    pub fn with_time_range(mut self, start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.stop_time = Some(stop);
        self
    }

    pub fn matches(&self, observation: &SatelliteObservation) -> bool {
        if let Some(sensor) = &self.sensor_name {
            if &observation.sensor.name != sensor {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if &observation.version != version {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if observation.stop_time < start {
                return false;
            }
        }
        if let Some(stop) = self.stop_time {
            if observation.start_time > stop {
                return false;
            }
        }
        true
    }
}

/// Persistent index of ingested observations
pub trait ObservationStore: Send + Sync {
    fn insert(&mut self, observation: SatelliteObservation) -> MatchResult<()>;

    /// Matching observations ordered by start time, then file path
    fn get(&self, query: &QueryParameter) -> MatchResult<Vec<SatelliteObservation>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    observations: Vec<SatelliteObservation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObservationStore for MemoryStore {
    fn insert(&mut self, observation: SatelliteObservation) -> MatchResult<()> {
        if self
            .observations
            .iter()
            .any(|o| o.data_file_path == observation.data_file_path && o.version == observation.version)
        {
            return Err(MatchError::Store(format!(
                "Observation '{}' version '{}' is already stored",
                observation.data_file_path.display(),
                observation.version
            )));
        }
        self.observations.push(observation);
        Ok(())
    }

    fn get(&self, query: &QueryParameter) -> MatchResult<Vec<SatelliteObservation>> {
        let mut found: Vec<SatelliteObservation> = self
            .observations
            .iter()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.data_file_path.cmp(&b.data_file_path))
        });
        Ok(found)
    }

    fn len(&self) -> usize {
        self.observations.len()
    }
}
