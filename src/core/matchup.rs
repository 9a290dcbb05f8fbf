use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::EpochMillis;

/// One pixel of one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: i32,
    pub y: i32,
    pub lon: f64,
    pub lat: f64,
    pub time: EpochMillis,
}

impl Sample {
    pub fn new(x: i32, y: i32, lon: f64, lat: f64, time: EpochMillis) -> Self {
        Self { x, y, lon, lat, time }
    }
}

/// A primary sample with the secondary samples matched to it, keyed by sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub primary: Sample,
    secondaries: BTreeMap<String, Sample>,
}

impl SampleSet {
    pub fn new(primary: Sample) -> Self {
        Self {
            primary,
            secondaries: BTreeMap::new(),
        }
    }

    pub fn set_secondary(&mut self, sensor: &str, sample: Sample) {
        self.secondaries.insert(sensor.to_string(), sample);
    }

    pub fn secondary(&self, sensor: &str) -> Option<&Sample> {
        self.secondaries.get(sensor)
    }

    pub fn secondaries(&self) -> &BTreeMap<String, Sample> {
        &self.secondaries
    }
}

/// Sample sets of one primary/secondary file pairing
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupSet {
    pub primary_observation_path: PathBuf,
    pub primary_processing_version: String,
    pub secondary_sensor: String,
    pub secondary_observation_path: PathBuf,
    pub secondary_processing_version: String,
    sample_sets: Vec<SampleSet>,
}

impl MatchupSet {
    pub fn new(
        primary_observation_path: &Path,
        primary_processing_version: &str,
        secondary_sensor: &str,
        secondary_observation_path: &Path,
        secondary_processing_version: &str,
    ) -> Self {
        Self {
            primary_observation_path: primary_observation_path.to_path_buf(),
            primary_processing_version: primary_processing_version.to_string(),
            secondary_sensor: secondary_sensor.to_string(),
            secondary_observation_path: secondary_observation_path.to_path_buf(),
            secondary_processing_version: secondary_processing_version.to_string(),
            sample_sets: Vec::new(),
        }
    }

    pub fn sample_sets(&self) -> &[SampleSet] {
        &self.sample_sets
    }

    pub fn set_sample_sets(&mut self, sample_sets: Vec<SampleSet>) {
        self.sample_sets = sample_sets;
    }

    /// Keeps only the sample sets accepted by `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&SampleSet) -> bool,
    {
        self.sample_sets.retain(keep);
    }

    pub fn num_observations(&self) -> usize {
        self.sample_sets.len()
    }
}

/// Result of a match-up run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchupCollection {
    sets: Vec<MatchupSet>,
}

impl MatchupCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set; sets without sample sets are dropped
    pub fn add(&mut self, set: MatchupSet) {
        if set.num_observations() == 0 {
            log::debug!(
                "Dropping empty matchup set {} / {}",
                set.primary_observation_path.display(),
                set.secondary_observation_path.display()
            );
            return;
        }
        self.sets.push(set);
    }

    pub fn sets(&self) -> &[MatchupSet] {
        &self.sets
    }

    pub fn num_matchup_sets(&self) -> usize {
        self.sets.len()
    }

    /// Total number of sample sets over all matchup sets
    pub fn num_matchups(&self) -> usize {
        self.sets.iter().map(MatchupSet::num_observations).sum()
    }

    /// Orders sets by primary, then secondary file path
    pub fn sort_by_paths(&mut self) {
        self.sets.sort_by(|a, b| {
            a.primary_observation_path
                .cmp(&b.primary_observation_path)
                .then_with(|| a.secondary_sensor.cmp(&b.secondary_sensor))
                .then_with(|| a.secondary_observation_path.cmp(&b.secondary_observation_path))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(primary: &str, secondary: &str, samples: usize) -> MatchupSet {
        let mut set = MatchupSet::new(
            Path::new(primary),
            "v1",
            "mhs-n18",
            Path::new(secondary),
            "v2",
        );
        set.set_sample_sets(
            (0..samples)
                .map(|i| SampleSet::new(Sample::new(i as i32, 0, 0.0, 0.0, 0)))
                .collect(),
        );
        set
    }

    #[test]
    fn test_empty_sets_are_dropped() {
        let mut collection = MatchupCollection::new();
        collection.add(set("/p/a.nc", "/s/a.nc", 0));
        collection.add(set("/p/a.nc", "/s/b.nc", 3));
        assert_eq!(collection.num_matchup_sets(), 1);
        assert_eq!(collection.num_matchups(), 3);
    }

    #[test]
    fn test_sort_by_paths() {
        let mut collection = MatchupCollection::new();
        collection.add(set("/p/b.nc", "/s/a.nc", 1));
        collection.add(set("/p/a.nc", "/s/c.nc", 1));
        collection.add(set("/p/a.nc", "/s/b.nc", 1));
        collection.sort_by_paths();

        let order: Vec<_> = collection
            .sets()
            .iter()
            .map(|s| (s.primary_observation_path.clone(), s.secondary_observation_path.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (PathBuf::from("/p/a.nc"), PathBuf::from("/s/b.nc")),
                (PathBuf::from("/p/a.nc"), PathBuf::from("/s/c.nc")),
                (PathBuf::from("/p/b.nc"), PathBuf::from("/s/a.nc")),
            ]
        );
    }

    #[test]
    fn test_sample_set_secondaries() {
        let mut sample_set = SampleSet::new(Sample::new(1, 2, 3.0, 4.0, 5));
        assert!(sample_set.secondary("mhs-n18").is_none());
        sample_set.set_secondary("mhs-n18", Sample::new(7, 8, 3.1, 4.1, 6));
        assert_eq!(sample_set.secondary("mhs-n18").unwrap().x, 7);
        assert_eq!(sample_set.secondaries().len(), 1);
    }
}
