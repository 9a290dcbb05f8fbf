use std::path::{Path, PathBuf};

use crate::io::{ObservationStore, OpenReader, ReaderFactory};
use crate::types::{MatchResult, SatelliteObservation, Sensor};

/// Outcome of a batch ingestion
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub ingested: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl IngestionReport {
    pub fn num_ingested(&self) -> usize {
        self.ingested.len()
    }

    pub fn num_failed(&self) -> usize {
        self.failed.len()
    }
}

/// Reads the acquisition info of one file and stores it as an observation
pub fn ingest_file(
    factory: &ReaderFactory,
    store: &mut dyn ObservationStore,
    sensor_key: &str,
    path: &Path,
    version: &str,
) -> MatchResult<SatelliteObservation> {
    let mut reader = OpenReader::open(factory.get_reader(sensor_key)?, path)?;
    let info = reader.read()?;

    let observation = SatelliteObservation::from_acquisition_info(
        info,
        Sensor::new(sensor_key),
        path.to_path_buf(),
        version,
    );
    store.insert(observation.clone())?;

    log::info!(
        "Ingested {} ({} - {}, {} segments)",
        path.display(),
        observation.start_time,
        observation.stop_time,
        observation.geo_bounds.segments().len()
    );
    Ok(observation)
}

/// Ingests all files, continuing past per-file failures.
/// Fatal errors abort the batch.
pub fn ingest_files(
    factory: &ReaderFactory,
    store: &mut dyn ObservationStore,
    sensor_key: &str,
    paths: &[PathBuf],
    version: &str,
) -> MatchResult<IngestionReport> {
    let mut report = IngestionReport::default();
    for path in paths {
        match ingest_file(factory, store, sensor_key, path, version) {
            Ok(_) => report.ingested.push(path.clone()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("Failed to ingest {}: {}", path.display(), e);
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }
    log::info!(
        "Ingestion of {} finished: {} stored, {} failed",
        sensor_key,
        report.num_ingested(),
        report.num_failed()
    );
    Ok(report)
}

/// Files in `directory` whose names match the product pattern of `sensor_key`, sorted
pub fn find_input_files(factory: &ReaderFactory, sensor_key: &str, directory: &Path) -> MatchResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && factory.matches_file(sensor_key, &path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
