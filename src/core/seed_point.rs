//! Seed-point match-up strategy.
//!
//! Quasi-random (lon, lat, time) seed points are drawn for the processing
//! window. For every primary observation the seeds falling into its bounds
//! become primary samples, which are then mapped onto each secondary
//! observation whose bounds intersect the primary in space and time.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration as StdDuration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::conditions::{ConditionEngine, ScreeningEngine};
use crate::core::intersection::IntersectionEngine;
use crate::core::matchup::{MatchupCollection, MatchupSet, Sample, SampleSet};
use crate::core::sampling::create_random_points;
use crate::geometry::{Geometry, GeometryFactory};
use crate::io::{ObservationStore, OpenReader, PixelLocator, QueryParameter, ReaderFactory, TimeLocator, UseCaseConfig};
use crate::types::{Dimension, MatchError, MatchResult, SamplingPoint, SatelliteObservation};

/// Shared flag to stop a running match-up
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> MatchResult<()> {
        if self.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        Ok(())
    }
}

/// Immutable inputs of one match-up run
pub struct MatchupContext<'a> {
    pub config: &'a UseCaseConfig,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub store: &'a dyn ObservationStore,
    pub reader_factory: &'a ReaderFactory,
    pub geometry_factory: GeometryFactory,
    pub screening: &'a ScreeningEngine,
    pub cancellation: CancellationToken,
    /// Upper bound for processing a single primary observation
    pub primary_deadline: Option<StdDuration>,
}

impl<'a> MatchupContext<'a> {
    pub fn new(
        config: &'a UseCaseConfig,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        store: &'a dyn ObservationStore,
        reader_factory: &'a ReaderFactory,
        screening: &'a ScreeningEngine,
    ) -> MatchResult<Self> {
        let geometry_factory = config.geometry_factory()?;
        let reader_geometry = reader_factory.geometry_factory().geometry_type();
        if geometry_factory.geometry_type() != reader_geometry {
            return Err(MatchError::Config(format!(
                "use case requests {:?} geometries but the readers create {:?} geometries",
                geometry_factory.geometry_type(),
                reader_geometry
            )));
        }

        Ok(Self {
            config,
            start_date,
            end_date,
            store,
            reader_factory,
            geometry_factory,
            screening,
            cancellation: CancellationToken::new(),
            primary_deadline: None,
        })
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_primary_deadline(mut self, deadline: StdDuration) -> Self {
        self.primary_deadline = Some(deadline);
        self
    }
}

struct Deadline {
    expires: Option<Instant>,
}

impl Deadline {
    fn start(limit: Option<StdDuration>) -> Self {
        Self {
            expires: limit.map(|limit| Instant::now() + limit),
        }
    }

    fn check(&self, path: &Path) -> MatchResult<()> {
        match self.expires {
            Some(expires) if Instant::now() > expires => Err(MatchError::DeadlineExceeded(format!(
                "processing of {} took too long",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}

/// Maps samples onto the raster of one observation
pub struct SampleCollector<'a> {
    sensor: &'a str,
    product_size: &'a Dimension,
    pixel_locator: &'a dyn PixelLocator,
    time_locator: &'a dyn TimeLocator,
}

impl<'a> SampleCollector<'a> {
    pub fn new(
        sensor: &'a str,
        product_size: &'a Dimension,
        pixel_locator: &'a dyn PixelLocator,
        time_locator: &'a dyn TimeLocator,
    ) -> Self {
        Self {
            sensor,
            product_size,
            pixel_locator,
            time_locator,
        }
    }

    /// All in-raster samples for a geo-location; one per locator candidate
    pub fn samples_at(&self, lon: f64, lat: f64) -> Vec<Sample> {
        self.pixel_locator
            .get_pixel_location(lon, lat)
            .into_iter()
            .filter_map(|(x, y)| self.sample_for_pixel(x, y))
            .collect()
    }

    fn sample_for_pixel(&self, x: f64, y: f64) -> Option<Sample> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let (px, py) = (x.floor() as usize, y.floor() as usize);
        if px >= self.product_size.nx || py >= self.product_size.ny {
            return None;
        }

        let location = self
            .pixel_locator
            .get_geo_location(px as f64 + 0.5, py as f64 + 0.5)?;
        let time = self.time_locator.get_time_for(px, py);
        Some(Sample::new(px as i32, py as i32, location.lon, location.lat, time))
    }

    /// Primary samples of the seed points. Seeds falling into the same pixel
    /// yield a single sample.
    pub fn primary_samples(&self, seeds: &[SamplingPoint]) -> Vec<Sample> {
        let mut seen = HashSet::new();
        seeds
            .iter()
            .flat_map(|seed| self.samples_at(seed.lon, seed.lat))
            .filter(|sample| seen.insert((sample.x, sample.y)))
            .collect()
    }

    /// Copies every sample set once per secondary pixel found for its
    /// primary location. Sets without a secondary pixel are dropped, and
    /// identical primary/secondary pixel pairs are kept once.
    pub fn add_secondary_samples(&self, sample_sets: &[SampleSet]) -> Vec<SampleSet> {
        let mut result = Vec::new();
        for sample_set in sample_sets {
            let primary = &sample_set.primary;
            for secondary in self.samples_at(primary.lon, primary.lat) {
                let mut candidate = sample_set.clone();
                candidate.set_secondary(self.sensor, secondary);
                result.push(candidate);
            }
        }
        dedupe_sample_sets(result, self.sensor)
    }
}

fn dedupe_sample_sets(sample_sets: Vec<SampleSet>, sensor: &str) -> Vec<SampleSet> {
    let mut seen = HashSet::new();
    sample_sets
        .into_iter()
        .filter(|set| {
            let secondary = set.secondary(sensor).map(|s| (s.x, s.y));
            seen.insert((set.primary.x, set.primary.y, secondary))
        })
        .collect()
}

/// Seed points inside the sensing time and the bounds of an observation
pub fn filter_seed_points(
    seeds: &[SamplingPoint],
    observation: &SatelliteObservation,
    factory: &GeometryFactory,
) -> Vec<SamplingPoint> {
    let start = observation.start_time.timestamp_millis();
    let stop = observation.stop_time.timestamp_millis();
    let segments = observation.geo_bounds.segments();

    seeds
        .iter()
        .filter(|seed| seed.time >= start && seed.time <= stop)
        .filter(|seed| {
            let point = Geometry::Point(factory.create_point(seed.lon, seed.lat));
            segments.iter().any(|segment| {
                point
                    .intersection(segment)
                    .map(|hit| !hit.is_empty() && hit.is_valid())
                    .unwrap_or(false)
            })
        })
        .copied()
        .collect()
}

#[derive(Debug, Default)]
pub struct SeedPointMatchupStrategy;

impl SeedPointMatchupStrategy {
    pub fn new() -> Self {
        Self
    }

    pub fn create_matchup_collection(&self, context: &MatchupContext) -> MatchResult<MatchupCollection> {
        let config = context.config;
        config.validate()?;

        let conditions = ConditionEngine::from_config(config)?;
        let engine = IntersectionEngine::new(conditions.max_time_delta());
        let seeds = create_random_points(
            config.random_points_per_day,
            context.start_date,
            context.end_date,
            config.test_run,
        )?;

        let primary_sensor = config.primary_sensor()?;
        let query = QueryParameter::new()
            .with_sensor(&primary_sensor.name)
            .with_version(primary_sensor.data_version.as_deref())
            .with_time_range(context.start_date, context.end_date);
        let primaries = context.store.get(&query)?;
        log::info!(
            "Found {} {} observations between {} and {}",
            primaries.len(),
            primary_sensor.name,
            context.start_date,
            context.end_date
        );

        let collection = Mutex::new(MatchupCollection::new());
        let process = |primary: &SatelliteObservation| -> MatchResult<()> {
            context.cancellation.check()?;
            match self.process_primary(context, &engine, &conditions, &seeds, primary) {
                Ok(sets) => {
                    let mut collection = collection.lock().unwrap_or_else(PoisonError::into_inner);
                    for set in sets {
                        collection.add(set);
                    }
                    Ok(())
                }
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    log::warn!(
                        "Skipping primary observation {}: {}",
                        primary.data_file_path.display(),
                        e
                    );
                    Ok(())
                }
            }
        };

        #[cfg(feature = "parallel")]
        primaries.par_iter().try_for_each(process)?;
        #[cfg(not(feature = "parallel"))]
        primaries.iter().try_for_each(process)?;

        let mut collection = collection.into_inner().unwrap_or_else(PoisonError::into_inner);
        collection.sort_by_paths();
        log::info!(
            "Created {} matchup sets with {} matchups",
            collection.num_matchup_sets(),
            collection.num_matchups()
        );
        Ok(collection)
    }

    fn process_primary(
        &self,
        context: &MatchupContext,
        engine: &IntersectionEngine,
        conditions: &ConditionEngine,
        seeds: &[SamplingPoint],
        primary: &SatelliteObservation,
    ) -> MatchResult<Vec<MatchupSet>> {
        let deadline = Deadline::start(context.primary_deadline);
        let primary_path = primary.data_file_path.as_path();

        let primary_seeds = filter_seed_points(seeds, primary, &context.geometry_factory);
        if primary_seeds.is_empty() {
            log::debug!("No seed points in {}", primary_path.display());
            return Ok(Vec::new());
        }
        deadline.check(primary_path)?;

        let primary_reader = OpenReader::open(
            context.reader_factory.get_reader(&primary.sensor.name)?,
            primary_path,
        )?;
        let primary_size = primary_reader.product_size()?;
        let sample_sets: Vec<SampleSet> = {
            let pixel_locator = primary_reader.pixel_locator()?;
            let time_locator = primary_reader.time_locator()?;
            let collector = SampleCollector::new(
                &primary.sensor.name,
                &primary_size,
                pixel_locator.as_ref(),
                time_locator.as_ref(),
            );
            collector
                .primary_samples(&primary_seeds)
                .into_iter()
                .map(SampleSet::new)
                .collect()
        };
        log::debug!(
            "{} primary samples from {} seed points in {}",
            sample_sets.len(),
            primary_seeds.len(),
            primary_path.display()
        );
        if sample_sets.is_empty() {
            return Ok(Vec::new());
        }

        let delta = conditions.max_time_delta();
        let mut matchup_sets = Vec::new();
        for secondary_sensor in context.config.secondary_sensors() {
            let query = QueryParameter::new()
                .with_sensor(&secondary_sensor.name)
                .with_version(secondary_sensor.data_version.as_deref())
                .with_time_range(primary.start_time - delta, primary.stop_time + delta);
            let secondaries = context.store.get(&query)?;

            for secondary in &secondaries {
                context.cancellation.check()?;
                deadline.check(primary_path)?;

                match self.match_secondary(
                    context,
                    engine,
                    conditions,
                    &primary_reader,
                    primary,
                    secondary,
                    &sample_sets,
                ) {
                    Ok(Some(set)) => matchup_sets.push(set),
                    Ok(None) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => log::warn!(
                        "Skipping secondary observation {}: {}",
                        secondary.data_file_path.display(),
                        e
                    ),
                }
            }
        }
        Ok(matchup_sets)
    }

    #[allow(clippy::too_many_arguments)]
    fn match_secondary(
        &self,
        context: &MatchupContext,
        engine: &IntersectionEngine,
        conditions: &ConditionEngine,
        primary_reader: &OpenReader,
        primary: &SatelliteObservation,
        secondary: &SatelliteObservation,
        sample_sets: &[SampleSet],
    ) -> MatchResult<Option<MatchupSet>> {
        let intersections = engine.get_intersecting_intervals(primary, secondary)?;
        if intersections.is_empty() {
            return Ok(None);
        }

        let sensor = secondary.sensor.name.as_str();
        let secondary_reader = OpenReader::open(
            context.reader_factory.get_reader(sensor)?,
            &secondary.data_file_path,
        )?;
        let product_size = secondary_reader.product_size()?;
        let time_locator = secondary_reader.time_locator()?;

        let mut collected = Vec::new();
        for intersection in &intersections {
            let locator = if secondary.is_segmented() {
                secondary_reader.sub_scene_pixel_locator(&intersection.secondary_geometry)
            } else {
                secondary_reader.pixel_locator()
            };
            let locator = match locator {
                Ok(locator) => locator,
                Err(e) => {
                    log::warn!(
                        "No pixel locator for {} segment {}: {}",
                        secondary.data_file_path.display(),
                        intersection.secondary_segment,
                        e
                    );
                    continue;
                }
            };
            let collector = SampleCollector::new(sensor, &product_size, locator.as_ref(), time_locator.as_ref());
            collected.extend(collector.add_secondary_samples(sample_sets));
        }

        let mut set = MatchupSet::new(
            &primary.data_file_path,
            &primary.version,
            sensor,
            &secondary.data_file_path,
            &secondary.version,
        );
        set.set_sample_sets(dedupe_sample_sets(collected, sensor));
        if set.num_observations() > 0 {
            conditions.apply(&mut set);
        }
        if set.num_observations() > 0 {
            context.screening.apply(&mut set, &**primary_reader, &*secondary_reader)?;
        }

        log::debug!(
            "{} matchups between {} and {}",
            set.num_observations(),
            primary.data_file_path.display(),
            secondary.data_file_path.display()
        );
        Ok((set.num_observations() > 0).then_some(set))
    }
}
