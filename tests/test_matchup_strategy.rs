use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use swathmatch::core::{
    ingest_files, CancellationToken, MatchupContext, MatchupSet, Screening, ScreeningEngine,
    SeedPointMatchupStrategy,
};
use swathmatch::{
    GeometryFactory, GeometryType, Interval, MatchError, MatchResult, MemoryStore, Reader,
    ReaderFactory, UseCaseConfig,
};

mod common;
use common::{ProductRegistry, SyntheticProduct};

const PRIMARY: &str = "amsub_20100721_1600.nc";
const SECONDARY: &str = "mhs_20100721_1605.nc";

fn overlapping_registry() -> Arc<ProductRegistry> {
    let mut registry = ProductRegistry::default();
    registry.add(
        PRIMARY,
        SyntheticProduct::regular(
            20,
            10,
            10.0,
            20.0,
            0.1,
            common::utc(2010, 7, 21, 16, 0, 0),
            common::utc(2010, 7, 21, 16, 10, 0),
        ),
    );
    // offset by a fraction of a pixel so located positions never sit on a pixel border
    registry.add(
        SECONDARY,
        SyntheticProduct::regular(
            20,
            10,
            10.33,
            19.47,
            0.1,
            common::utc(2010, 7, 21, 16, 5, 0),
            common::utc(2010, 7, 21, 16, 15, 0),
        ),
    );
    Arc::new(registry)
}

fn ingest(readers: &ReaderFactory, store: &mut MemoryStore, sensor: &str, paths: &[&str]) {
    let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
    let report = ingest_files(readers, store, sensor, &paths, "v1").expect("ingestion failed");
    assert_eq!(report.num_failed(), 0);
}

struct Fixture {
    registry: Arc<ProductRegistry>,
    readers: ReaderFactory,
    store: MemoryStore,
    config: UseCaseConfig,
    screening: ScreeningEngine,
}

impl Fixture {
    fn overlapping() -> Self {
        common::init_logging();

        let registry = overlapping_registry();
        let readers = common::reader_factory(&registry, GeometryFactory::new(GeometryType::Spherical));
        let mut store = MemoryStore::new();
        ingest(&readers, &mut store, "amsub-n15", &[PRIMARY]);
        ingest(&readers, &mut store, "mhs-n15", &[SECONDARY]);
        let config = UseCaseConfig::from_xml(&common::use_case_xml(600, 500_000)).unwrap();

        Self {
            registry,
            readers,
            store,
            config,
            screening: ScreeningEngine::new(),
        }
    }

    fn context(&self) -> MatchupContext<'_> {
        MatchupContext::new(
            &self.config,
            common::utc(2010, 7, 21, 16, 0, 0),
            common::utc(2010, 7, 21, 16, 10, 0),
            &self.store,
            &self.readers,
            &self.screening,
        )
        .expect("valid match-up context")
    }
}

#[test]
fn test_overlapping_swaths_produce_matchups() {
    let fixture = Fixture::overlapping();
    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .expect("match-up run failed");

    assert_eq!(collection.num_matchup_sets(), 1);
    assert!(collection.num_matchups() > 0);

    let set = &collection.sets()[0];
    assert_eq!(set.primary_observation_path, PathBuf::from(PRIMARY));
    assert_eq!(set.secondary_observation_path, PathBuf::from(SECONDARY));
    assert_eq!(set.secondary_sensor, "mhs-n15");
    assert_eq!(set.primary_processing_version, "v1");

    let max_delta_ms = 600_000;
    for sample_set in set.sample_sets() {
        let primary = &sample_set.primary;
        let secondary = sample_set.secondary("mhs-n15").expect("secondary sample");

        assert!((0..10).contains(&primary.x));
        assert!((0..20).contains(&primary.y));
        assert!((0..10).contains(&secondary.x));
        assert!((0..20).contains(&secondary.y));

        // neighbouring pixel centres of the two grids are at most one step apart
        assert!((primary.lon - secondary.lon).abs() <= 0.1);
        assert!((primary.lat - secondary.lat).abs() <= 0.1);
        assert!((primary.time - secondary.time).abs() <= max_delta_ms);
    }

    // every opened reader is closed again
    let opened = fixture.registry.opened.load(Ordering::SeqCst);
    assert!(opened >= 4);
    assert_eq!(opened, fixture.registry.closed.load(Ordering::SeqCst));
}

#[test]
fn test_primary_pixels_are_unique_per_set() {
    let fixture = Fixture::overlapping();
    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap();

    let mut pairs: Vec<_> = collection.sets()[0]
        .sample_sets()
        .iter()
        .map(|s| {
            let secondary = s.secondary("mhs-n15").unwrap();
            (s.primary.x, s.primary.y, secondary.x, secondary.y)
        })
        .collect();
    let total = pairs.len();
    pairs.sort_unstable();
    pairs.dedup();
    assert_eq!(pairs.len(), total);
}

/// Keeps sample sets whose primary pixel lies east of a longitude read from the file
struct EastOf(f64);

impl Screening for EastOf {
    fn name(&self) -> &str {
        "east-of"
    }

    fn apply(&self, set: &mut MatchupSet, primary: &dyn Reader, _secondary: &dyn Reader) -> MatchResult<()> {
        let interval = Interval::new(1, 1)?;
        let mut keep = Vec::with_capacity(set.num_observations());
        for sample_set in set.sample_sets() {
            let lon = primary.read_scaled(sample_set.primary.x, sample_set.primary.y, interval, "lon")?;
            keep.push(lon[[0, 0]] > self.0);
        }
        let mut flags = keep.into_iter();
        set.retain(|_| flags.next().unwrap_or(false));
        Ok(())
    }
}

#[test]
fn test_screening_reads_pixel_data() {
    let mut fixture = Fixture::overlapping();
    let unscreened = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap()
        .num_matchups();

    fixture.screening.add(Box::new(EastOf(10.55)));
    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap();

    // the overlap spans longitudes 10.33 to 10.9, so the threshold splits it
    assert!(unscreened > 0);
    assert!(collection.num_matchups() < unscreened);
    assert!(collection.num_matchups() > 0);
    for set in collection.sets() {
        for sample_set in set.sample_sets() {
            assert!(sample_set.primary.lon > 10.55);
        }
    }
}

/// Drops every sample set and counts how often it is invoked
struct RejectAll(Arc<AtomicUsize>);

impl Screening for RejectAll {
    fn name(&self) -> &str {
        "reject-all"
    }

    fn apply(&self, set: &mut MatchupSet, _primary: &dyn Reader, _secondary: &dyn Reader) -> MatchResult<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        set.retain(|_| false);
        Ok(())
    }
}

/// Records the smallest set size handed to it
struct SmallestSet(Arc<AtomicUsize>);

impl Screening for SmallestSet {
    fn name(&self) -> &str {
        "smallest-set"
    }

    fn apply(&self, set: &mut MatchupSet, _primary: &dyn Reader, _secondary: &dyn Reader) -> MatchResult<()> {
        self.0.fetch_min(set.num_observations(), Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_screening_that_empties_a_set_drops_it() {
    let mut fixture = Fixture::overlapping();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    fixture.screening.add(Box::new(RejectAll(Arc::clone(&calls))));
    // runs after the set is already empty and must never be reached
    fixture.screening.add(Box::new(SmallestSet(Arc::clone(&seen))));

    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap();
    assert_eq!(collection.num_matchup_sets(), 0);
    assert_eq!(collection.num_matchups(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.load(Ordering::SeqCst), usize::MAX);
}

#[test]
fn test_screening_runs_after_conditions() {
    let mut fixture = Fixture::overlapping();
    let unscreened = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap()
        .num_matchups();
    assert!(unscreened > 0);

    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    fixture.screening.add(Box::new(SmallestSet(Arc::clone(&seen))));
    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap();

    // screening sees the sets exactly as the time-delta condition left them
    assert_eq!(collection.num_matchups(), unscreened);
    assert_eq!(seen.load(Ordering::SeqCst), unscreened);

    // pixel time differences are around two minutes, so a one second limit
    // empties every set before screening could run
    fixture.config = UseCaseConfig::from_xml(&common::use_case_xml(1, 500_000)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    fixture.screening = ScreeningEngine::new();
    fixture.screening.add(Box::new(RejectAll(Arc::clone(&calls))));
    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context())
        .unwrap();
    assert_eq!(collection.num_matchup_sets(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_mismatched_geometry_library_is_rejected() {
    let fixture = Fixture::overlapping();
    let planar = UseCaseConfig::from_xml(&common::use_case_xml(600, 500_000).replace(
        "<geometry-library>S2</geometry-library>",
        "<geometry-library>JTS</geometry-library>",
    ))
    .unwrap();

    let result = MatchupContext::new(
        &planar,
        common::utc(2010, 7, 21, 16, 0, 0),
        common::utc(2010, 7, 21, 16, 10, 0),
        &fixture.store,
        &fixture.readers,
        &fixture.screening,
    );
    assert!(matches!(result, Err(MatchError::Config(_))));

    let readers = common::reader_factory(&fixture.registry, GeometryFactory::new(GeometryType::Planar));
    let context = MatchupContext::new(
        &planar,
        common::utc(2010, 7, 21, 16, 0, 0),
        common::utc(2010, 7, 21, 16, 10, 0),
        &fixture.store,
        &readers,
        &fixture.screening,
    )
    .expect("matching backends");
    assert_eq!(context.geometry_factory.geometry_type(), GeometryType::Planar);
}

#[test]
fn test_no_overlap_gives_empty_collection() {
    common::init_logging();

    let mut registry = ProductRegistry::default();
    registry.add(
        "amsub_20100721_1634.nc",
        SyntheticProduct::regular(
            20,
            10,
            0.0,
            2.0,
            0.1,
            common::utc(2010, 7, 21, 16, 34, 19),
            common::utc(2010, 7, 21, 16, 55, 7),
        ),
    );
    registry.add(
        "mhs_20070613_1000.nc",
        SyntheticProduct::regular(
            20,
            10,
            0.0,
            2.0,
            0.1,
            common::utc(2007, 6, 13, 10, 0, 0),
            common::utc(2007, 6, 13, 10, 20, 0),
        ),
    );
    let registry = Arc::new(registry);
    let readers = common::reader_factory(&registry, GeometryFactory::new(GeometryType::Spherical));
    let mut store = MemoryStore::new();
    ingest(&readers, &mut store, "amsub-n15", &["amsub_20100721_1634.nc"]);
    ingest(&readers, &mut store, "mhs-n15", &["mhs_20070613_1000.nc"]);

    let config = UseCaseConfig::from_xml(&common::use_case_xml(300, 1000)).unwrap();
    let screening = ScreeningEngine::new();
    let context = MatchupContext::new(
        &config,
        common::utc(2010, 7, 21, 0, 0, 0),
        common::utc(2010, 7, 21, 23, 59, 59),
        &store,
        &readers,
        &screening,
   
    )
    .unwrap();

    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&context)
        .unwrap();
    assert_eq!(collection.num_matchup_sets(), 0);
    assert_eq!(collection.num_matchups(), 0);
}

#[test]
fn test_empty_store_gives_empty_collection() {
    let fixture = Fixture::overlapping();
    let empty = MemoryStore::new();
    let context = MatchupContext::new(
        &fixture.config,
        common::utc(2010, 7, 21, 16, 0, 0),
        common::utc(2010, 7, 21, 16, 10, 0),
        &empty,
        &fixture.readers,
        &fixture.screening,
   
    )
    .unwrap();

    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&context)
        .unwrap();
    assert_eq!(collection.num_matchup_sets(), 0);
}

#[test]
fn test_cancelled_run_fails() {
    let fixture = Fixture::overlapping();
    let token = CancellationToken::new();
    token.cancel();

    let result = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&fixture.context().with_cancellation(token));
    assert!(matches!(result, Err(MatchError::Cancelled)));
}

#[test]
fn test_exceeded_deadline_skips_primary() {
    let fixture = Fixture::overlapping();
    let context = fixture.context().with_primary_deadline(StdDuration::ZERO);

    let collection = SeedPointMatchupStrategy::new()
        .create_matchup_collection(&context)
        .expect("deadline is not fatal");
    assert_eq!(collection.num_matchup_sets(), 0);
}

#[test]
fn test_unregistered_secondary_sensor_is_fatal() {
    let fixture = Fixture::overlapping();
    let readers = {
        let registry = Arc::clone(&fixture.registry);
        let mut readers = ReaderFactory::new(GeometryFactory::new(GeometryType::Spherical));
        readers
            .register(&["amsub-n15"], r"amsub_.*\.nc", move |factory| {
                Box::new(common::SyntheticReader::new(Arc::clone(&registry), factory))
            })
            .unwrap();
        readers
    };
    let context = MatchupContext::new(
        &fixture.config,
        common::utc(2010, 7, 21, 16, 0, 0),
        common::utc(2010, 7, 21, 16, 10, 0),
        &fixture.store,
        &readers,
        &fixture.screening,
   
    )
    .unwrap();

    let result = SeedPointMatchupStrategy::new().create_matchup_collection(&context);
    assert!(matches!(result, Err(MatchError::Config(_))));
}
