use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

use swathmatch::core::IntersectionEngine;
use swathmatch::{
    Geometry, GeometryFactory, GeometryType, NodeType, Point, SatelliteObservation, Sensor, TimeAxis,
};

mod common;

fn observation(
    factory: &GeometryFactory,
    sensor: &str,
    path: &str,
    wkt: &str,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> SatelliteObservation {
    let geo_bounds = factory.parse(wkt).expect("valid WKT");
    SatelliteObservation {
        sensor: Sensor::new(sensor),
        start_time: start,
        stop_time: stop,
        node_type: NodeType::Undefined,
        geo_bounds,
        data_file_path: PathBuf::from(path),
        version: "v1".to_string(),
        time_axis_start_index: 0,
        time_axis_end_index: 0,
        time_axes: Vec::new(),
    }
}

fn axis(factory: &GeometryFactory, lat0: f64, lat1: f64, start: DateTime<Utc>, stop: DateTime<Utc>) -> TimeAxis {
    let line = factory.create_line_string(&[Point::new(1.0, lat0), Point::new(1.0, lat1)]);
    factory.create_time_axis(line, start, stop).unwrap()
}

#[test]
fn test_no_overlap_in_time() {
    common::init_logging();

    let factory = GeometryFactory::new(GeometryType::Spherical);
    let polygon = "POLYGON((0 0,0 2,2 2,2 0,0 0))";
    let primary = observation(
        &factory,
        "amsub-n15",
        "amsub_20100721.nc",
        polygon,
        common::utc(2010, 7, 21, 16, 34, 19),
        common::utc(2010, 7, 21, 16, 55, 7),
    );
    let secondary = observation(
        &factory,
        "mhs-n15",
        "mhs_20070613.nc",
        polygon,
        common::utc(2007, 6, 13, 10, 0, 0),
        common::utc(2007, 6, 13, 10, 20, 0),
    );

    let engine = IntersectionEngine::new(Duration::seconds(300));
    let intersections = engine.get_intersecting_intervals(&primary, &secondary).unwrap();
    assert!(intersections.is_empty());
}

#[test]
fn test_overlap_in_space_and_time() {
    for geometry_type in [GeometryType::Planar, GeometryType::Spherical] {
        let factory = GeometryFactory::new(geometry_type);
        let start = common::utc(2010, 7, 21, 16, 0, 0);
        let primary = observation(
            &factory,
            "amsub-n15",
            "amsub_1.nc",
            "POLYGON((0 0,2 0,2 2,0 2,0 0))",
            start,
            start + Duration::minutes(10),
        );
        let secondary = observation(
            &factory,
            "mhs-n15",
            "mhs_1.nc",
            "POLYGON((1 1,3 1,3 3,1 3,1 1))",
            start + Duration::minutes(5),
            start + Duration::minutes(15),
        );

        let engine = IntersectionEngine::new(Duration::seconds(300));
        let intersections = engine.get_intersecting_intervals(&primary, &secondary).unwrap();
        assert_eq!(intersections.len(), 1, "{:?}", geometry_type);

        let intersection = &intersections[0];
        assert!(intersection.geometry.contains(&Point::new(1.5, 1.5)));
        assert!(!intersection.geometry.contains(&Point::new(0.5, 0.5)));
        assert_eq!(intersection.primary_segment, 0);
        assert_eq!(intersection.secondary_segment, 0);
        assert_eq!(intersection.time_info.min_time_delta, Duration::zero());
        let overlap = intersection.time_info.overlap.expect("windows overlap");
        assert_eq!(overlap.start, start + Duration::minutes(5));
        assert_eq!(overlap.stop, start + Duration::minutes(10));
        assert!(intersection.primary_sensing.is_none());
    }
}

#[test]
fn test_disjoint_in_space() {
    let factory = GeometryFactory::new(GeometryType::Spherical);
    let start = common::utc(2010, 7, 21, 16, 0, 0);
    let stop = start + Duration::minutes(10);
    let primary = observation(&factory, "a", "a.nc", "POLYGON((0 0,2 0,2 2,0 2,0 0))", start, stop);
    let secondary = observation(&factory, "b", "b.nc", "POLYGON((10 10,12 10,12 12,10 12,10 10))", start, stop);

    let engine = IntersectionEngine::new(Duration::seconds(300));
    assert!(engine
        .get_intersecting_intervals(&primary, &secondary)
        .unwrap()
        .is_empty());
}

#[test]
fn test_time_delta_limit() {
    let factory = GeometryFactory::new(GeometryType::Spherical);
    let start = common::utc(2010, 7, 21, 16, 0, 0);
    let polygon = "POLYGON((0 0,2 0,2 2,0 2,0 0))";
    let primary = observation(&factory, "a", "a.nc", polygon, start, start + Duration::minutes(10));
    let secondary = observation(
        &factory,
        "b",
        "b.nc",
        polygon,
        start + Duration::minutes(20),
        start + Duration::minutes(30),
    );

    let strict = IntersectionEngine::new(Duration::minutes(5));
    assert!(strict
        .get_intersecting_intervals(&primary, &secondary)
        .unwrap()
        .is_empty());

    // a gap equal to the limit is rejected
    let exact = IntersectionEngine::new(Duration::minutes(10));
    assert!(exact
        .get_intersecting_intervals(&primary, &secondary)
        .unwrap()
        .is_empty());

    let loose = IntersectionEngine::new(Duration::minutes(15));
    let intersections = loose.get_intersecting_intervals(&primary, &secondary).unwrap();
    assert_eq!(intersections.len(), 1);
    assert_eq!(intersections[0].time_info.min_time_delta, Duration::minutes(10));
    assert!(intersections[0].time_info.overlap.is_none());
}

#[test]
fn test_segmented_primary_uses_segment_time_windows() {
    common::init_logging();

    let factory = GeometryFactory::new(GeometryType::Spherical);
    let start = common::utc(2010, 7, 21, 10, 0, 0);
    let middle = start + Duration::minutes(5);
    let stop = start + Duration::minutes(10);

    let mut primary = observation(
        &factory,
        "amsub-n15",
        "amsub_split.nc",
        "GEOMETRYCOLLECTION(POLYGON((0 2,2 2,2 4,0 4,0 2)),POLYGON((0 0,2 0,2 2,0 2,0 0)))",
        start,
        stop,
    );
    primary.time_axes = vec![
        axis(&factory, 4.0, 2.0, start, middle),
        axis(&factory, 2.0, 0.0, middle, stop),
    ];
    assert!(primary.is_segmented());

    let secondary = observation(
        &factory,
        "mhs-n15",
        "mhs_1.nc",
        "POLYGON((0.5 0.5,1.5 0.5,1.5 1.5,0.5 1.5,0.5 0.5))",
        start + Duration::minutes(20),
        start + Duration::minutes(25),
    );

    // segment 0 ends 15 minutes before the secondary, segment 1 ends 10 minutes before
    let engine = IntersectionEngine::new(Duration::minutes(12));
    let intersections = engine.get_intersecting_intervals(&primary, &secondary).unwrap();
    assert_eq!(intersections.len(), 1);

    let intersection = &intersections[0];
    assert_eq!(intersection.primary_segment, 1);
    assert_eq!(intersection.secondary_segment, 0);
    assert_eq!(intersection.time_info.min_time_delta, Duration::minutes(10));
    assert!(matches!(intersection.primary_geometry, Geometry::Polygon(_)));

    let sensing = intersection.primary_sensing.expect("segment has a time axis");
    assert!(sensing.start >= middle);
    assert!(sensing.stop <= stop);
    assert!(sensing.start < sensing.stop);
    assert!(intersection.secondary_sensing.is_none());
}
