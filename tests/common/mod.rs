//! Synthetic swath products and a reader serving them from memory

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ndarray::{Array2, Array3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use swathmatch::core::BoundingPolygonCreator;
use swathmatch::io::window::{read_channel_window, read_window};
use swathmatch::io::{
    ArrayCache, PixelLocator, RawArray, Reader, ReaderFactory, ScanlineTimeLocator,
    SwathPixelLocator, TimeLocator,
};
use swathmatch::{
    AcquisitionInfo, Dimension, GeometryFactory, Interval, MatchError, MatchResult, NodeType,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Regular swath of `rows` scan lines, travelling south
#[derive(Debug, Clone)]
pub struct SyntheticProduct {
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl SyntheticProduct {
    pub fn regular(
        rows: usize,
        cols: usize,
        lon0: f64,
        lat0: f64,
        step: f64,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Self {
        Self {
            lons: Array2::from_shape_fn((rows, cols), |(_, c)| lon0 + c as f64 * step),
            lats: Array2::from_shape_fn((rows, cols), |(r, _)| lat0 - r as f64 * step),
            start,
            stop,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProductRegistry {
    products: HashMap<PathBuf, SyntheticProduct>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl ProductRegistry {
    pub fn add(&mut self, path: &str, product: SyntheticProduct) {
        self.products.insert(PathBuf::from(path), product);
    }
}

pub struct SyntheticReader {
    registry: Arc<ProductRegistry>,
    factory: GeometryFactory,
    current: Option<SyntheticProduct>,
    cache: Mutex<ArrayCache<Array2<f64>>>,
}

impl SyntheticReader {
    pub fn new(registry: Arc<ProductRegistry>, factory: GeometryFactory) -> Self {
        Self {
            registry,
            factory,
            current: None,
            cache: Mutex::new(ArrayCache::new(4)),
        }
    }

    /// Two-channel brightness temperatures in hundredths of a kelvin
    fn btemps(&self) -> MatchResult<Array3<i16>> {
        let (rows, cols) = self.product()?.lons.dim();
        Ok(Array3::from_shape_fn((2, rows, cols), |(ch, r, c)| {
            (20000 + ch * 1000 + r * 10 + c) as i16
        }))
    }

    fn product(&self) -> MatchResult<&SyntheticProduct> {
        self.current
            .as_ref()
            .ok_or_else(|| MatchError::MissingData("reader is not open".to_string()))
    }
}

impl Reader for SyntheticReader {
    fn open(&mut self, path: &Path) -> MatchResult<()> {
        let product = self.registry.products.get(path).cloned().ok_or_else(|| {
            MatchError::MissingData(format!("no such product: {}", path.display()))
        })?;
        self.current = Some(product);
        self.registry.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> MatchResult<()> {
        self.current = None;
        self.cache.lock().unwrap().clear();
        self.registry.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> MatchResult<AcquisitionInfo> {
        let product = self.product()?;
        BoundingPolygonCreator::new(Interval::new(2, 2)?, self.factory).create_acquisition_info(
            product.lons.view(),
            product.lats.view(),
            product.start,
            product.stop,
            NodeType::Descending,
        )
    }

    fn pixel_locator(&self) -> MatchResult<Box<dyn PixelLocator + '_>> {
        let product = self.product()?;
        Ok(Box::new(SwathPixelLocator::new(
            product.lons.clone(),
            product.lats.clone(),
        )?))
    }

    fn time_locator(&self) -> MatchResult<Box<dyn TimeLocator + '_>> {
        let product = self.product()?;
        Ok(Box::new(ScanlineTimeLocator::from_range(
            product.start.timestamp_millis(),
            product.stop.timestamp_millis(),
            product.lats.nrows(),
        )?))
    }

    fn product_size(&self) -> MatchResult<Dimension> {
        let (rows, cols) = self.product()?.lons.dim();
        Ok(Dimension::new("product_size", cols, rows))
    }

    fn read_raw(
        &self,
        center_x: i32,
        center_y: i32,
        interval: Interval,
        variable: &str,
    ) -> MatchResult<RawArray> {
        if variable.starts_with("btemps_ch") {
            let btemps = self.btemps()?;
            return Ok(RawArray::Short(read_channel_window(
                &btemps.view(),
                variable,
                center_x,
                center_y,
                interval,
            )?));
        }

        let product = self.product()?;
        let data = self.cache.lock().unwrap().get_or_load(variable, || match variable {
            "lon" => Ok(product.lons.clone()),
            "lat" => Ok(product.lats.clone()),
            other => Err(MatchError::MissingData(format!("unknown variable {}", other))),
        })?;
        Ok(RawArray::Double(read_window(
            &data.view(),
            center_x,
            center_y,
            interval,
        )))
    }

    fn scaling(&self, variable: &str) -> (f64, f64) {
        match variable {
            "btemps" => (0.01, 0.0),
            _ => (1.0, 0.0),
        }
    }

    fn reg_ex(&self) -> &str {
        r".*\.nc"
    }
}

pub fn reader_factory(registry: &Arc<ProductRegistry>, factory: GeometryFactory) -> ReaderFactory {
    let mut readers = ReaderFactory::new(factory);
    for (sensor, pattern) in [("amsub-n15", r"amsub_.*\.nc"), ("mhs-n15", r"mhs_.*\.nc")] {
        let registry = Arc::clone(registry);
        readers
            .register(&[sensor], pattern, move |factory| {
                Box::new(SyntheticReader::new(Arc::clone(&registry), factory))
            })
            .unwrap();
    }
    readers
}

pub fn use_case_xml(time_delta_seconds: i64, points_per_day: i32) -> String {
    format!(
        r#"<use-case-config name="synthetic">
    <sensors>
        <sensor>
            <name>amsub-n15</name>
            <primary>true</primary>
        </sensor>
        <sensor>
            <name>mhs-n15</name>
        </sensor>
    </sensors>
    <random-points-per-day>{}</random-points-per-day>
    <test-run>true</test-run>
    <geometry-library>S2</geometry-library>
    <conditions>
        <time-delta>
            <time-delta-seconds>{}</time-delta-seconds>
        </time-delta>
    </conditions>
</use-case-config>"#,
        points_per_day, time_delta_seconds
    )
}
