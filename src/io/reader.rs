use ndarray::Array2;
use regex::Regex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::geometry::{Geometry, GeometryFactory, Point};
use crate::io::window::{strip_channel_suffix, RawArray};
use crate::types::{AcquisitionInfo, Dimension, EpochMillis, Interval, MatchError, MatchResult};

/// Maps geographic positions to raster positions and back
pub trait PixelLocator: Send + Sync {
    /// Zero or more continuous pixel positions (x, y) for a geo-location.
    /// Pixel (i, j) covers [i, i+1) x [j, j+1).
    fn get_pixel_location(&self, lon: f64, lat: f64) -> Vec<(f64, f64)>;

    /// Geo-location of a continuous pixel position; pixel centres are at +0.5
    fn get_geo_location(&self, x: f64, y: f64) -> Option<Point>;
}

pub trait TimeLocator: Send + Sync {
    fn get_time_for(&self, x: usize, y: usize) -> EpochMillis;
}

/// Capabilities the match-up core needs from a sensor file reader
pub trait Reader: Send {
    fn open(&mut self, path: &Path) -> MatchResult<()>;

    fn close(&mut self) -> MatchResult<()>;

    fn read(&mut self) -> MatchResult<AcquisitionInfo>;

    fn pixel_locator(&self) -> MatchResult<Box<dyn PixelLocator + '_>>;

    /// Locator restricted to the part of the swath covered by `geometry`
    fn sub_scene_pixel_locator(&self, _geometry: &Geometry) -> MatchResult<Box<dyn PixelLocator + '_>> {
        self.pixel_locator()
    }

    fn time_locator(&self) -> MatchResult<Box<dyn TimeLocator + '_>>;

    fn product_size(&self) -> MatchResult<Dimension>;

    /// Window of `interval` pixels centred on (center_x, center_y); cells
    /// outside the raster hold the variable's fill value
    fn read_raw(
        &self,
        center_x: i32,
        center_y: i32,
        interval: Interval,
        variable: &str,
    ) -> MatchResult<RawArray>;

    /// Scale factor and offset of a variable
    fn scaling(&self, _variable: &str) -> (f64, f64) {
        (1.0, 0.0)
    }

    /// Raw window with scaling applied. Channel variables such as
    /// "btemps_ch5" use the scaling of their base variable.
    fn read_scaled(
        &self,
        center_x: i32,
        center_y: i32,
        interval: Interval,
        variable: &str,
    ) -> MatchResult<Array2<f64>> {
        let (scale, offset) = self.scaling(strip_channel_suffix(variable));
        Ok(self
            .read_raw(center_x, center_y, interval, variable)?
            .scaled(scale, offset))
    }

    /// File-name pattern of the products this reader handles
    fn reg_ex(&self) -> &str;
}

/// Reader that is open on a file and closed again when dropped
pub struct OpenReader {
    reader: Box<dyn Reader>,
    path: PathBuf,
}

impl OpenReader {
    pub fn open(mut reader: Box<dyn Reader>, path: &Path) -> MatchResult<Self> {
        log::debug!("Opening {}", path.display());
        reader.open(path)?;
        Ok(Self {
            reader,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for OpenReader {
    type Target = dyn Reader;

    fn deref(&self) -> &Self::Target {
        self.reader.as_ref()
    }
}

impl DerefMut for OpenReader {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader.as_mut()
    }
}

impl Drop for OpenReader {
    fn drop(&mut self) {
        if let Err(e) = self.reader.close() {
            log::warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}

type ReaderConstructor = dyn Fn(GeometryFactory) -> Box<dyn Reader> + Send + Sync;

struct Registration {
    constructor: Arc<ReaderConstructor>,
    file_pattern: Regex,
}

/// Registry of reader constructors keyed by sensor name
pub struct ReaderFactory {
    geometry_factory: GeometryFactory,
    registrations: HashMap<String, Registration>,
}

impl ReaderFactory {
    pub fn new(geometry_factory: GeometryFactory) -> Self {
        Self {
            geometry_factory,
            registrations: HashMap::new(),
        }
    }

    pub fn geometry_factory(&self) -> GeometryFactory {
        self.geometry_factory
    }

    /// Registers one constructor for several sensor keys. `file_pattern` must
    /// match whole product file names.
    pub fn register<F>(&mut self, sensor_keys: &[&str], file_pattern: &str, constructor: F) -> MatchResult<()>
    where
        F: Fn(GeometryFactory) -> Box<dyn Reader> + Send + Sync + 'static,
    {
        let file_pattern = Regex::new(&format!("^(?:{})$", file_pattern)).map_err(|e| {
            MatchError::Config(format!("Invalid file pattern '{}': {}", file_pattern, e))
        })?;
        let constructor: Arc<ReaderConstructor> = Arc::new(constructor);

        for key in sensor_keys {
            if self.registrations.contains_key(*key) {
                return Err(MatchError::Config(format!(
                    "Sensor key '{}' is already registered",
                    key
                )));
            }
            self.registrations.insert(
                key.to_string(),
                Registration {
                    constructor: Arc::clone(&constructor),
                    file_pattern: file_pattern.clone(),
                },
            );
        }
        Ok(())
    }

    pub fn get_reader(&self, sensor_key: &str) -> MatchResult<Box<dyn Reader>> {
        let registration = self.registrations.get(sensor_key).ok_or_else(|| {
            MatchError::Config(format!("No reader registered for sensor '{}'", sensor_key))
        })?;
        Ok((registration.constructor)(self.geometry_factory))
    }

    /// Whether the file name of `path` matches the product pattern of `sensor_key`
    pub fn matches_file(&self, sensor_key: &str, path: &Path) -> bool {
        let Some(registration) = self.registrations.get(sensor_key) else {
            return false;
        };
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| registration.file_pattern.is_match(name))
    }

    pub fn sensor_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
