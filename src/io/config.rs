//! Use-case configuration loaded from XML.
//!
//! ```xml
//! <use-case-config name="mmd05">
//!   <sensors>
//!     <sensor><name>amsub-n15</name><primary>true</primary></sensor>
//!     <sensor><name>mhs-n15</name><data-version>v1.0</data-version></sensor>
//!   </sensors>
//!   <dimensions>
//!     <dimension name="amsub-n15"><nx>5</nx><ny>5</ny></dimension>
//!   </dimensions>
//!   <random-points-per-day>5000</random-points-per-day>
//!   <test-run>true</test-run>
//!   <geometry-library>S2</geometry-library>
//!   <conditions>
//!     <time-delta><time-delta-seconds>2700</time-delta-seconds></time-delta>
//!     <spherical-distance><max-pixel-distance-km>20.0</max-pixel-distance-km></spherical-distance>
//!   </conditions>
//! </use-case-config>
//! ```

use chrono::Duration;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::geometry::{GeometryFactory, GeometryType};
use crate::types::{Dimension, MatchError, MatchResult};

const DEFAULT_RANDOM_POINTS_PER_DAY: i32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct UseCaseConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "sensors", default)]
    sensors: SensorList,
    #[serde(rename = "dimensions", default)]
    dimensions: DimensionList,
    #[serde(rename = "output-directory", default)]
    pub output_directory: Option<PathBuf>,
    #[serde(rename = "random-points-per-day", default = "default_random_points_per_day")]
    pub random_points_per_day: i32,
    #[serde(rename = "test-run", default)]
    pub test_run: bool,
    #[serde(rename = "geometry-library", default = "default_geometry_library")]
    pub geometry_library: String,
    #[serde(rename = "conditions", default)]
    conditions: Conditions,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SensorList {
    #[serde(rename = "sensor", default)]
    sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "primary", default)]
    pub primary: bool,
    #[serde(rename = "data-version", default)]
    pub data_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DimensionList {
    #[serde(rename = "dimension", default)]
    dimensions: Vec<DimensionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct DimensionConfig {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "nx")]
    nx: usize,
    #[serde(rename = "ny")]
    ny: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Conditions {
    #[serde(rename = "time-delta", default)]
    time_delta: Option<TimeDeltaCondition>,
    #[serde(rename = "spherical-distance", default)]
    spherical_distance: Option<DistanceCondition>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeDeltaCondition {
    #[serde(rename = "time-delta-seconds")]
    seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct DistanceCondition {
    #[serde(rename = "max-pixel-distance-km")]
    max_km: f64,
}

fn default_random_points_per_day() -> i32 {
    DEFAULT_RANDOM_POINTS_PER_DAY
}

fn default_geometry_library() -> String {
    GeometryType::Spherical.to_string()
}

impl UseCaseConfig {
    pub fn load(path: &Path) -> MatchResult<Self> {
        log::info!("Loading use-case configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    /// Parses and validates a configuration document
    pub fn from_xml(xml: &str) -> MatchResult<Self> {
        let config: UseCaseConfig = from_str(xml)
            .map_err(|e| MatchError::XmlParsing(format!("Failed to parse use-case config: {}", e)))?;
        config.validate()?;
        log::debug!(
            "Use case '{}': {} sensors, {} points per day",
            config.name,
            config.sensors.sensors.len(),
            config.random_points_per_day
        );
        Ok(config)
    }

    pub fn validate(&self) -> MatchResult<()> {
        let primaries = self.sensors.sensors.iter().filter(|s| s.primary).count();
        if primaries != 1 {
            return Err(MatchError::Config(format!(
                "Exactly one primary sensor expected, found {}",
                primaries
            )));
        }
        if self.secondary_sensors().is_empty() {
            return Err(MatchError::Config(
                "At least one secondary sensor expected".to_string(),
            ));
        }
        if self.random_points_per_day < 1 {
            return Err(MatchError::Config(
                "Number of random seed points greater than zero expected.".to_string(),
            ));
        }
        match &self.conditions.time_delta {
            Some(condition) if condition.seconds > 0 => {}
            Some(condition) => {
                return Err(MatchError::Config(format!(
                    "Time delta must be positive, got {} s",
                    condition.seconds
                )))
            }
            None => {
                return Err(MatchError::Config(
                    "A time-delta condition is required".to_string(),
                ))
            }
        }
        if let Some(distance) = &self.conditions.spherical_distance {
            if !(distance.max_km > 0.0) {
                return Err(MatchError::Config(format!(
                    "Maximal pixel distance must be positive, got {} km",
                    distance.max_km
                )));
            }
        }
        self.geometry_type()?;
        Ok(())
    }

    pub fn sensors(&self) -> &[SensorConfig] {
        &self.sensors.sensors
    }

    pub fn primary_sensor(&self) -> MatchResult<&SensorConfig> {
        self.sensors
            .sensors
            .iter()
            .find(|s| s.primary)
            .ok_or_else(|| MatchError::Config("No primary sensor configured".to_string()))
    }

    pub fn secondary_sensors(&self) -> Vec<&SensorConfig> {
        self.sensors.sensors.iter().filter(|s| !s.primary).collect()
    }

    pub fn dimension(&self, name: &str) -> Option<Dimension> {
        self.dimensions
            .dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| Dimension::new(&d.name, d.nx, d.ny))
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions
            .dimensions
            .iter()
            .map(|d| Dimension::new(&d.name, d.nx, d.ny))
            .collect()
    }

    pub fn max_time_delta(&self) -> MatchResult<Duration> {
        self.conditions
            .time_delta
            .as_ref()
            .map(|condition| Duration::seconds(condition.seconds))
            .ok_or_else(|| MatchError::Config("A time-delta condition is required".to_string()))
    }

    pub fn max_pixel_distance_km(&self) -> Option<f64> {
        self.conditions.spherical_distance.as_ref().map(|d| d.max_km)
    }

    pub fn geometry_type(&self) -> MatchResult<GeometryType> {
        self.geometry_library.parse()
    }

    pub fn geometry_factory(&self) -> MatchResult<GeometryFactory> {
        Ok(GeometryFactory::new(self.geometry_type()?))
    }
}
