use chrono::Duration;

use crate::core::matchup::{MatchupSet, SampleSet};
use crate::geometry::{spherical_distance_km, Point};
use crate::io::{Reader, UseCaseConfig};
use crate::types::MatchResult;

/// Filters sample sets by time delta and, optionally, by ground distance
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionEngine {
    max_time_delta: Duration,
    max_distance_km: Option<f64>,
}

impl ConditionEngine {
    pub fn new(max_time_delta: Duration, max_distance_km: Option<f64>) -> Self {
        Self {
            max_time_delta,
            max_distance_km,
        }
    }

    pub fn from_config(config: &UseCaseConfig) -> MatchResult<Self> {
        Ok(Self::new(config.max_time_delta()?, config.max_pixel_distance_km()))
    }

    pub fn max_time_delta(&self) -> Duration {
        self.max_time_delta
    }

    pub fn max_time_delta_millis(&self) -> i64 {
        self.max_time_delta.num_milliseconds()
    }

    fn accepts(&self, sample_set: &SampleSet, secondary_sensor: &str) -> bool {
        let Some(secondary) = sample_set.secondary(secondary_sensor) else {
            return false;
        };
        let primary = &sample_set.primary;

        if (primary.time - secondary.time).abs() > self.max_time_delta_millis() {
            return false;
        }
        match self.max_distance_km {
            Some(max_km) => {
                let distance = spherical_distance_km(
                    &Point::new(primary.lon, primary.lat),
                    &Point::new(secondary.lon, secondary.lat),
                );
                distance <= max_km
            }
            None => true,
        }
    }

    pub fn apply(&self, set: &mut MatchupSet) {
        let before = set.num_observations();
        let sensor = set.secondary_sensor.clone();
        set.retain(|sample_set| self.accepts(sample_set, &sensor));
        log::debug!(
            "Conditions kept {} of {} sample sets for {}",
            set.num_observations(),
            before,
            set.secondary_observation_path.display()
        );
    }
}

/// Removes sample sets using the data of the paired files
pub trait Screening: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, set: &mut MatchupSet, primary: &dyn Reader, secondary: &dyn Reader) -> MatchResult<()>;
}

/// Ordered list of screenings applied to every matchup set
#[derive(Default)]
pub struct ScreeningEngine {
    screenings: Vec<Box<dyn Screening>>,
}

impl ScreeningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, screening: Box<dyn Screening>) {
        self.screenings.push(screening);
    }

    pub fn len(&self) -> usize {
        self.screenings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screenings.is_empty()
    }

    /// Runs the screenings in order, stopping early once the set is empty
    pub fn apply(&self, set: &mut MatchupSet, primary: &dyn Reader, secondary: &dyn Reader) -> MatchResult<()> {
        for screening in &self.screenings {
            if set.num_observations() == 0 {
                break;
            }
            screening.apply(set, primary, secondary)?;
            log::debug!(
                "Screening '{}' left {} sample sets",
                screening.name(),
                set.num_observations()
            );
        }
        Ok(())
    }
}
