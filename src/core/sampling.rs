//! Quasi-random seed points from a three-dimensional Sobol sequence

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::types::{EpochMillis, MatchError, MatchResult, SamplingPoint};

const BITS: usize = 32;
/// Upper bound for randomised skip offsets
const MAX_RANDOM_SKIP: u64 = 1 << 20;

/// Sobol generator over (lon, lat, time)
pub struct SobolSamplingPointGenerator {
    /// Direction numbers per dimension
    directions: [[u32; BITS]; 3],
    uniform_on_sphere: bool,
}

impl SobolSamplingPointGenerator {
    /// With `uniform_on_sphere` the latitude is drawn area-weighted,
    /// otherwise linearly in degrees.
    pub fn new(uniform_on_sphere: bool) -> Self {
        Self {
            directions: [
                van_der_corput_directions(),
                // x + 1, m = [1]
                polynomial_directions(1, 0, &[1]),
                // x^2 + x + 1, m = [1, 3]
                polynomial_directions(2, 1, &[1, 3]),
            ],
            uniform_on_sphere,
        }
    }

    /// Random skip offset for production runs
    pub fn create_random_skip() -> u64 {
        rand::thread_rng().gen_range(0..MAX_RANDOM_SKIP)
    }

    /// Sobol vector number `index`, computed directly from its Gray code
    fn vector_at(&self, index: u64) -> [u32; 3] {
        let gray = index ^ (index >> 1);
        let mut state = [0u32; 3];
        for bit in 0..BITS {
            if gray & (1 << bit) != 0 {
                for (dim, value) in state.iter_mut().enumerate() {
                    *value ^= self.directions[dim][bit];
                }
            }
        }
        state
    }

    pub fn create_samples(
        &self,
        count: usize,
        skip: u64,
        start: EpochMillis,
        end: EpochMillis,
    ) -> Vec<SamplingPoint> {
        let scale = 1.0 / (1u64 << BITS) as f64;
        let time_range = (end - start) as f64;

        let mut state = self.vector_at(skip);
        let mut samples = Vec::with_capacity(count);
        for n in skip..skip + count as u64 {
            let x = state[0] as f64 * scale;
            let y = state[1] as f64 * scale;
            let z = state[2] as f64 * scale;

            let lon = x * 360.0 - 180.0;
            let lat = if self.uniform_on_sphere {
                (2.0 * y - 1.0).asin().to_degrees()
            } else {
                y * 180.0 - 90.0
            };
            let time = start + (z * time_range) as i64;
            samples.push(SamplingPoint::new(lon, lat, time));

            // Gray-code step: flip the direction of the lowest zero bit of n
            let bit = (!n).trailing_zeros() as usize;
            if bit < BITS {
                for (dim, value) in state.iter_mut().enumerate() {
                    *value ^= self.directions[dim][bit];
                }
            }
        }
        samples
    }
}

fn van_der_corput_directions() -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for (k, value) in v.iter_mut().enumerate() {
        *value = 1 << (BITS - 1 - k);
    }
    v
}

/// Direction numbers for a primitive polynomial of degree `degree` with
/// inner coefficients `a` and initial odd integers `m`
fn polynomial_directions(degree: usize, a: u32, m: &[u32]) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for k in 0..degree {
        v[k] = m[k] << (BITS - 1 - k);
    }
    for k in degree..BITS {
        let mut value = v[k - degree] ^ (v[k - degree] >> degree);
        for j in 1..degree {
            if (a >> (degree - 1 - j)) & 1 == 1 {
                value ^= v[k - j];
            }
        }
        v[k] = value;
    }
    v
}

/// Seed points for a run: `points_per_day * whole days inclusive`
pub fn get_num_random_points(
    points_per_day: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> usize {
    let days = (end - start).num_days().max(0) as usize;
    (days + 1) * points_per_day.max(0) as usize
}

/// Seed points over [start, end]; test runs use skip 0 for reproducibility
pub fn create_random_points(
    points_per_day: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    test_run: bool,
) -> MatchResult<Vec<SamplingPoint>> {
    if points_per_day < 1 {
        return Err(MatchError::Config(
            "Number of random seed points greater than zero expected.".to_string(),
        ));
    }

    let count = get_num_random_points(points_per_day, start, end);
    let skip = if test_run {
        0
    } else {
        SobolSamplingPointGenerator::create_random_skip()
    };
    log::info!("Creating {} seed points (skip {})", count, skip);

    let generator = SobolSamplingPointGenerator::new(true);
    Ok(generator.create_samples(
        count,
        skip,
        start.timestamp_millis(),
        end.timestamp_millis(),
    ))
}
