//! Pixel and time locators over geo-location grids of swath products.

use ndarray::Array2;

use crate::geometry::Point;
use crate::io::reader::{PixelLocator, TimeLocator};
use crate::types::{EpochMillis, MatchError, MatchResult};

/// Rows and columns of cells grouped into one pruning block
const BLOCK_SIZE: usize = 16;
const NEWTON_ITERATIONS: usize = 20;
const NEWTON_TOLERANCE: f64 = 1e-12;
const CELL_EPS: f64 = 1e-9;
/// Pixel positions closer than this are reported once
const DUPLICATE_EPS: f64 = 1e-6;

/// Geographic bounds of a block of cells; longitudes are unwrapped around `lon_center`
#[derive(Debug, Clone)]
struct Block {
    rows: (usize, usize),
    cols: (usize, usize),
    lat_min: f64,
    lat_max: f64,
    lon_center: f64,
    lon_half_width: f64,
}

/// Inverts a per-pixel longitude/latitude grid. Each cell between four
/// neighbouring pixel centres is treated as a bilinear patch.
#[derive(Debug, Clone)]
pub struct SwathPixelLocator {
    lons: Array2<f64>,
    lats: Array2<f64>,
    blocks: Vec<Block>,
}

impl SwathPixelLocator {
    pub fn new(lons: Array2<f64>, lats: Array2<f64>) -> MatchResult<Self> {
        if lons.dim() != lats.dim() {
            return Err(MatchError::MissingData(format!(
                "Longitude grid {:?} and latitude grid {:?} differ in shape",
                lons.dim(),
                lats.dim()
            )));
        }
        let (rows, cols) = lons.dim();
        if rows < 2 || cols < 2 {
            return Err(MatchError::MissingData(format!(
                "Geo-location grid of {}x{} is too small to locate pixels",
                cols, rows
            )));
        }

        let blocks = build_blocks(&lons, &lats);
        log::debug!("Pixel locator over {}x{} pixels, {} blocks", cols, rows, blocks.len());
        Ok(Self { lons, lats, blocks })
    }

    fn corners(&self, row: usize, col: usize, reference_lon: f64) -> [(f64, f64); 4] {
        let corner = |r: usize, c: usize| {
            (
                unwrap_lon(self.lons[[r, c]], reference_lon),
                self.lats[[r, c]],
            )
        };
        [
            corner(row, col),
            corner(row, col + 1),
            corner(row + 1, col + 1),
            corner(row + 1, col),
        ]
    }

    fn locate_in_block(&self, block: &Block, lon: f64, lat: f64, found: &mut Vec<(f64, f64)>) {
        for row in block.rows.0..block.rows.1 {
            for col in block.cols.0..block.cols.1 {
                let corners = self.corners(row, col, lon);
                if corners.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                    continue;
                }
                if let Some((u, v)) = invert_bilinear(&corners, (lon, lat)) {
                    let position = (col as f64 + 0.5 + u, row as f64 + 0.5 + v);
                    let known = found.iter().any(|(x, y)| {
                        (x - position.0).abs() < DUPLICATE_EPS && (y - position.1).abs() < DUPLICATE_EPS
                    });
                    if !known {
                        found.push(position);
                    }
                }
            }
        }
    }
}

impl PixelLocator for SwathPixelLocator {
    fn get_pixel_location(&self, lon: f64, lat: f64) -> Vec<(f64, f64)> {
        let mut found = Vec::new();
        if !lon.is_finite() || !lat.is_finite() {
            return found;
        }

        for block in &self.blocks {
            if lat < block.lat_min - CELL_EPS || lat > block.lat_max + CELL_EPS {
                continue;
            }
            if (unwrap_lon(lon, block.lon_center) - block.lon_center).abs()
                > block.lon_half_width + CELL_EPS
            {
                continue;
            }
            self.locate_in_block(block, lon, lat, &mut found);
        }
        found
    }

    fn get_geo_location(&self, x: f64, y: f64) -> Option<Point> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (rows, cols) = self.lons.dim();
        let fx = x - 0.5;
        let fy = y - 0.5;
        let col = (fx.floor().max(0.0) as usize).min(cols - 2);
        let row = (fy.floor().max(0.0) as usize).min(rows - 2);
        let u = fx - col as f64;
        let v = fy - row as f64;

        let corners = self.corners(row, col, self.lons[[row, col]]);
        let (lon, lat) = bilinear(&corners, u, v);
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        Some(Point::new(normalize_lon(lon), lat))
    }
}

/// Per-scanline acquisition times; all pixels of a row share one time
#[derive(Debug, Clone)]
pub struct ScanlineTimeLocator {
    times: Vec<EpochMillis>,
}

impl ScanlineTimeLocator {
    pub fn new(times: Vec<EpochMillis>) -> MatchResult<Self> {
        if times.is_empty() {
            return Err(MatchError::MissingData("No scanline times".to_string()));
        }
        Ok(Self { times })
    }

    /// Times spread linearly from `start` (first row) to `stop` (last row)
    pub fn from_range(start: EpochMillis, stop: EpochMillis, rows: usize) -> MatchResult<Self> {
        let times = match rows {
            0 => Vec::new(),
            1 => vec![start],
            _ => (0..rows)
                .map(|row| start + (stop - start) * row as i64 / (rows - 1) as i64)
                .collect(),
        };
        Self::new(times)
    }
}

impl TimeLocator for ScanlineTimeLocator {
    fn get_time_for(&self, _x: usize, y: usize) -> EpochMillis {
        self.times[y.min(self.times.len() - 1)]
    }
}

fn build_blocks(lons: &Array2<f64>, lats: &Array2<f64>) -> Vec<Block> {
    let (rows, cols) = lons.dim();
    let cell_rows = rows - 1;
    let cell_cols = cols - 1;
    let mut blocks = Vec::new();

    for row0 in (0..cell_rows).step_by(BLOCK_SIZE) {
        let row1 = (row0 + BLOCK_SIZE).min(cell_rows);
        for col0 in (0..cell_cols).step_by(BLOCK_SIZE) {
            let col1 = (col0 + BLOCK_SIZE).min(cell_cols);

            let mut reference = None;
            let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for r in row0..=row1 {
                for c in col0..=col1 {
                    let (lon, lat) = (lons[[r, c]], lats[[r, c]]);
                    if !lon.is_finite() || !lat.is_finite() {
                        continue;
                    }
                    let origin = *reference.get_or_insert(lon);
                    let lon = unwrap_lon(lon, origin);
                    lat_min = lat_min.min(lat);
                    lat_max = lat_max.max(lat);
                    lon_min = lon_min.min(lon);
                    lon_max = lon_max.max(lon);
                }
            }
            if reference.is_none() {
                continue;
            }

            // blocks touching a pole may wrap all longitudes
            let touches_pole = lat_max >= 89.0 || lat_min <= -89.0;
            let lon_half_width = if touches_pole {
                180.0
            } else {
                (lon_max - lon_min) / 2.0
            };
            blocks.push(Block {
                rows: (row0, row1),
                cols: (col0, col1),
                lat_min,
                lat_max,
                lon_center: (lon_max + lon_min) / 2.0,
                lon_half_width,
            });
        }
    }
    blocks
}

/// `lon` shifted by multiples of 360 to lie within 180 degrees of `reference`
fn unwrap_lon(lon: f64, reference: f64) -> f64 {
    let delta = lon - reference;
    if delta > 180.0 {
        lon - 360.0 * ((delta + 180.0) / 360.0).floor()
    } else if delta < -180.0 {
        lon + 360.0 * ((180.0 - delta) / 360.0).floor()
    } else {
        lon
    }
}

fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        unwrap_lon(lon, 0.0)
    }
}

/// Corners in order (0,0), (1,0), (1,1), (0,1) of the (u, v) unit square
fn bilinear(corners: &[(f64, f64); 4], u: f64, v: f64) -> (f64, f64) {
    let [p00, p10, p11, p01] = corners;
    let w00 = (1.0 - u) * (1.0 - v);
    let w10 = u * (1.0 - v);
    let w11 = u * v;
    let w01 = (1.0 - u) * v;
    (
        w00 * p00.0 + w10 * p10.0 + w11 * p11.0 + w01 * p01.0,
        w00 * p00.1 + w10 * p10.1 + w11 * p11.1 + w01 * p01.1,
    )
}

/// Newton inversion of the bilinear patch; Some((u, v)) when the target lies in the cell
fn invert_bilinear(corners: &[(f64, f64); 4], target: (f64, f64)) -> Option<(f64, f64)> {
    let [p00, p10, p11, p01] = corners;
    let (mut u, mut v) = (0.5, 0.5);

    for _ in 0..NEWTON_ITERATIONS {
        let (x, y) = bilinear(corners, u, v);
        let (rx, ry) = (x - target.0, y - target.1);

        let dxu = (1.0 - v) * (p10.0 - p00.0) + v * (p11.0 - p01.0);
        let dyu = (1.0 - v) * (p10.1 - p00.1) + v * (p11.1 - p01.1);
        let dxv = (1.0 - u) * (p01.0 - p00.0) + u * (p11.0 - p10.0);
        let dyv = (1.0 - u) * (p01.1 - p00.1) + u * (p11.1 - p10.1);

        let det = dxu * dyv - dxv * dyu;
        if det.abs() < 1e-300 {
            return None;
        }
        let du = (rx * dyv - ry * dxv) / det;
        let dv = (ry * dxu - rx * dyu) / det;
        u -= du;
        v -= dv;

        if du.abs() < NEWTON_TOLERANCE && dv.abs() < NEWTON_TOLERANCE {
            break;
        }
    }

    let (x, y) = bilinear(corners, u, v);
    let converged = (x - target.0).abs() < 1e-9 && (y - target.1).abs() < 1e-9;
    let inside = (-CELL_EPS..1.0 + CELL_EPS).contains(&u) && (-CELL_EPS..1.0 + CELL_EPS).contains(&v);
    (converged && inside).then(|| (u.clamp(0.0, 1.0 - f64::EPSILON), v.clamp(0.0, 1.0 - f64::EPSILON)))
}
