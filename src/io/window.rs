use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use num_traits::ToPrimitive;

use crate::types::{Interval, MatchError, MatchResult};

/// Element types a raster variable may have, with their default fill values
pub trait FillValue: Copy + ToPrimitive {
    fn default_fill() -> Self;
}

impl FillValue for i8 {
    fn default_fill() -> Self {
        -127
    }
}

impl FillValue for i16 {
    fn default_fill() -> Self {
        -32767
    }
}

impl FillValue for i32 {
    fn default_fill() -> Self {
        -2147483647
    }
}

impl FillValue for f32 {
    fn default_fill() -> Self {
        9.96921e36
    }
}

impl FillValue for f64 {
    fn default_fill() -> Self {
        9.969209968386869e36
    }
}

/// Window read from a raster variable, typed by the variable's storage type
#[derive(Debug, Clone, PartialEq)]
pub enum RawArray {
    Byte(Array2<i8>),
    Short(Array2<i16>),
    Int(Array2<i32>),
    Float(Array2<f32>),
    Double(Array2<f64>),
}

impl RawArray {
    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Self::Byte(a) => a.dim(),
            Self::Short(a) => a.dim(),
            Self::Int(a) => a.dim(),
            Self::Float(a) => a.dim(),
            Self::Double(a) => a.dim(),
        }
    }

    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            Self::Byte(a) => widen(a),
            Self::Short(a) => widen(a),
            Self::Int(a) => widen(a),
            Self::Float(a) => widen(a),
            Self::Double(a) => a.clone(),
        }
    }

    /// Applies `raw * scale + offset`; fill values become NaN
    pub fn scaled(&self, scale: f64, offset: f64) -> Array2<f64> {
        let fill = self.fill_value();
        let apply = must_scale(scale, offset);
        self.to_f64().mapv(|v| {
            if v == fill {
                f64::NAN
            } else if apply {
                v * scale + offset
            } else {
                v
            }
        })
    }

    fn fill_value(&self) -> f64 {
        match self {
            Self::Byte(_) => i8::default_fill() as f64,
            Self::Short(_) => i16::default_fill() as f64,
            Self::Int(_) => i32::default_fill() as f64,
            Self::Float(_) => f32::default_fill() as f64,
            Self::Double(_) => f64::default_fill(),
        }
    }
}

fn widen<T: FillValue>(array: &Array2<T>) -> Array2<f64> {
    array.mapv(|v| v.to_f64().unwrap_or(f64::NAN))
}

/// Copies the `interval` window centred on (center_x, center_y) out of
/// `data`. Cells beyond the raster edge hold the type's fill value.
pub fn read_window<T: FillValue>(
    data: &ArrayView2<T>,
    center_x: i32,
    center_y: i32,
    interval: Interval,
) -> Array2<T> {
    let (height, width) = data.dim();
    let x_offset = center_x as i64 - (interval.x() / 2) as i64;
    let y_offset = center_y as i64 - (interval.y() / 2) as i64;
    let fill = T::default_fill();

    Array2::from_shape_fn((interval.y() as usize, interval.x() as usize), |(row, col)| {
        let y = y_offset + row as i64;
        let x = x_offset + col as i64;
        if y < 0 || x < 0 || y >= height as i64 || x >= width as i64 {
            fill
        } else {
            data[[y as usize, x as usize]]
        }
    })
}

/// Window of one channel of a layered `[channel, row, column]` variable,
/// with the channel taken from the name suffix ("btemps_ch5" reads layer 4)
pub fn read_channel_window<T: FillValue>(
    data: &ArrayView3<T>,
    variable: &str,
    center_x: i32,
    center_y: i32,
    interval: Interval,
) -> MatchResult<Array2<T>> {
    let channel = channel_index(variable)?;
    let num_channels = data.len_of(Axis(0));
    if channel >= num_channels {
        return Err(MatchError::MissingData(format!(
            "'{}' requests channel {} of {}",
            variable,
            channel + 1,
            num_channels
        )));
    }
    Ok(read_window(
        &data.index_axis(Axis(0), channel),
        center_x,
        center_y,
        interval,
    ))
}

pub fn must_scale(scale: f64, offset: f64) -> bool {
    scale != 1.0 || offset != 0.0
}

/// "btemps_ch5" -> "btemps"; names without a channel suffix are returned as-is
pub fn strip_channel_suffix(variable: &str) -> &str {
    match variable.rfind("_ch") {
        Some(index) => &variable[..index],
        None => variable,
    }
}

/// Zero-based channel index of a suffixed variable name, "btemps_ch5" -> 4
pub fn channel_index(variable: &str) -> MatchResult<usize> {
    let index = variable
        .rfind("_ch")
        .ok_or_else(|| MatchError::MissingData(format!("No channel suffix in '{}'", variable)))?;
    let number: usize = variable[index + 3..].parse().map_err(|_| {
        MatchError::MissingData(format!("Invalid channel number in '{}'", variable))
    })?;
    number
        .checked_sub(1)
        .ok_or_else(|| MatchError::MissingData(format!("Channel numbers start at 1: '{}'", variable)))
}
