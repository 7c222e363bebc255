use crate::config::{BorderNan, MotionCorrectionConfig};
use crate::error::{OdynError, Result};
use serde::Serialize;

/// Which acquisition range and parameter set a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Test,
    Final,
}

impl RunMode {
    pub fn from_final(is_final: bool) -> Self {
        if is_final {
            RunMode::Final
        } else {
            RunMode::Test
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Test => "test",
            RunMode::Final => "final",
        }
    }
}

/// 1-based inclusive range of acquisition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionRange {
    pub first: u32,
    pub last: u32,
}

impl AcquisitionRange {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    /// Select `items[first-1..last]`, ending early when fewer items exist.
    ///
    /// Acquisition numbers may skip indices, so `last` can exceed the number
    /// of files. A range that starts past the end or is inverted fails.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> Result<&'a [T]> {
        let start = self.first as usize;
        let end = (self.last as usize).min(items.len());

        if start == 0 || self.last < self.first || start > items.len() {
            return Err(OdynError::AcquisitionRange {
                first: self.first,
                last: self.last,
                available: items.len(),
            });
        }

        Ok(&items[start - 1..end])
    }
}

/// Engine parameters in pixel units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelParameters {
    pub border_nan: BorderNan,
    pub pw_rigid: bool,
    pub shifts_opencv: bool,
    pub nonneg_movie: bool,
    pub max_deviation_rigid: u32,
    pub max_shifts: [u32; 2],
    pub overlaps: [u32; 2],
    pub strides: [u32; 2],
}

impl PixelParameters {
    /// Convert physical thresholds with per-axis pixel sizes.
    ///
    /// `max_deviation_rigid` divides by the smaller pixel size of the two axes.
    pub fn from_physical(config: &MotionCorrectionConfig, um_per_pixels: [f64; 2]) -> Self {
        let min_factor = um_per_pixels[0].min(um_per_pixels[1]);

        Self {
            border_nan: config.border_nan.clone(),
            pw_rigid: config.pw_rigid,
            shifts_opencv: config.shifts_opencv,
            nonneg_movie: config.nonneg_movie,
            max_deviation_rigid: truncate(config.max_deviation_um / min_factor),
            max_shifts: um_to_pixels(config.max_shift_um, um_per_pixels),
            overlaps: um_to_pixels(config.overlap_um, um_per_pixels),
            strides: um_to_pixels(config.strides_um, um_per_pixels),
        }
    }
}

/// Per-axis micrometers to whole pixels, truncating toward zero
pub fn um_to_pixels(values_um: [f64; 2], um_per_pixels: [f64; 2]) -> [u32; 2] {
    [
        truncate(values_um[0] / um_per_pixels[0]),
        truncate(values_um[1] / um_per_pixels[1]),
    ]
}

fn truncate(value: f64) -> u32 {
    value.trunc() as u32
}
