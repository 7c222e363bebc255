use super::layout::decode;
use crate::correction::{AcquisitionRange, RunMode};
use crate::error::{OdynError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use toml::value::Datetime;
use tracing::debug;

/// Per-experiment configuration document (`odyn_config.toml`).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub experiment: ExperimentSection,
    pub imaging: ImagingSection,
    pub test: TestSection,
    pub motion_correction: MotionCorrectionConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExperimentSection {
    /// Acquisition date, written as a TOML local date
    pub date: Datetime,
    pub subject: String,
    pub name: String,
    /// First acquisition index (1-based, inclusive)
    pub first_acq: u32,
    /// Last acquisition index (1-based, inclusive)
    pub last_acq: u32,
    /// Raw acquisitions folder, relative to the experiment root
    pub raw_folder: String,
    /// Corrected output folder, relative to the experiment root
    pub mcor_folder: String,
    /// Filename stem shared by every acquisition, without the index suffix
    pub tiff_stem: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImagingSection {
    /// Frames per acquisition file
    pub frames: u32,
    /// Frame size `[x, y]`
    pub size_pixels: [u32; 2],
    /// Physical pixel size `[x, y]`
    pub um_per_pixels: [f64; 2],
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TestSection {
    pub first_acq: u32,
    pub last_acq: u32,
    pub motion_correction: MotionCorrectionConfig,
    pub player: PlayerConfig,
}

/// Motion-correction parameters in physical units.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MotionCorrectionConfig {
    /// Piecewise-rigid (non-uniform) shift estimation
    pub pw_rigid: bool,
    pub border_nan: BorderNan,
    pub shifts_opencv: bool,
    pub nonneg_movie: bool,
    pub max_deviation_um: f64,
    pub max_shift_um: [f64; 2],
    pub overlap_um: [f64; 2],
    pub strides_um: [f64; 2],
}

/// Border handling: a flag, or the `"copy"` mode.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum BorderNan {
    Flag(bool),
    Mode(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlayerConfig {
    pub load: LoadConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoadConfig {
    /// Time-axis resampling factor
    pub downsample_ratio: f64,
    /// Spatial resampling factor, applied to both axes
    #[serde(default = "default_spatial_ratio")]
    pub spatial_ratio: f64,
    /// Select rigid (`rig`) rather than piecewise (`els`) outputs
    pub rigid: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VideoConfig {
    pub fr: f64,
    pub gain: f64,
    pub magnification: f64,
    pub q_min: f64,
    pub q_max: f64,
    pub do_loop: bool,
}

impl ExperimentConfig {
    /// Parse a document, reporting missing or mistyped keys against `path`.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| OdynError::ConfigDocument {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read, parse and validate a document from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config = Self::from_toml_str(decode(&bytes, path)?, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write, returning the exact bytes written.
    pub fn write(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = self.to_toml_string()?.into_bytes();
        std::fs::write(path, &bytes)?;
        debug!("Wrote experiment config to {}", path.display());
        Ok(bytes)
    }

    /// Acquisition date as a calendar date
    pub fn date(&self) -> Result<NaiveDate> {
        parse_date(&self.experiment.date.to_string())
    }

    /// Range selected for a run
    pub fn acquisition_range(&self, mode: RunMode) -> AcquisitionRange {
        match mode {
            RunMode::Final => AcquisitionRange::new(
                self.experiment.first_acq,
                self.experiment.last_acq,
            ),
            RunMode::Test => AcquisitionRange::new(self.test.first_acq, self.test.last_acq),
        }
    }

    /// Validate semantic constraints the types alone cannot express
    pub fn validate(&self) -> Result<()> {
        self.date()
            .map_err(|e| OdynError::invalid("experiment.date", e.to_string()))?;

        validate_range("experiment", self.experiment.first_acq, self.experiment.last_acq)?;
        validate_range("test", self.test.first_acq, self.test.last_acq)?;

        if self.experiment.raw_folder.trim().is_empty() {
            return Err(OdynError::invalid(
                "experiment.raw_folder",
                "must not be empty",
            ));
        }
        if self.experiment.mcor_folder.trim().is_empty() {
            return Err(OdynError::invalid(
                "experiment.mcor_folder",
                "must not be empty",
            ));
        }

        for (axis, value) in ["x", "y"].iter().zip(self.imaging.um_per_pixels) {
            if !(value > 0.0) {
                return Err(OdynError::invalid(
                    format!("imaging.um_per_pixels.{}", axis),
                    "must be greater than 0",
                ));
            }
        }

        self.test
            .motion_correction
            .validate("test.motion_correction")?;
        self.motion_correction.validate("motion_correction")?;
        self.test.player.validate("test.player")?;
        self.player.validate("player")?;

        Ok(())
    }
}

impl MotionCorrectionConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if let BorderNan::Mode(mode) = &self.border_nan {
            if mode != "copy" {
                return Err(OdynError::invalid(
                    format!("{}.border_nan", section),
                    format!("expected true, false or \"copy\", got \"{}\"", mode),
                ));
            }
        }

        let thresholds = [
            ("max_shift_um", self.max_shift_um),
            ("overlap_um", self.overlap_um),
            ("strides_um", self.strides_um),
        ];
        if self.max_deviation_um < 0.0 {
            return Err(OdynError::invalid(
                format!("{}.max_deviation_um", section),
                "must not be negative",
            ));
        }
        for (key, values) in thresholds {
            if values.iter().any(|v| *v < 0.0) {
                return Err(OdynError::invalid(
                    format!("{}.{}", section, key),
                    "must not be negative",
                ));
            }
        }

        Ok(())
    }
}

impl PlayerConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if !(self.load.downsample_ratio > 0.0) {
            return Err(OdynError::invalid(
                format!("{}.load.downsample_ratio", section),
                "must be greater than 0",
            ));
        }
        if !(self.load.spatial_ratio > 0.0) {
            return Err(OdynError::invalid(
                format!("{}.load.spatial_ratio", section),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn validate_range(section: &str, first: u32, last: u32) -> Result<()> {
    if first == 0 {
        return Err(OdynError::invalid(
            format!("{}.first_acq", section),
            "acquisition indices start at 1",
        ));
    }
    if last < first {
        return Err(OdynError::invalid(
            format!("{}.last_acq", section),
            format!("{} is before first_acq {}", last, first),
        ));
    }
    Ok(())
}

/// Parse an ISO calendar date (`YYYY-MM-DD`)
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(text, "%Y-%m-%d")?)
}

/// TOML local date for a calendar date
pub fn toml_date(date: NaiveDate) -> Result<Datetime> {
    Datetime::from_str(&date.format("%Y-%m-%d").to_string())
        .map_err(|e| OdynError::invalid("experiment.date", e.to_string()))
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentSection {
                date: default_date(),
                subject: String::new(),
                name: String::new(),
                first_acq: 1,
                last_acq: 1,
                raw_folder: "raw".to_string(),
                mcor_folder: default_mcor_folder(),
                tiff_stem: String::new(),
            },
            imaging: ImagingSection {
                frames: 0,
                size_pixels: [0, 0],
                um_per_pixels: [1.0, 1.0],
            },
            test: TestSection {
                first_acq: 1,
                last_acq: default_test_last_acq(),
                motion_correction: MotionCorrectionConfig::default(),
                player: PlayerConfig {
                    load: LoadConfig {
                        downsample_ratio: default_test_downsample_ratio(),
                        spatial_ratio: default_spatial_ratio(),
                        rigid: true,
                    },
                    video: VideoConfig::default(),
                },
            },
            motion_correction: MotionCorrectionConfig::default(),
            player: PlayerConfig {
                load: LoadConfig {
                    downsample_ratio: 1.0,
                    spatial_ratio: default_spatial_ratio(),
                    rigid: true,
                },
                video: VideoConfig::default(),
            },
        }
    }
}

impl Default for MotionCorrectionConfig {
    fn default() -> Self {
        Self {
            pw_rigid: false,
            border_nan: BorderNan::Mode("copy".to_string()),
            shifts_opencv: true,
            nonneg_movie: true,
            max_deviation_um: 3.0,
            max_shift_um: [12.0, 12.0],
            overlap_um: [24.0, 24.0],
            strides_um: [48.0, 48.0],
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fr: 30.0,
            gain: 1.0,
            magnification: 2.0,
            q_min: 1.0,
            q_max: 99.5,
            do_loop: false,
        }
    }
}

// Default value functions
fn default_date() -> Datetime {
    Datetime {
        date: Some(toml::value::Date {
            year: 1970,
            month: 1,
            day: 1,
        }),
        time: None,
        offset: None,
    }
}
fn default_mcor_folder() -> String {
    "mcor".to_string()
}
fn default_test_last_acq() -> u32 {
    10
}
fn default_test_downsample_ratio() -> f64 {
    0.2
}
fn default_spatial_ratio() -> f64 {
    1.0
}
