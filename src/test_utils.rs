use crate::config::{toml_date, ExperimentConfig};
use crate::imaging::{write_stack, PixelSize};
use crate::movie::Movie;
use chrono::NaiveDate;
use ndarray::Array3;
use std::fs;
use std::path::{Path, PathBuf};

pub const STEM: &str = "2023-05-17_m12_baseline";

/// Valid document for a 10-acquisition experiment with `raw` and `mcor` folders
pub fn sample_config() -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.experiment.date = toml_date(NaiveDate::from_ymd_opt(2023, 5, 17).unwrap()).unwrap();
    config.experiment.subject = "m12".to_string();
    config.experiment.name = "baseline".to_string();
    config.experiment.first_acq = 1;
    config.experiment.last_acq = 10;
    config.experiment.tiff_stem = STEM.to_string();
    config.imaging.frames = 4;
    config.imaging.size_pixels = [6, 4];
    config.imaging.um_per_pixels = [2.5, 4.0];
    config.test.first_acq = 3;
    config.test.last_acq = 7;
    config.test.player.load.downsample_ratio = 1.0;
    config
}

pub fn write_config(root: &Path, config: &ExperimentConfig) -> PathBuf {
    let path = root.join("odyn_config.toml");
    config.write(&path).unwrap();
    path
}

/// Movie whose every sample equals `value`
pub fn constant_movie(frames: usize, rows: usize, cols: usize, value: f32) -> Movie {
    Movie::new(Array3::from_elem((frames, rows, cols), value))
}

/// Write `count` acquisitions named `<STEM>_00001.tif`...; sample values equal the index
pub fn write_raw_acquisitions(raw_dir: &Path, count: u32, um_per_pixels: [f64; 2]) -> Vec<PathBuf> {
    fs::create_dir_all(raw_dir).unwrap();
    (1..=count)
        .map(|index| {
            let path = raw_dir.join(format!("{}_{:05}.tif", STEM, index));
            let movie = constant_movie(4, 4, 6, index as f32);
            write_stack(&path, &movie, Some(PixelSize::new(um_per_pixels))).unwrap();
            path
        })
        .collect()
}
