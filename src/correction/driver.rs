use super::engine::{CorrectionEngine, CorrectionOutput, PoolGuard};
use super::materialize::{materialize, ConfirmOverwrite, MaterializeJob, MaterializeReport};
use super::units::{PixelParameters, RunMode};
use crate::config::{ConfigSynchronizer, ExperimentConfig, MotionCorrectionConfig};
use crate::discovery;
use crate::error::{OdynError, Result};
use crate::imaging::PixelSize;
use crate::naming::{acquisition_suffix, corrected_file_name};
use crate::settings::{ParameterSource, Settings};
use std::path::PathBuf;
use tracing::info;

/// Outcome of a motion-correction run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub files: Vec<PathBuf>,
    pub params: PixelParameters,
    pub output: CorrectionOutput,
    /// Test parameters were copied into `[motion_correction]`
    pub promoted: bool,
    /// Final runs only
    pub materialized: Option<MaterializeReport>,
}

/// Prepares and runs motion correction for one experiment.
pub struct CorrectionDriver {
    root: PathBuf,
    settings: Settings,
}

impl CorrectionDriver {
    pub fn new<P: Into<PathBuf>>(root: P, settings: Settings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    pub fn run<E: CorrectionEngine + ?Sized>(
        &self,
        mode: RunMode,
        sync: &mut ConfigSynchronizer,
        engine: &mut E,
        confirm: &mut dyn ConfirmOverwrite,
    ) -> Result<RunReport> {
        sync.sync()?;
        let config = sync.document();

        let raw_dir = self.root.join(&config.experiment.raw_folder);
        let raw_files = discovery::raw_acquisitions(&raw_dir)?;
        let range = config.acquisition_range(mode);
        let files = range.slice(&raw_files)?.to_vec();

        let (source, physical) = self.parameters(mode, &config);
        let params = PixelParameters::from_physical(physical, config.imaging.um_per_pixels);

        info!(
            "Running {} motion correction on acquisitions {}..={} ({} file(s))",
            mode.as_str(),
            range.first,
            range.last,
            files.len()
        );
        info!("Pixel parameters: {:?}", params);

        let output = {
            let mut pool = PoolGuard::start(engine, self.settings.process_count())?;
            let output = pool.correct(&files, &params)?;
            pool.stop()?;
            output
        };

        if output.mmap_files.len() != files.len() {
            return Err(OdynError::engine(format!(
                "expected {} output file(s), engine produced {}",
                files.len(),
                output.mmap_files.len()
            )));
        }

        let mut report = RunReport {
            mode,
            files,
            params,
            output,
            promoted: false,
            materialized: None,
        };

        if mode == RunMode::Final {
            if source == ParameterSource::Test {
                report.promoted = promote_test_parameters(sync, &config)?;
            }

            let jobs = self.materialize_jobs(&config, &report.files, &report.output)?;
            let pixel_size = PixelSize::new(config.imaging.um_per_pixels);
            report.materialized = Some(materialize(&jobs, Some(pixel_size), confirm)?);
        }

        Ok(report)
    }

    fn parameters<'c>(
        &self,
        mode: RunMode,
        config: &'c ExperimentConfig,
    ) -> (ParameterSource, &'c MotionCorrectionConfig) {
        match (mode, self.settings.correction.final_parameters) {
            (RunMode::Final, ParameterSource::Final) => {
                (ParameterSource::Final, &config.motion_correction)
            }
            _ => (ParameterSource::Test, &config.test.motion_correction),
        }
    }

    fn materialize_jobs(
        &self,
        config: &ExperimentConfig,
        files: &[PathBuf],
        output: &CorrectionOutput,
    ) -> Result<Vec<MaterializeJob>> {
        let dest = self.root.join(&config.experiment.mcor_folder);
        let delimiter = &self.settings.naming.delimiter;

        files
            .iter()
            .zip(&output.mmap_files)
            .map(|(raw, mmap)| {
                let suffix = acquisition_suffix(raw, delimiter)?;
                Ok(MaterializeJob {
                    source: mmap.clone(),
                    target: dest.join(corrected_file_name(
                        &config.experiment.tiff_stem,
                        delimiter,
                        &suffix,
                    )),
                })
            })
            .collect()
    }
}

/// Persist the test parameters as the final ones; false when already equal
fn promote_test_parameters(
    sync: &mut ConfigSynchronizer,
    config: &ExperimentConfig,
) -> Result<bool> {
    if config.motion_correction == config.test.motion_correction {
        return Ok(false);
    }

    let mut updated = config.clone();
    updated.motion_correction = config.test.motion_correction.clone();
    sync.save(updated)?;
    info!("Saved test motion-correction parameters as final");
    Ok(true)
}
