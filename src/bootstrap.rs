use crate::config::{toml_date, ExperimentConfig};
use crate::discovery;
use crate::error::{OdynError, Result};
use crate::imaging::TiffMetadata;
use crate::naming::AcquisitionName;
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of trying to create an experiment config.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// A new document was derived and written
    Created(ExperimentConfig),
    /// The config file was already there and was left alone
    AlreadyExists,
    /// No raw acquisitions to derive from; nothing was written
    NoRawFiles,
}

/// Create the experiment config next to the raw acquisitions if it does not exist yet.
///
/// The experiment root is the folder holding `config_path`. Raw files are
/// looked up under `<root>/<paths.raw_subfolder>`.
pub fn create_config(config_path: &Path, settings: &Settings) -> Result<BootstrapOutcome> {
    if config_path.exists() {
        info!("Experiment config {} already exists", config_path.display());
        return Ok(BootstrapOutcome::AlreadyExists);
    }

    let root = experiment_root(config_path);
    let raw_dir = root.join(&settings.paths.raw_subfolder);
    let files = if raw_dir.is_dir() {
        discovery::bootstrap_candidates(&raw_dir, settings.paths.recursive_discovery)?
    } else {
        Vec::new()
    };

    if files.is_empty() {
        warn!(
            "No raw '.tif' files found in {}, cannot create {}",
            raw_dir.display(),
            config_path.display()
        );
        return Ok(BootstrapOutcome::NoRawFiles);
    }

    let config = derive_config(&root, &files, &settings.naming.delimiter)?;
    config.validate()?;
    config.write(config_path)?;
    info!(
        "Created {} from {} raw file(s)",
        config_path.display(),
        files.len()
    );

    Ok(BootstrapOutcome::Created(config))
}

/// Fill the template from the first and last raw file names and the first file's TIFF tags.
pub fn derive_config(root: &Path, files: &[PathBuf], delimiter: &str) -> Result<ExperimentConfig> {
    let (first_file, last_file) = match (files.first(), files.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(OdynError::NoFiles {
                what: "raw '.tif'".to_string(),
                dir: root.to_path_buf(),
            })
        }
    };

    let first = AcquisitionName::parse(first_file, delimiter)?;
    let last = AcquisitionName::parse(last_file, delimiter)?;
    let metadata = TiffMetadata::read(first_file)?;

    let mut config = ExperimentConfig::default();

    let experiment = &mut config.experiment;
    experiment.date = toml_date(first.date)?;
    experiment.subject = first.subject.clone();
    experiment.name = first.name.clone();
    experiment.first_acq = first.index;
    experiment.last_acq = last.index;
    experiment.raw_folder = relative_folder(root, first_file);
    experiment.tiff_stem = first.stem.clone();

    config.imaging.frames = metadata.pages;
    config.imaging.size_pixels = [metadata.width, metadata.height];
    config.imaging.um_per_pixels = metadata.um_per_pixels;

    // test range counts files, keep it inside what was found
    let available = u32::try_from(files.len()).unwrap_or(u32::MAX);
    config.test.last_acq = config.test.last_acq.min(available);

    Ok(config)
}

fn experiment_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Folder of `file` relative to `root`, `.` when they coincide
fn relative_folder(root: &Path, file: &Path) -> String {
    let folder = file.parent().unwrap_or(root);
    let relative = folder.strip_prefix(root).unwrap_or(folder);

    if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.to_string_lossy().into_owned()
    }
}
