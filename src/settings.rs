use crate::correction::OverwritePolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application settings shared by every experiment handled by this install.
///
/// The per-experiment document lives in `odyn_config.toml` next to the data
/// (see [`crate::config::ExperimentConfig`]); these settings describe the
/// conventions used to find that data and the engine used to correct it.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub paths: PathSettings,
    pub naming: NamingSettings,
    pub correction: CorrectionSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathSettings {
    /// Experiment config file name, relative to the experiment root
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Subfolder searched for raw acquisitions when bootstrapping
    #[serde(default = "default_raw_subfolder")]
    pub raw_subfolder: String,

    /// Search the raw subfolder recursively when bootstrapping
    #[serde(default = "default_recursive_discovery")]
    pub recursive_discovery: bool,

    /// Scratch directory holding the engine's memory-mapped outputs
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NamingSettings {
    /// Separator between date, subject, name and acquisition index
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorrectionSettings {
    /// Which section's parameters a final run uses
    #[serde(default = "default_final_parameters")]
    pub final_parameters: ParameterSource,

    /// What to do when a corrected output already exists
    #[serde(default = "default_overwrite")]
    pub overwrite: OverwritePolicy,

    /// Worker process count (defaults to available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineSettings {
    /// Worker executable
    #[serde(default = "default_engine_program")]
    pub program: String,

    /// Arguments passed before `--processes N`
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,
}

/// Source of the parameters used by a final motion-correction run.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    /// Use `[test.motion_correction]` and promote it to `[motion_correction]` on success
    Test,
    /// Use `[motion_correction]` as written
    Final,
}

impl Settings {
    /// Load settings from the default file (`odyn.toml`) plus environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("odyn.toml")
    }

    /// Load settings from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading settings from: {}", path_str);

        let settings = Config::builder()
            .set_default("paths.config_file", default_config_file())?
            .set_default("paths.raw_subfolder", default_raw_subfolder())?
            .set_default("paths.recursive_discovery", default_recursive_discovery())?
            .set_default(
                "paths.scratch_dir",
                default_scratch_dir().to_string_lossy().into_owned(),
            )?
            .set_default("naming.delimiter", default_delimiter())?
            .set_default("correction.final_parameters", "test")?
            .set_default("correction.overwrite", "ask")?
            .set_default("engine.program", default_engine_program())?
            .set_default("engine.args", default_engine_args())?
            .add_source(File::with_name(&path_str).required(false))
            // e.g. ODYN_PATHS__SCRATCH_DIR=/scratch/caiman
            .add_source(
                Environment::with_prefix("ODYN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;

        info!("Settings loaded successfully");
        debug!("Final settings: {:#?}", settings);

        Ok(settings)
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.config_file.trim().is_empty() {
            return Err(ConfigError::Message(
                "paths.config_file must not be empty".to_string(),
            ));
        }

        if self.paths.raw_subfolder.trim().is_empty() {
            return Err(ConfigError::Message(
                "paths.raw_subfolder must not be empty".to_string(),
            ));
        }

        if self.naming.delimiter.is_empty() {
            return Err(ConfigError::Message(
                "naming.delimiter must not be empty".to_string(),
            ));
        }

        if self.correction.processes == Some(0) {
            return Err(ConfigError::Message(
                "correction.processes must be greater than 0".to_string(),
            ));
        }

        if self.engine.program.trim().is_empty() {
            return Err(ConfigError::Message(
                "engine.program must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the experiment config file for an experiment root
    pub fn config_path(&self, experiment_root: &Path) -> PathBuf {
        experiment_root.join(&self.paths.config_file)
    }

    /// Worker process count, falling back to the machine's parallelism
    pub fn process_count(&self) -> usize {
        self.correction.processes.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathSettings {
                config_file: default_config_file(),
                raw_subfolder: default_raw_subfolder(),
                recursive_discovery: default_recursive_discovery(),
                scratch_dir: default_scratch_dir(),
            },
            naming: NamingSettings {
                delimiter: default_delimiter(),
            },
            correction: CorrectionSettings {
                final_parameters: default_final_parameters(),
                overwrite: default_overwrite(),
                processes: None,
            },
            engine: EngineSettings {
                program: default_engine_program(),
                args: default_engine_args(),
            },
        }
    }
}

// Default value functions
fn default_config_file() -> String {
    "odyn_config.toml".to_string()
}
fn default_raw_subfolder() -> String {
    "raw".to_string()
}
fn default_recursive_discovery() -> bool {
    false
}
fn default_scratch_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("caiman_data")
        .join("temp")
}

fn default_delimiter() -> String {
    "_".to_string()
}

fn default_final_parameters() -> ParameterSource {
    ParameterSource::Test
}
fn default_overwrite() -> OverwritePolicy {
    OverwritePolicy::Ask
}

fn default_engine_program() -> String {
    "python".to_string()
}
fn default_engine_args() -> Vec<String> {
    vec!["-m".to_string(), "odyn_worker".to_string()]
}
