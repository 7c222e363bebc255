pub mod bootstrap;
pub mod config;
pub mod correction;
pub mod discovery;
pub mod error;
pub mod experiment;
pub mod imaging;
pub mod movie;
pub mod naming;
pub mod prompt;
pub mod settings;

#[cfg(test)]
mod test_utils;

pub use bootstrap::{create_config, derive_config, BootstrapOutcome};
pub use config::{ConfigHash, ConfigSynchronizer, ExperimentConfig};
pub use correction::{
    CorrectionDriver, CorrectionEngine, OverwritePolicy, ProcessEngine, RunMode, RunReport,
};
pub use error::{OdynError, Result};
pub use experiment::Experiment;
pub use imaging::{read_mmap, read_stack, write_stack, MmapLayout, PixelSize, TiffMetadata};
pub use movie::{Movie, MovieCache, MovieCategory, MovieSource};
pub use settings::Settings;
