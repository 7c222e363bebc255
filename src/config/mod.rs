mod document;
mod hash;
mod layout;
mod sync;
#[cfg(test)]
mod tests;

pub use document::{
    parse_date, toml_date, BorderNan, ExperimentConfig, ExperimentSection, ImagingSection,
    LoadConfig, MotionCorrectionConfig, PlayerConfig, TestSection, VideoConfig,
};
pub use hash::ConfigHash;
pub use sync::ConfigSynchronizer;
