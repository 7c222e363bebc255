mod driver;
mod engine;
mod materialize;
mod process;
mod units;

pub use driver::{CorrectionDriver, RunReport};
pub use engine::{CorrectionEngine, CorrectionOutput, PoolGuard};
pub use materialize::{
    materialize, ConfirmOverwrite, MaterializeJob, MaterializeReport, OverwritePolicy,
};
pub use process::ProcessEngine;
pub use units::{um_to_pixels, AcquisitionRange, PixelParameters, RunMode};
