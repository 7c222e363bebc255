mod cache;
mod sequence;
mod source;
#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use cache::MovieCache;
pub use sequence::Movie;
pub use source::{read_movie_file, DiskMovieSource, MovieSource};

/// Which frames a cached movie holds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MovieCategory {
    /// Raw acquisitions from the experiment's raw folder
    Raw,
    /// Materialized corrected acquisitions
    Corrected,
    /// Test-run outputs in the engine scratch directory
    Test,
}

impl fmt::Display for MovieCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MovieCategory::Raw => "raw",
            MovieCategory::Corrected => "corrected",
            MovieCategory::Test => "test",
        };
        f.write_str(name)
    }
}
