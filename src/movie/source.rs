use super::{Movie, MovieCategory};
use crate::config::{ExperimentConfig, LoadConfig};
use crate::discovery;
use crate::error::{OdynError, Result};
use crate::imaging::{read_mmap, read_stack};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Builds the movie for a category from the current config snapshot.
pub trait MovieSource {
    fn load(&self, category: MovieCategory, config: &ExperimentConfig) -> Result<Movie>;
}

/// Loads movies from the experiment folders and the engine scratch directory.
#[derive(Debug, Clone)]
pub struct DiskMovieSource {
    root: PathBuf,
    scratch_dir: PathBuf,
}

impl DiskMovieSource {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(root: P, scratch_dir: Q) -> Self {
        Self {
            root: root.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Files feeding a category, in concatenation order
    pub fn files(
        &self,
        category: MovieCategory,
        config: &ExperimentConfig,
    ) -> Result<(PathBuf, Vec<PathBuf>)> {
        match category {
            MovieCategory::Test => {
                let identifier = if config.test.player.load.rigid {
                    "rig"
                } else {
                    "els"
                };
                let files = discovery::scratch_outputs(&self.scratch_dir, identifier)?;
                Ok((self.scratch_dir.clone(), files))
            }
            MovieCategory::Raw => {
                let dir = self.root.join(&config.experiment.raw_folder);
                Ok((dir.clone(), discovery::tiff_files(&dir)?))
            }
            MovieCategory::Corrected => {
                let dir = self.root.join(&config.experiment.mcor_folder);
                Ok((dir.clone(), discovery::tiff_files(&dir)?))
            }
        }
    }
}

impl MovieSource for DiskMovieSource {
    fn load(&self, category: MovieCategory, config: &ExperimentConfig) -> Result<Movie> {
        let (dir, files) = self.files(category, config)?;
        if files.is_empty() {
            return Err(OdynError::NoFiles {
                what: format!("{} movie", category),
                dir,
            });
        }

        let options = category.load_options(config);
        info!(
            "Loading {} movie from {} file(s) in {}",
            category,
            files.len(),
            dir.display()
        );

        let mut movies = Vec::with_capacity(files.len());
        for file in &files {
            let movie = read_movie_file(file)?;
            movies.push(movie.resize(
                options.spatial_ratio,
                options.spatial_ratio,
                options.downsample_ratio,
            ));
        }

        let movie = Movie::concatenate(&movies)?;
        debug!("{} movie shape: {:?}", category, movie.shape());
        Ok(movie)
    }
}

impl MovieCategory {
    fn load_options(self, config: &ExperimentConfig) -> &LoadConfig {
        match self {
            MovieCategory::Test => &config.test.player.load,
            MovieCategory::Raw | MovieCategory::Corrected => &config.player.load,
        }
    }
}

/// Read a TIFF stack or an engine memmap, by extension
pub fn read_movie_file(path: &Path) -> Result<Movie> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mmap") => read_mmap(path),
        _ => read_stack(path),
    }
}
