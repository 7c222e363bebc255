use crate::bootstrap::{create_config, BootstrapOutcome};
use crate::config::{ConfigSynchronizer, ExperimentConfig};
use crate::correction::{ConfirmOverwrite, CorrectionDriver, CorrectionEngine, RunMode, RunReport};
use crate::error::{OdynError, Result};
use crate::movie::{DiskMovieSource, Movie, MovieCache, MovieCategory, MovieSource};
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One experiment folder: its config document, cached movies and correction runs.
pub struct Experiment<S: MovieSource = DiskMovieSource> {
    root: PathBuf,
    settings: Settings,
    sync: ConfigSynchronizer,
    movies: MovieCache<S>,
}

impl Experiment<DiskMovieSource> {
    /// Open an experiment, creating its config from the raw files when missing
    pub fn open<P: Into<PathBuf>>(root: P, settings: Settings) -> Result<Self> {
        let root = root.into();
        let source = DiskMovieSource::new(root.clone(), settings.paths.scratch_dir.clone());
        Self::with_source(root, settings, source)
    }
}

impl<S: MovieSource> Experiment<S> {
    pub fn with_source<P: Into<PathBuf>>(root: P, settings: Settings, source: S) -> Result<Self> {
        let root = root.into();
        let config_path = settings.config_path(&root);

        match create_config(&config_path, &settings)? {
            BootstrapOutcome::Created(_) => info!("Bootstrapped experiment in {}", root.display()),
            BootstrapOutcome::AlreadyExists => {}
            BootstrapOutcome::NoRawFiles => {
                return Err(OdynError::NoFiles {
                    what: "raw '.tif'".to_string(),
                    dir: root.join(&settings.paths.raw_subfolder),
                })
            }
        }

        let sync = ConfigSynchronizer::open(&config_path)?;
        Ok(Self {
            root,
            settings,
            sync,
            movies: MovieCache::new(source),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn synchronizer(&self) -> &ConfigSynchronizer {
        &self.sync
    }

    /// Current config, reloaded first if the file changed on disk
    pub fn config(&mut self) -> Result<Arc<ExperimentConfig>> {
        self.sync.sync()?;
        Ok(self.sync.document())
    }

    /// Edit the config and save it; returns false when the edit changed nothing
    pub fn update_config<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut ExperimentConfig),
    {
        let current = self.config()?;
        let mut updated = ExperimentConfig::clone(&current);
        edit(&mut updated);

        if updated == *current {
            return Ok(false);
        }

        self.sync.save(updated)?;
        Ok(true)
    }

    pub fn movie(&mut self, category: MovieCategory) -> Result<&Movie> {
        self.movies.value_for(category, &mut self.sync)
    }

    /// Outputs of the last test run, as the player would load them
    pub fn test_movie(&mut self) -> Result<&Movie> {
        self.movie(MovieCategory::Test)
    }

    pub fn cached_movies(&self) -> Vec<MovieCategory> {
        self.movies.cached_categories()
    }

    pub fn run_motion_correction<E: CorrectionEngine + ?Sized>(
        &mut self,
        mode: RunMode,
        engine: &mut E,
        confirm: &mut dyn ConfirmOverwrite,
    ) -> Result<RunReport> {
        let driver = CorrectionDriver::new(self.root.clone(), self.settings.clone());
        driver.run(mode, &mut self.sync, engine, confirm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::{CorrectionOutput, PixelParameters};
    use crate::imaging::{read_stack, write_mmap, MmapOrder};
    use crate::test_utils::{constant_movie, write_raw_acquisitions};
    use std::fs;
    use tempfile::TempDir;

    struct CopyEngine {
        output_dir: PathBuf,
    }

    impl CorrectionEngine for CopyEngine {
        fn start_pool(&mut self, _processes: usize) -> Result<()> {
            Ok(())
        }

        fn correct(
            &mut self,
            files: &[PathBuf],
            _params: &PixelParameters,
        ) -> Result<CorrectionOutput> {
            let mut mmap_files = Vec::new();
            for file in files {
                let movie = read_stack(file)?;
                let base = format!(
                    "{}_rig",
                    file.file_stem().unwrap().to_string_lossy()
                );
                mmap_files.push(write_mmap(&self.output_dir, &base, &movie, MmapOrder::C)?);
            }
            Ok(CorrectionOutput { mmap_files })
        }

        fn stop_pool(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        root: TempDir,
        scratch: TempDir,
    }

    impl Fixture {
        fn new(count: u32) -> Self {
            let root = TempDir::new().unwrap();
            let scratch = TempDir::new().unwrap();
            write_raw_acquisitions(&root.path().join("raw"), count, [2.0, 2.0]);
            Self { root, scratch }
        }

        fn settings(&self) -> Settings {
            let mut settings = Settings::default();
            settings.paths.scratch_dir = self.scratch.path().to_path_buf();
            settings.correction.processes = Some(1);
            settings
        }

        fn open(&self) -> Experiment {
            Experiment::open(self.root.path(), self.settings()).unwrap()
        }
    }

    #[test]
    fn test_open_bootstraps_config() {
        let fixture = Fixture::new(4);
        let mut experiment = fixture.open();

        let config = experiment.config().unwrap();
        assert_eq!(config.experiment.last_acq, 4);
        assert!(fixture.root.path().join("odyn_config.toml").exists());
    }

    #[test]
    fn test_open_without_raw_files_fails() {
        let root = TempDir::new().unwrap();
        let result = Experiment::open(root.path(), Settings::default());
        assert!(matches!(result, Err(OdynError::NoFiles { .. })));
    }

    #[test]
    fn test_raw_movie_is_cached_until_config_changes() {
        let fixture = Fixture::new(3);
        let mut experiment = fixture.open();

        assert_eq!(experiment.movie(MovieCategory::Raw).unwrap().shape(), (12, 4, 6));
        assert_eq!(experiment.cached_movies(), vec![MovieCategory::Raw]);

        let changed = experiment
            .update_config(|config| config.player.load.downsample_ratio = 0.5)
            .unwrap();
        assert!(changed);
        assert_eq!(experiment.movie(MovieCategory::Raw).unwrap().shape(), (6, 4, 6));
    }

    #[test]
    fn test_update_without_change_keeps_file() {
        let fixture = Fixture::new(2);
        let mut experiment = fixture.open();
        let path = experiment.synchronizer().path().to_path_buf();
        let before = fs::read(&path).unwrap();

        let changed = experiment.update_config(|config| config.experiment.last_acq = 2).unwrap();

        assert!(!changed);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_external_edit_is_picked_up() {
        let fixture = Fixture::new(2);
        let mut experiment = fixture.open();
        let path = experiment.synchronizer().path().to_path_buf();

        let mut edited = ExperimentConfig::read(&path).unwrap();
        edited.experiment.subject = "m13".to_string();
        edited.write(&path).unwrap();

        assert_eq!(experiment.config().unwrap().experiment.subject, "m13");
        assert_eq!(experiment.synchronizer().reload_count(), 1);
    }

    #[test]
    fn test_test_run_feeds_test_movie() {
        let fixture = Fixture::new(3);
        let mut experiment = fixture.open();
        experiment
            .update_config(|config| config.test.player.load.downsample_ratio = 1.0)
            .unwrap();

        let mut engine = CopyEngine {
            output_dir: fixture.scratch.path().to_path_buf(),
        };
        let report = experiment
            .run_motion_correction(RunMode::Test, &mut engine, &mut |_: &Path| false)
            .unwrap();
        assert_eq!(report.output.mmap_files.len(), 3);

        let movie = experiment.test_movie().unwrap();
        assert_eq!(movie.shape(), (12, 4, 6));
        assert_eq!(movie.frame(0)[[0, 0]], 1.0);
        assert_eq!(movie.frame(11)[[0, 0]], 3.0);
    }

    #[test]
    fn test_final_run_feeds_corrected_movie() {
        let fixture = Fixture::new(2);
        let mut experiment = fixture.open();
        let mut engine = CopyEngine {
            output_dir: fixture.scratch.path().to_path_buf(),
        };

        experiment
            .run_motion_correction(RunMode::Final, &mut engine, &mut |_: &Path| false)
            .unwrap();

        let corrected = experiment.movie(MovieCategory::Corrected).unwrap();
        assert_eq!(corrected, &Movie::concatenate(&[
            constant_movie(4, 4, 6, 1.0),
            constant_movie(4, 4, 6, 2.0),
        ])
        .unwrap());
    }
}
