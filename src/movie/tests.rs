use super::*;
use crate::config::{ConfigSynchronizer, ExperimentConfig};
use crate::error::{OdynError, Result};
use crate::imaging::{write_mmap, write_stack, MmapOrder};
use crate::test_utils::{constant_movie, sample_config, write_config, write_raw_acquisitions};
use std::cell::Cell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

/// Returns a one-sample movie holding the test downsample ratio as a marker
struct MarkerSource {
    loads: Rc<Cell<usize>>,
}

impl MovieSource for MarkerSource {
    fn load(&self, _category: MovieCategory, config: &ExperimentConfig) -> Result<Movie> {
        self.loads.set(self.loads.get() + 1);
        let marker = config.test.player.load.downsample_ratio as f32;
        Ok(constant_movie(1, 1, 1, marker))
    }
}

fn marker_cache() -> (MovieCache<MarkerSource>, Rc<Cell<usize>>) {
    let loads = Rc::new(Cell::new(0));
    let cache = MovieCache::new(MarkerSource {
        loads: Rc::clone(&loads),
    });
    (cache, loads)
}

#[test]
fn test_cache_loads_once_per_category() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &sample_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let (mut cache, loads) = marker_cache();

    cache.value_for(MovieCategory::Test, &mut sync).unwrap();
    cache.value_for(MovieCategory::Test, &mut sync).unwrap();
    cache.value_for(MovieCategory::Raw, &mut sync).unwrap();

    assert_eq!(loads.get(), 2);
    assert_eq!(
        cache.cached_categories(),
        vec![MovieCategory::Raw, MovieCategory::Test]
    );
}

#[test]
fn test_external_edit_rebuilds_from_source() {
    let dir = TempDir::new().unwrap();
    let mut config = sample_config();
    let path = write_config(dir.path(), &config);
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let (mut cache, loads) = marker_cache();

    let first = cache.value_for(MovieCategory::Test, &mut sync).unwrap().data()[[0, 0, 0]];
    assert_eq!(first, 1.0);

    config.test.player.load.downsample_ratio = 0.5;
    config.write(&path).unwrap();

    let second = cache.value_for(MovieCategory::Test, &mut sync).unwrap().data()[[0, 0, 0]];
    assert_eq!(second, 0.5);
    assert_eq!(loads.get(), 2);
}

#[test]
fn test_any_change_drops_every_category() {
    let dir = TempDir::new().unwrap();
    let mut config = sample_config();
    let path = write_config(dir.path(), &config);
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let (mut cache, loads) = marker_cache();

    cache.value_for(MovieCategory::Raw, &mut sync).unwrap();
    cache.value_for(MovieCategory::Test, &mut sync).unwrap();

    // unrelated key
    config.experiment.subject = "m13".to_string();
    config.write(&path).unwrap();

    cache.value_for(MovieCategory::Raw, &mut sync).unwrap();
    assert_eq!(cache.cached_categories(), vec![MovieCategory::Raw]);
    assert_eq!(loads.get(), 3);
}

#[test]
fn test_save_through_synchronizer_invalidates() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &sample_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let (mut cache, loads) = marker_cache();

    cache.value_for(MovieCategory::Test, &mut sync).unwrap();

    let mut updated = (*sync.document()).clone();
    updated.test.player.load.downsample_ratio = 0.25;
    sync.save(updated).unwrap();

    let value = cache.value_for(MovieCategory::Test, &mut sync).unwrap().data()[[0, 0, 0]];
    assert_eq!(value, 0.25);
    assert_eq!(loads.get(), 2);
}

#[test]
fn test_explicit_invalidate() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &sample_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let (mut cache, loads) = marker_cache();

    cache.value_for(MovieCategory::Corrected, &mut sync).unwrap();
    cache.invalidate();
    cache.value_for(MovieCategory::Corrected, &mut sync).unwrap();

    assert_eq!(loads.get(), 2);
}

#[test]
fn test_disk_source_raw_movie() {
    let dir = TempDir::new().unwrap();
    let mut config = sample_config();
    config.player.load.downsample_ratio = 0.5;
    write_raw_acquisitions(&dir.path().join("raw"), 3, [2.5, 4.0]);

    let source = DiskMovieSource::new(dir.path(), dir.path().join("scratch"));
    let movie = source.load(MovieCategory::Raw, &config).unwrap();

    // 3 files x 4 frames, halved in time
    assert_eq!(movie.shape(), (6, 4, 6));
    assert_eq!(movie.data()[[0, 0, 0]], 1.0);
    assert_eq!(movie.data()[[5, 0, 0]], 3.0);
}

#[test]
fn test_disk_source_test_outputs_by_rigidity() {
    let dir = TempDir::new().unwrap();
    let scratch = dir.path().join("scratch");
    fs::create_dir_all(&scratch).unwrap();
    write_mmap(&scratch, "a_rig_", &constant_movie(2, 3, 3, 1.0), MmapOrder::F).unwrap();
    write_mmap(&scratch, "b_rig_", &constant_movie(2, 3, 3, 2.0), MmapOrder::F).unwrap();
    write_mmap(&scratch, "a_els_", &constant_movie(5, 3, 3, 9.0), MmapOrder::F).unwrap();

    let mut config = sample_config();
    let source = DiskMovieSource::new(dir.path(), &scratch);

    let rigid = source.load(MovieCategory::Test, &config).unwrap();
    assert_eq!(rigid.shape(), (4, 3, 3));
    assert_eq!(rigid.data()[[3, 0, 0]], 2.0);

    config.test.player.load.rigid = false;
    let elastic = source.load(MovieCategory::Test, &config).unwrap();
    assert_eq!(elastic.num_frames(), 5);
}

#[test]
fn test_disk_source_without_files() {
    let dir = TempDir::new().unwrap();
    let config = sample_config();
    let source = DiskMovieSource::new(dir.path(), dir.path().join("scratch"));

    assert!(matches!(
        source.load(MovieCategory::Corrected, &config),
        Err(OdynError::NoFiles { .. })
    ));
}

#[test]
fn test_disk_source_spatial_ratio() {
    let dir = TempDir::new().unwrap();
    let mcor = dir.path().join("mcor");
    fs::create_dir_all(&mcor).unwrap();
    write_stack(&mcor.join("a.tif"), &constant_movie(2, 4, 6, 3.0), None).unwrap();

    let mut config = sample_config();
    config.player.load.spatial_ratio = 0.5;
    let source = DiskMovieSource::new(dir.path(), dir.path().join("scratch"));

    let movie = source.load(MovieCategory::Corrected, &config).unwrap();
    assert_eq!(movie.shape(), (2, 2, 3));
}
